use bytes::Bytes;
use chrono::{TimeZone, Utc};
use crm_snapshot_core::contract::MockObjectStorage;
use crm_snapshot_core::{
    EntityLocks, ObjectStorage, ObjectStoreBuckets, RunWindow, SnapshotPublisher, StorageError,
    StorageLayout,
};

const RAW: &str = "raw-bucket";
const STAGING: &str = "staging-bucket";

fn layout() -> StorageLayout {
    StorageLayout {
        root_prefix: "bitrix".to_string(),
        raw_bucket: RAW.to_string(),
        staging_bucket: STAGING.to_string(),
    }
}

fn window_on(day: u32) -> RunWindow {
    RunWindow::ending_at(Utc.with_ymd_and_hms(2024, 3, day, 6, 0, 0).unwrap(), 2)
}

#[test]
fn test_snapshot_target_paths() {
    let window = window_on(7);

    let flat = layout().snapshot_target("leads", "leads_bitrix24", false, &window);
    assert_eq!(flat.bucket, STAGING);
    assert_eq!(flat.archive_path, "bitrix/leads/archive/2024_03_07_leads_bitrix24.parquet");
    assert_eq!(flat.latest_prefix, "bitrix/leads/daily_update/");
    assert_eq!(flat.latest_path, "bitrix/leads/daily_update/2024_03_07_leads_bitrix24.parquet");
    assert_eq!(flat.suffix(), ".parquet");

    let partitioned = layout().snapshot_target("contacts", "contacts_bitrix24", true, &window);
    assert_eq!(
        partitioned.archive_path,
        "bitrix/contacts/archive/2024/03/2024_03_07_contacts_bitrix24.parquet"
    );

    assert_eq!(
        layout().raw_archive_path("user_list", "user_list_bitrix24", true, &window),
        "bitrix/user_list/archive/2024/03/2024_03_07_user_list_bitrix24.json"
    );
    assert_eq!(
        layout().raw_list_path("leads/meta", "leads_bitrix24", &window),
        "bitrix/leads/meta/2024_03_07_leads_bitrix24.json"
    );
}

#[tokio::test]
async fn test_publishing_twice_on_same_date_is_idempotent() {
    let storage = ObjectStoreBuckets::in_memory([RAW, STAGING]);
    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);
    let target = layout().snapshot_target("deals", "deals_bitrix24", false, &window_on(7));

    publisher
        .publish("deals", &target, Bytes::from_static(b"first"))
        .await
        .unwrap();
    publisher
        .publish("deals", &target, Bytes::from_static(b"second"))
        .await
        .unwrap();

    let latest = storage.list(STAGING, &target.latest_prefix).await.unwrap();
    assert_eq!(latest, vec![target.latest_path.clone()]);
    assert_eq!(
        storage.read(STAGING, &target.latest_path).await.unwrap(),
        Bytes::from_static(b"second")
    );

    let archive = storage.list(STAGING, "bitrix/deals/archive/").await.unwrap();
    assert_eq!(archive, vec![target.archive_path.clone()]);
    assert_eq!(
        storage.read(STAGING, &target.archive_path).await.unwrap(),
        Bytes::from_static(b"second")
    );
}

#[tokio::test]
async fn test_new_date_replaces_latest_and_keeps_both_archives() {
    let storage = ObjectStoreBuckets::in_memory([RAW, STAGING]);
    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);

    let monday = layout().snapshot_target("leads", "leads_bitrix24", false, &window_on(4));
    let tuesday = layout().snapshot_target("leads", "leads_bitrix24", false, &window_on(5));

    publisher
        .publish("leads", &monday, Bytes::from_static(b"monday"))
        .await
        .unwrap();
    publisher
        .publish("leads", &tuesday, Bytes::from_static(b"tuesday"))
        .await
        .unwrap();

    let latest = storage.list(STAGING, "bitrix/leads/daily_update/").await.unwrap();
    assert_eq!(latest, vec![tuesday.latest_path.clone()]);

    let archive = storage.list(STAGING, "bitrix/leads/archive/").await.unwrap();
    assert_eq!(archive, vec![monday.archive_path, tuesday.archive_path]);
}

#[tokio::test]
async fn test_latest_clear_only_removes_matching_suffix() {
    let storage = ObjectStoreBuckets::in_memory([RAW, STAGING]);
    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);
    let target = layout().snapshot_target("leads", "leads_bitrix24", false, &window_on(7));

    storage
        .write(
            STAGING,
            "bitrix/leads/daily_update/README.txt",
            Bytes::from_static(b"keep me"),
            "text/plain",
        )
        .await
        .unwrap();
    storage
        .write(
            STAGING,
            "bitrix/leads/daily_update/2024_03_01_leads_bitrix24.parquet",
            Bytes::from_static(b"stale"),
            "application/octet-stream",
        )
        .await
        .unwrap();

    publisher
        .publish("leads", &target, Bytes::from_static(b"fresh"))
        .await
        .unwrap();

    let latest = storage.list(STAGING, &target.latest_prefix).await.unwrap();
    assert_eq!(
        latest,
        vec![
            "bitrix/leads/daily_update/2024_03_07_leads_bitrix24.parquet".to_string(),
            "bitrix/leads/daily_update/README.txt".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_archive_write_aborts_publish() {
    let mut storage = MockObjectStorage::new();
    storage.expect_write().times(1).returning(|bucket, _, _, _| {
        Err(StorageError::UnknownBucket {
            bucket: bucket.to_string(),
        })
    });
    storage.expect_list_and_delete().never();

    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);
    let target = layout().snapshot_target("leads", "leads_bitrix24", false, &window_on(7));

    let result = publisher
        .publish("leads", &target, Bytes::from_static(b"payload"))
        .await;

    assert!(matches!(result, Err(StorageError::UnknownBucket { .. })));
}

#[tokio::test]
async fn test_failed_clear_keeps_archive_and_skips_latest_write() {
    let mut storage = MockObjectStorage::new();
    storage
        .expect_write()
        .withf(|_, path, _, _| path.contains("/archive/"))
        .times(1)
        .returning(|_, _, _, _| Ok(()));
    storage
        .expect_list_and_delete()
        .withf(|_, prefix, suffix| prefix == "bitrix/leads/daily_update/" && suffix == ".parquet")
        .times(1)
        .returning(|bucket, _, _| {
            Err(StorageError::UnknownBucket {
                bucket: bucket.to_string(),
            })
        });

    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);
    let target = layout().snapshot_target("leads", "leads_bitrix24", false, &window_on(7));

    let result = publisher
        .publish("leads", &target, Bytes::from_static(b"payload"))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_write_json_is_indented_and_archive_only() {
    let storage = ObjectStoreBuckets::in_memory([RAW, STAGING]);
    let locks = EntityLocks::new();
    let publisher = SnapshotPublisher::new(&storage, &locks);

    let definitions = vec![serde_json::json!({"FIELD_NAME": "UF_X"})];
    publisher
        .write_json(RAW, "bitrix/leads/meta/2024_03_07_leads_bitrix24.json", &definitions)
        .await
        .unwrap();

    let text = storage
        .read(RAW, "bitrix/leads/meta/2024_03_07_leads_bitrix24.json")
        .await
        .unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("\n  {"));
    assert_eq!(storage.list(STAGING, "").await.unwrap(), Vec::<String>::new());
}
