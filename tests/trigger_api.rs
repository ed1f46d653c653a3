use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use crm_snapshot::server::{build_router, ErrorResponse, SuccessResponse};
use crm_snapshot_core::contract::MockCrmApi;
use crm_snapshot_core::{
    Entity, EntityLocks, FetchError, FixedClock, ObjectStoreBuckets, Pipeline, PipelineSettings,
    ReferenceList, StorageLayout,
};
use serde_json::json;

fn test_pipeline(crm: MockCrmApi) -> Arc<Pipeline> {
    let storage = ObjectStoreBuckets::in_memory(["raw-bucket", "staging-bucket"]);
    Arc::new(Pipeline::new(
        Arc::new(crm),
        Arc::new(storage),
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 7, 6, 0, 0).unwrap())),
        EntityLocks::new(),
        PipelineSettings::new(StorageLayout {
            root_prefix: "bitrix".to_string(),
            raw_bucket: "raw-bucket".to_string(),
            staging_bucket: "staging-bucket".to_string(),
        }),
    ))
}

/// Spin up the trigger on an OS-assigned port, returning the base URL.
async fn spawn_test_server(pipeline: Arc<Pipeline>) -> String {
    let app = build_router(pipeline);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn trigger_returns_counts_on_success() {
    let mut crm = MockCrmApi::new();
    crm.expect_fetch_records().returning(|entity, _| {
        let count = match entity {
            Entity::Leads => 3,
            Entity::Users => 1,
            _ => 0,
        };
        Ok((0..count)
            .map(|i| json!({"ID": i.to_string()}).as_object().cloned().unwrap())
            .collect())
    });
    crm.expect_fetch_list().returning(|list| match list {
        ReferenceList::Statuses => Ok(vec![json!({"STATUS_ID": "NEW"})]),
        _ => Ok(vec![]),
    });
    crm.expect_column_renames().returning(|_| HashMap::new());

    let base = spawn_test_server(test_pipeline(crm)).await;
    let resp = reqwest::get(format!("{}/", base)).await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: SuccessResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "success");
    assert_eq!(body.total_leads, 3);
    assert_eq!(body.total_deals, 0);
    assert_eq!(body.total_user_list, 1);
    assert_eq!(body.total_status_list, 1);
    assert_eq!(body.company_list, 0);
    assert_eq!(body.processed_counts["leads"], json!(3));
    assert_eq!(
        body.processed_counts.keys().cloned().collect::<Vec<_>>(),
        vec![
            "leads",
            "deals",
            "contacts",
            "status_list",
            "company_list",
            "deal_category_list",
            "user_list"
        ]
    );
}

#[tokio::test]
async fn trigger_reports_failed_step_and_completed_counts() {
    let mut crm = MockCrmApi::new();
    crm.expect_fetch_list().returning(|_| Ok(vec![]));
    crm.expect_column_renames().returning(|_| HashMap::new());
    crm.expect_fetch_records().returning(|entity, _| match entity {
        Entity::Contacts => Err(FetchError::Malformed {
            url: "https://crm.example.com/rest/crm.contact.list".to_string(),
            message: "record is not an object: 5".to_string(),
        }),
        Entity::Leads => Ok(vec![json!({"ID": "1"}).as_object().cloned().unwrap()]),
        _ => Ok(vec![]),
    });

    let base = spawn_test_server(test_pipeline(crm)).await;
    let resp = reqwest::get(format!("{}/", base)).await.unwrap();

    assert_eq!(resp.status(), 500);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert_eq!(body.failed_step, "process_entity(contacts)");
    assert!(body.message.contains("record is not an object"));
    assert_eq!(body.completed_counts["leads"], json!(1));
    assert_eq!(body.completed_counts["deals"], json!(0));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let base = spawn_test_server(test_pipeline(MockCrmApi::new())).await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}
