//! High-level pipeline: runs every step of [`RUN_PLAN`] for one trigger.
//!
//! A run fetches the lead and deal field definitions, then processes each
//! entity and reference list in a fixed order:
//!   - entities: fetch records for the run window, skip when empty, otherwise
//!     decode (schema-driven entities) and publish a Parquet snapshot
//!   - reference lists: always archive the raw list as JSON, then publish a
//!     snapshot when the list is non-empty
//!
//! # Error Handling
//! The first failing step ends the run. The returned [`RunFailure`] names that
//! step and carries the counts of every step that completed before it; their
//! objects stay published.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, info_span, Instrument};

use crate::catalog::{Decoding, Entity, ReferenceList, Step, COUNT_KEYS, RUN_PLAN};
use crate::clock::{Clock, RunWindow, DEFAULT_WINDOW_DAYS};
use crate::contract::{CrmApi, ObjectStorage, OutputRow};
use crate::error::{PipelineError, RunFailure};
use crate::flatten::flatten_records;
use crate::locks::EntityLocks;
use crate::publish::{SnapshotPublisher, StorageLayout};
use crate::schema::{FieldSchema, DEFAULT_LABEL_LOCALE};

/// Run-independent settings of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: StorageLayout,
    /// Length of the fetch window, ending at the run's reference instant.
    pub window_days: i64,
    /// Locale of the field labels kept in descriptors.
    pub label_locale: String,
}

impl PipelineSettings {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            window_days: DEFAULT_WINDOW_DAYS,
            label_locale: DEFAULT_LABEL_LOCALE.to_owned(),
        }
    }
}

/// Per-entity processed counts of one run, in reporting order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunReport {
    counts: Map<String, Value>,
}

impl Default for RunReport {
    fn default() -> Self {
        let counts = COUNT_KEYS
            .iter()
            .map(|key| (key.to_string(), Value::from(0u64)))
            .collect();
        Self { counts }
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, count: usize) {
        self.counts.insert(key.to_owned(), Value::from(count as u64));
    }

    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn counts(&self) -> &Map<String, Value> {
        &self.counts
    }
}

/// Field definitions fetched at the start of a run.
#[derive(Debug, Default)]
struct FieldDefinitions {
    leads: Vec<Value>,
    deals: Vec<Value>,
}

impl FieldDefinitions {
    fn get(&self, list: ReferenceList) -> &[Value] {
        match list {
            ReferenceList::LeadFields => &self.leads,
            ReferenceList::DealFields => &self.deals,
            ReferenceList::Statuses | ReferenceList::DealCategories => &[],
        }
    }
}

/// Collaborators and settings for running the pipeline. Construct once and
/// reuse for every trigger.
pub struct Pipeline {
    crm: Arc<dyn CrmApi>,
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
    locks: EntityLocks,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        crm: Arc<dyn CrmApi>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        locks: EntityLocks,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            crm,
            storage,
            clock,
            locks,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Execute one complete run.
    pub async fn run(&self) -> Result<RunReport, RunFailure> {
        let window = RunWindow::ending_at(self.clock.now(), self.settings.window_days);
        info!(
            start = %window.start_param(),
            end = %window.end_param(),
            "[RUN] Starting pipeline run"
        );

        let mut report = RunReport::new();
        let mut definitions = FieldDefinitions::default();

        for step in RUN_PLAN {
            let span = info_span!("step", %step);
            let result = self
                .run_step(step, &window, &mut report, &mut definitions)
                .instrument(span)
                .await;

            if let Err(source) = result {
                error!(%step, error = %source, "[RUN][ERROR] Step failed, aborting run");
                return Err(RunFailure {
                    step,
                    completed: report,
                    source,
                });
            }
        }

        info!(counts = ?report.counts(), "[RUN] Pipeline run complete");
        Ok(report)
    }

    async fn run_step(
        &self,
        step: Step,
        window: &RunWindow,
        report: &mut RunReport,
        definitions: &mut FieldDefinitions,
    ) -> Result<(), PipelineError> {
        match step {
            Step::FetchSchema => {
                definitions.leads = self.fetch_schema(ReferenceList::LeadFields, window).await?;
                definitions.deals = self.fetch_schema(ReferenceList::DealFields, window).await?;
                Ok(())
            }
            Step::ProcessEntity(entity) => {
                let count = self.process_entity(entity, window, definitions).await?;
                report.record(entity.spec().count_key, count);
                Ok(())
            }
            Step::FetchReference(list) => {
                let count = self.fetch_reference(list, window).await?;
                if let Some(key) = list.spec().count_key {
                    report.record(key, count);
                }
                Ok(())
            }
        }
    }

    fn publisher(&self) -> SnapshotPublisher<'_> {
        SnapshotPublisher::new(self.storage.as_ref(), &self.locks)
    }

    /// Fetch a field definition list and keep a dated JSON copy of it.
    async fn fetch_schema(
        &self,
        list: ReferenceList,
        window: &RunWindow,
    ) -> Result<Vec<Value>, PipelineError> {
        let definitions = self.crm.fetch_list(list).await?;
        info!(%list, fields = definitions.len(), "[RUN] Fetched field definitions");

        let layout = &self.settings.layout;
        let spec = list.spec();
        let path = layout.raw_list_path(spec.raw_dir, spec.stem, window);
        self.publisher()
            .write_json(&layout.raw_bucket, &path, &definitions)
            .await?;

        Ok(definitions)
    }

    /// Returns the number of records fetched.
    async fn process_entity(
        &self,
        entity: Entity,
        window: &RunWindow,
        definitions: &FieldDefinitions,
    ) -> Result<usize, PipelineError> {
        let spec = entity.spec();
        let layout = &self.settings.layout;

        let records = self.crm.fetch_records(entity, window).await?;
        let count = records.len();
        info!(%entity, records = count, "[RUN] Fetched records");

        if records.is_empty() {
            info!(%entity, "[RUN] No records in window, skipping publish");
            return Ok(0);
        }

        let publisher = self.publisher();

        if spec.raw_archive {
            let path = layout.raw_archive_path(spec.dir, spec.stem, spec.partitioned, window);
            publisher
                .write_json(&layout.raw_bucket, &path, &records)
                .await?;
        }

        let rows: Vec<OutputRow> = match spec.decoding {
            Decoding::Schema {
                fields,
                standard_fields,
            } => {
                let schema = FieldSchema::build_with_locale(
                    definitions.get(fields),
                    &self.settings.label_locale,
                );
                let renames = self.crm.column_renames(entity);
                flatten_records(&records, &schema, &renames, standard_fields)
            }
            Decoding::Passthrough => records,
        };

        let target = layout.snapshot_target(spec.dir, spec.stem, spec.partitioned, window);
        let size = publisher.publish_rows(spec.count_key, &target, &rows).await?;
        info!(%entity, rows = rows.len(), bytes = size, "[RUN] Entity processed");

        Ok(count)
    }

    /// Returns the number of items in the list.
    async fn fetch_reference(
        &self,
        list: ReferenceList,
        window: &RunWindow,
    ) -> Result<usize, PipelineError> {
        let spec = list.spec();
        let layout = &self.settings.layout;
        let publisher = self.publisher();

        let items = self.crm.fetch_list(list).await?;
        info!(%list, items = items.len(), "[RUN] Fetched reference list");

        let path = layout.raw_list_path(spec.raw_dir, spec.stem, window);
        publisher
            .write_json(&layout.raw_bucket, &path, &items)
            .await?;

        let (Some(key), Some(dir)) = (spec.count_key, spec.snapshot_dir) else {
            return Ok(items.len());
        };
        if items.is_empty() {
            return Ok(0);
        }

        let rows: Vec<OutputRow> = items.iter().map(reference_row).collect();
        let target = layout.snapshot_target(dir, spec.stem, true, window);
        publisher.publish_rows(key, &target, &rows).await?;

        Ok(items.len())
    }
}

/// Reference items are normally objects; anything else becomes a one-column row.
fn reference_row(item: &Value) -> OutputRow {
    match item {
        Value::Object(map) => map.clone(),
        other => {
            let mut row = OutputRow::new();
            row.insert("value".to_owned(), other.clone());
            row
        }
    }
}
