use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crm_snapshot_core::clock::DEFAULT_WINDOW_DAYS;
use crm_snapshot_core::schema::DEFAULT_LABEL_LOCALE;
use crm_snapshot_core::{Entity, PipelineSettings, StorageLayout};
use serde::Deserialize;
use tracing::{error, info};

use crate::crm_client::CrmEndpoints;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_ROOT_PREFIX: &str = "bitrix";

/// Required environment variables, in the order they are reported when missing.
pub const REQUIRED_ENV_VARS: [&str; 11] = [
    "BITRIX_LEAD_URL",
    "BITRIX_LEAD_USERFIELDS_URL",
    "BITRIX_DEAL_URL",
    "BITRIX_DEAL_USERFIELDS_URL",
    "BITRIX_CONTACT_LIST_URL",
    "BITRIX_STATUS_LIST_URL",
    "BITRIX_COMPANY_LIST_URL",
    "BITRIX_DEALCATEGORY_LIST_URL",
    "BITRIX_USER_LIST_URL",
    "GCS_RAW_BUCKET",
    "GCS_STAGING_BUCKET",
];

/// Optional YAML settings. Holds no secrets; every key may be omitted.
///
/// ```yaml
/// root_prefix: bitrix
/// window_days: 2
/// label_locale: ru
/// column_renames:
///   leads:
///     UF_CRM_1700000000: lead_channel
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub root_prefix: String,
    pub window_days: i64,
    pub label_locale: String,
    /// Entity name to (field code to column name).
    pub column_renames: HashMap<String, HashMap<String, String>>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root_prefix: DEFAULT_ROOT_PREFIX.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            label_locale: DEFAULT_LABEL_LOCALE.to_string(),
            column_renames: HashMap::new(),
        }
    }
}

/// Everything needed to build the production pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub endpoints: CrmEndpoints,
    pub raw_bucket: String,
    pub staging_bucket: String,
    pub page_size: usize,
    pub root_prefix: String,
    pub window_days: i64,
    pub label_locale: String,
    pub column_renames: HashMap<Entity, HashMap<String, String>>,
}

impl AppConfig {
    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout {
            root_prefix: self.root_prefix.clone(),
            raw_bucket: self.raw_bucket.clone(),
            staging_bucket: self.staging_bucket.clone(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            layout: self.storage_layout(),
            window_days: self.window_days,
            label_locale: self.label_locale.clone(),
        }
    }

    /// Bucket names the storage backend must serve.
    pub fn buckets(&self) -> Vec<String> {
        let mut buckets = vec![self.raw_bucket.clone()];
        if self.staging_bucket != self.raw_bucket {
            buckets.push(self.staging_bucket.clone());
        }
        buckets
    }
}

/// Loads required settings from the environment, merged with the optional
/// YAML file at `path`.
///
/// Every missing required variable is reported in one error, before any
/// network call is made.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };

    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|key| env_value(key).is_none())
        .collect();
    if !missing.is_empty() {
        error!(?missing, "Required environment variables are not set");
        anyhow::bail!(
            "missing required environment variables: {}",
            missing.join(", ")
        );
    }
    let required = |key: &str| env_value(key).unwrap_or_default();

    let page_size = match env_value("PAGE_SIZE") {
        None => DEFAULT_PAGE_SIZE,
        Some(raw) => match raw.parse::<usize>() {
            Ok(size) if size > 0 => size,
            Ok(_) => anyhow::bail!("PAGE_SIZE must be greater than zero"),
            Err(e) => {
                error!(error = ?e, value = %raw, "PAGE_SIZE must be a positive integer");
                return Err(anyhow::anyhow!("PAGE_SIZE must be a positive integer: {e}"));
            }
        },
    };

    if file.window_days <= 0 {
        anyhow::bail!("window_days must be greater than zero, got {}", file.window_days);
    }

    let mut column_renames = HashMap::new();
    for (name, renames) in file.column_renames {
        let entity = Entity::from_name(&name)
            .with_context(|| format!("unknown entity '{name}' in column_renames"))?;
        column_renames.insert(entity, renames);
    }

    let endpoints = CrmEndpoints {
        leads: required("BITRIX_LEAD_URL"),
        lead_fields: required("BITRIX_LEAD_USERFIELDS_URL"),
        deals: required("BITRIX_DEAL_URL"),
        deal_fields: required("BITRIX_DEAL_USERFIELDS_URL"),
        contacts: required("BITRIX_CONTACT_LIST_URL"),
        statuses: required("BITRIX_STATUS_LIST_URL"),
        companies: required("BITRIX_COMPANY_LIST_URL"),
        deal_categories: required("BITRIX_DEALCATEGORY_LIST_URL"),
        users: required("BITRIX_USER_LIST_URL"),
    };

    let config = AppConfig {
        endpoints,
        raw_bucket: required("GCS_RAW_BUCKET"),
        staging_bucket: required("GCS_STAGING_BUCKET"),
        page_size,
        root_prefix: file.root_prefix,
        window_days: file.window_days,
        label_locale: file.label_locale,
        column_renames,
    };

    info!(
        raw_bucket = %config.raw_bucket,
        staging_bucket = %config.staging_bucket,
        page_size = config.page_size,
        window_days = config.window_days,
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path, e)
    })?;

    // An empty file deserializes as YAML null.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
