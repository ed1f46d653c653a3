//! HTTP client for a Bitrix24-style REST API.
//!
//! Record endpoints are paged with `start=<offset>` and filtered on
//! `DATE_MODIFY`; list endpoints are fetched with a single request. Every
//! response is expected to look like `{"result": [...], "next": 50}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use crm_snapshot_core::{CrmApi, Entity, FetchError, RawRecord, ReferenceList, RunWindow};
use serde_json::Value;
use tracing::{debug, error, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One URL per CRM endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmEndpoints {
    pub leads: String,
    pub lead_fields: String,
    pub deals: String,
    pub deal_fields: String,
    pub contacts: String,
    pub statuses: String,
    pub companies: String,
    pub deal_categories: String,
    pub users: String,
}

impl CrmEndpoints {
    pub fn entity_url(&self, entity: Entity) -> &str {
        match entity {
            Entity::Leads => &self.leads,
            Entity::Deals => &self.deals,
            Entity::Contacts => &self.contacts,
            Entity::Companies => &self.companies,
            Entity::Users => &self.users,
        }
    }

    pub fn list_url(&self, list: ReferenceList) -> &str {
        match list {
            ReferenceList::LeadFields => &self.lead_fields,
            ReferenceList::DealFields => &self.deal_fields,
            ReferenceList::Statuses => &self.statuses,
            ReferenceList::DealCategories => &self.deal_categories,
        }
    }
}

pub struct BitrixClient {
    http: reqwest::Client,
    endpoints: CrmEndpoints,
    page_size: usize,
    column_renames: HashMap<Entity, HashMap<String, String>>,
}

impl BitrixClient {
    pub fn new(
        endpoints: CrmEndpoints,
        page_size: usize,
        column_renames: HashMap<Entity, HashMap<String, String>>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoints,
            page_size: page_size.max(1),
            column_renames,
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(url, status = status.as_u16(), "[CRM][ERROR] Request rejected");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: format!("body is not JSON: {e}"),
        })
    }
}

/// The `result` array of a response; a missing `result` is an empty list.
fn result_items(url: &str, body: &mut Value) -> Result<Vec<Value>, FetchError> {
    match body.get_mut("result").map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(FetchError::Malformed {
            url: url.to_string(),
            message: format!("`result` is not an array: {other}"),
        }),
    }
}

fn next_offset(body: &Value) -> Option<usize> {
    match body.get("next")? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl CrmApi for BitrixClient {
    async fn fetch_records(
        &self,
        entity: Entity,
        window: &RunWindow,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.endpoints.entity_url(entity);
        let mut records = Vec::new();
        let mut start = 0usize;

        loop {
            let query = [
                ("start", start.to_string()),
                ("filter[>=DATE_MODIFY]", window.start_param()),
                ("filter[<=DATE_MODIFY]", window.end_param()),
                ("select[]", "*".to_string()),
                ("select[]", "UF_*".to_string()),
            ];
            let mut body = self.get_json(url, &query).await?;
            let items = result_items(url, &mut body)?;
            let page_len = items.len();
            debug!(%entity, start, page_len, "[CRM] Fetched page");

            for item in items {
                match item {
                    Value::Object(record) => records.push(record),
                    other => {
                        return Err(FetchError::Malformed {
                            url: url.to_string(),
                            message: format!("record is not an object: {other}"),
                        })
                    }
                }
            }

            if page_len < self.page_size {
                break;
            }
            let next = next_offset(&body).unwrap_or(start + self.page_size);
            if next <= start {
                break;
            }
            start = next;
        }

        info!(%entity, records = records.len(), "[CRM] Fetched records");
        Ok(records)
    }

    fn column_renames(&self, entity: Entity) -> HashMap<String, String> {
        self.column_renames
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    async fn fetch_list(&self, list: ReferenceList) -> Result<Vec<Value>, FetchError> {
        let url = self.endpoints.list_url(list);
        let mut body = self.get_json(url, &[]).await?;
        let items = result_items(url, &mut body)?;
        info!(%list, items = items.len(), "[CRM] Fetched list");
        Ok(items)
    }
}
