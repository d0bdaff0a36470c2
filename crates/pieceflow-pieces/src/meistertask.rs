//! MeisterTask "new task" polling source, deduped by the last seen task id.

use async_trait::async_trait;
use chrono::DateTime;
use pieceflow_triggers::{DedupeStrategy, FetchRequest, PolledItem, PollingSource, TriggerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PieceConfig;
use crate::http::VendorClient;

pub const MEISTERTASK_BASE_URL: &str = "https://www.meistertask.com";

#[derive(Debug, Serialize, Deserialize)]
struct Task {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    created_at: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Task {
    fn into_item(self) -> Result<PolledItem, TriggerError> {
        let created_at_ms = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| TriggerError::Decode {
                message: format!("meistertask created_at '{}': {e}", self.created_at),
            })?
            .timestamp_millis();
        let id = self.id.to_string();
        let data = serde_json::to_value(&self).map_err(|e| TriggerError::Decode {
            message: e.to_string(),
        })?;
        Ok(PolledItem::new(id, created_at_ms, data))
    }
}

/// New tasks in one project.
#[derive(Debug, Clone)]
pub struct MeisterTaskTasks {
    client: VendorClient,
    project_id: String,
}

impl MeisterTaskTasks {
    pub fn new(config: PieceConfig, project_id: impl Into<String>) -> Result<Self, TriggerError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(TriggerError::Config {
                message: "meistertask project_id is required".into(),
            });
        }
        Ok(Self {
            client: VendorClient::new(config)?,
            project_id,
        })
    }
}

#[async_trait]
impl PollingSource for MeisterTaskTasks {
    fn name(&self) -> &str {
        "meistertask"
    }

    fn strategy(&self) -> DedupeStrategy {
        DedupeStrategy::LastItem
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<Vec<PolledItem>, TriggerError> {
        let tasks: Vec<Task> = self
            .client
            .get_json(
                &format!("/api/projects/{}/tasks", self.project_id),
                &[
                    ("sort", "-created_at".to_string()),
                    ("items", request.limit.max(1).to_string()),
                ],
            )
            .await?;
        tasks.into_iter().map(Task::into_item).collect()
    }
}
