//! Kommo CRM lead webhooks and pipeline status options.
//!
//! Kommo webhooks are keyed by destination URL, so deletion sends the
//! callback URL rather than the webhook id. Deliveries group changed leads
//! by change kind.

use async_trait::async_trait;
use pieceflow_triggers::{
    DropdownOption, EventFilter, OptionsProvider, SubscriptionRecord, TriggerError,
    WebhookRegistration, WebhookVendor,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::PieceConfig;
use crate::http::VendorClient;

const WEBHOOKS_PATH: &str = "/api/v4/webhooks";
const PIPELINES_PATH: &str = "/api/v4/leads/pipelines";

#[derive(Debug, Serialize)]
struct CreateWebhookRequest<'a> {
    destination: &'a str,
    settings: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CreateWebhookResponse {
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct DeleteWebhookRequest<'a> {
    destination: &'a str,
}

#[derive(Debug, Deserialize)]
struct Delivery {
    leads: LeadChanges,
}

#[derive(Debug, Default, Deserialize)]
struct LeadChanges {
    #[serde(default)]
    add: Vec<Value>,
    #[serde(default)]
    status: Vec<Value>,
    #[serde(default)]
    update: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PipelinesResponse {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedPipelines,
}

#[derive(Debug, Deserialize)]
struct EmbeddedPipelines {
    #[serde(default)]
    pipelines: Vec<Pipeline>,
}

#[derive(Debug, Deserialize)]
struct Pipeline {
    id: i64,
    name: String,
    #[serde(rename = "_embedded", default)]
    embedded: EmbeddedStatuses,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedStatuses {
    #[serde(default)]
    statuses: Vec<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: i64,
    name: String,
}

/// Webhook ids arrive as numbers; records store them as strings.
fn id_to_string(id: Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct KommoWebhooks {
    client: VendorClient,
}

impl KommoWebhooks {
    pub fn new(config: PieceConfig) -> Result<Self, TriggerError> {
        Ok(Self {
            client: VendorClient::new(config)?,
        })
    }

    /// Filter that keeps only leads currently in `status_id`.
    pub fn status_filter(status_id: i64) -> EventFilter {
        EventFilter::new("status_id", status_id)
    }
}

#[async_trait]
impl WebhookVendor for KommoWebhooks {
    fn name(&self) -> &str {
        "kommo"
    }

    async fn subscribe(
        &self,
        target_url: &str,
        events: &[String],
    ) -> Result<WebhookRegistration, TriggerError> {
        let request = CreateWebhookRequest {
            destination: target_url,
            settings: events,
        };
        let response: CreateWebhookResponse =
            self.client.post_json(WEBHOOKS_PATH, &request).await?;
        Ok(WebhookRegistration {
            id: response.id.and_then(id_to_string),
            secret: None,
        })
    }

    async fn unsubscribe(
        &self,
        _record: &SubscriptionRecord,
        target_url: Option<&str>,
    ) -> Result<(), TriggerError> {
        let destination = target_url.ok_or_else(|| TriggerError::Config {
            message: "kommo webhooks are deleted by destination; no callback url".into(),
        })?;
        self.client
            .delete(WEBHOOKS_PATH, Some(&DeleteWebhookRequest { destination }))
            .await
    }

    /// One event per changed lead, in `add`, `status`, `update` order.
    fn events(&self, body: &Value) -> Vec<Value> {
        match serde_json::from_value::<Delivery>(body.clone()) {
            Ok(Delivery { leads }) => leads
                .add
                .into_iter()
                .chain(leads.status)
                .chain(leads.update)
                .collect(),
            Err(_) => vec![body.clone()],
        }
    }

    fn sample(&self) -> Value {
        json!({
            "leads": {
                "status": [{
                    "id": 25399013,
                    "name": "Lead title",
                    "status_id": 142,
                    "old_status_id": 7039101,
                    "price": 0,
                    "responsible_user_id": 123123,
                    "pipeline_id": 3104455,
                    "account_id": 29085955
                }]
            },
            "account": {"id": 29085955, "subdomain": "subdomain"}
        })
    }
}

/// Dropdown of lead statuses across the account's pipelines.
#[derive(Debug, Clone)]
pub struct KommoStatuses {
    client: VendorClient,
}

impl KommoStatuses {
    pub fn new(config: PieceConfig) -> Result<Self, TriggerError> {
        Ok(Self {
            client: VendorClient::new(config)?,
        })
    }
}

#[async_trait]
impl OptionsProvider for KommoStatuses {
    /// `context.pipeline_id`, when set, restricts the list to one pipeline.
    async fn options(&self, context: &Value) -> Result<Vec<DropdownOption>, TriggerError> {
        let pipeline_id = context.get("pipeline_id").and_then(Value::as_i64);
        let response: PipelinesResponse = self.client.get_json(PIPELINES_PATH, &[]).await?;

        let options = response
            .embedded
            .pipelines
            .into_iter()
            .filter(|p| pipeline_id.is_none_or(|id| id == p.id))
            .flat_map(|pipeline| {
                let pipeline_name = pipeline.name;
                pipeline
                    .embedded
                    .statuses
                    .into_iter()
                    .map(move |status| {
                        DropdownOption::new(format!("{pipeline_name} / {}", status.name), status.id)
                    })
            })
            .collect();
        Ok(options)
    }
}
