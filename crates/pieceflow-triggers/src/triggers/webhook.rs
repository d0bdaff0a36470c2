//! Webhook-style trigger controller.
//!
//! Registers a remote subscription on enable, deletes it on disable, and
//! turns each inbound delivery into zero or more events.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::WebhookTriggerConfig;
use crate::errors::{StoreError, TriggerError};
use crate::trigger_ctx::TriggerCtx;
use crate::traits::{EmittedEvent, Trigger, WebhookVendor};
use crate::types::{DisableOutcome, SubscriptionRecord, TriggerKind, TriggerSource};

/// Store key holding the [`SubscriptionRecord`].
pub const SUBSCRIPTION_KEY: &str = "webhook";

/// Trigger controller for vendors that push events to a callback URL.
pub struct WebhookTrigger<V> {
    trigger_type: String,
    vendor: V,
    config: WebhookTriggerConfig,
}

impl<V: WebhookVendor> WebhookTrigger<V> {
    pub fn new(trigger_type: impl Into<String>, vendor: V, config: WebhookTriggerConfig) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            vendor,
            config,
        }
    }

    pub fn vendor(&self) -> &V {
        &self.vendor
    }

    pub fn config(&self) -> &WebhookTriggerConfig {
        &self.config
    }

    /// Split a delivery body into events and apply the configured filter.
    fn expand(&self, body: &Value) -> Vec<Value> {
        let events = self.vendor.events(body);
        match &self.config.filter {
            Some(filter) => events.into_iter().filter(|e| filter.matches(e)).collect(),
            None => events,
        }
    }

    async fn load_record(&self, ctx: &TriggerCtx) -> Result<Option<SubscriptionRecord>, TriggerError> {
        match ctx.store().get_json::<SubscriptionRecord>(SUBSCRIPTION_KEY).await {
            Ok(record) => Ok(record),
            Err(StoreError::Malformed { message, .. }) => {
                tracing::warn!(
                    trigger_id = %ctx.trigger_id(),
                    error = %message,
                    "ignoring malformed subscription record"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<V: WebhookVendor> Trigger for WebhookTrigger<V> {
    fn trigger_type(&self) -> &str {
        &self.trigger_type
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::Webhook
    }

    async fn on_enable(&self, ctx: &TriggerCtx) -> Result<(), TriggerError> {
        let target_url = ctx.require_webhook_url()?;

        // An unreadable record still names a remote webhook; disable clears it.
        if ctx
            .store()
            .get(SUBSCRIPTION_KEY)
            .await?
            .is_some_and(|value| !value.is_null())
        {
            return Err(TriggerError::AlreadyEnabled {
                trigger_id: ctx.trigger_id().to_string(),
            });
        }

        let registration = self
            .vendor
            .subscribe(target_url, &self.config.events)
            .await?;

        let webhook_id = registration
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TriggerError::Registration {
                message: format!("{} returned no webhook id", self.vendor.name()),
            })?;

        let record = SubscriptionRecord {
            webhook_id,
            secret: registration.secret,
        };
        ctx.store().put_json(SUBSCRIPTION_KEY, &record).await?;

        tracing::info!(
            trigger_id = %ctx.trigger_id(),
            vendor = self.vendor.name(),
            webhook_id = %record.webhook_id,
            "webhook registered"
        );
        Ok(())
    }

    async fn on_disable(&self, ctx: &TriggerCtx) -> Result<DisableOutcome, TriggerError> {
        let Some(record) = self.load_record(ctx).await? else {
            tracing::debug!(trigger_id = %ctx.trigger_id(), "no webhook to remove");
            ctx.store().delete(SUBSCRIPTION_KEY).await?;
            return Ok(DisableOutcome::NoSubscription);
        };

        let remote = self.vendor.unsubscribe(&record, ctx.webhook_url()).await;
        ctx.store().delete(SUBSCRIPTION_KEY).await?;

        match remote {
            Ok(()) => {
                tracing::info!(
                    trigger_id = %ctx.trigger_id(),
                    webhook_id = %record.webhook_id,
                    "webhook removed"
                );
                Ok(DisableOutcome::Removed {
                    webhook_id: record.webhook_id,
                })
            }
            Err(e) => {
                tracing::warn!(
                    trigger_id = %ctx.trigger_id(),
                    vendor = self.vendor.name(),
                    webhook_id = %record.webhook_id,
                    error = %e,
                    "failed to delete remote webhook, cleared local record"
                );
                Ok(DisableOutcome::RemovedLocally {
                    webhook_id: record.webhook_id,
                    warning: e.to_string(),
                })
            }
        }
    }

    async fn run(&self, ctx: &TriggerCtx) -> Result<Vec<EmittedEvent>, TriggerError> {
        let payload = ctx.payload().ok_or_else(|| TriggerError::Config {
            message: format!("trigger '{}' was run without a payload", ctx.trigger_id()),
        })?;

        let record = self.load_record(ctx).await?;

        if self.config.verify_signatures {
            if let (Some(scheme), Some(secret)) = (
                self.vendor.signature_scheme(),
                record.as_ref().and_then(|r| r.secret.as_deref()),
            ) {
                if let Err(e) = scheme.verify(secret, payload) {
                    tracing::warn!(
                        trigger_id = %ctx.trigger_id(),
                        vendor = self.vendor.name(),
                        error = %e,
                        "dropping webhook delivery"
                    );
                    return Ok(vec![]);
                }
            }
        }

        let webhook_id = record.map(|r| r.webhook_id);
        let events: Vec<EmittedEvent> = self
            .expand(&payload.body)
            .into_iter()
            .map(|payload| EmittedEvent {
                payload,
                source: TriggerSource::Webhook {
                    webhook_id: webhook_id.clone(),
                },
            })
            .collect();

        tracing::debug!(
            trigger_id = %ctx.trigger_id(),
            events = events.len(),
            "webhook delivery processed"
        );
        Ok(events)
    }

    async fn test(&self, ctx: &TriggerCtx) -> Result<Vec<Value>, TriggerError> {
        let body = match ctx.payload() {
            Some(payload) => payload.body.clone(),
            None => self.vendor.sample(),
        };
        if body.is_null() {
            return Ok(vec![]);
        }
        Ok(self.expand(&body))
    }
}
