//! Trigger lifecycle management.
//!
//! The [`TriggerRunner`] is the host-side driver: it owns the lifecycle
//! state of each registered instance, builds a [`TriggerCtx`] per
//! invocation, and forwards emitted events to the engine as
//! [`TriggerEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::TriggerError;
use crate::trigger_ctx::{StoreHandle, TriggerCtx};
use crate::traits::{EmittedEvent, Trigger, TriggerStore};
use crate::types::{DisableOutcome, TriggerEvent, TriggerKind, TriggerSource, TriggerState, WebhookPayload};

/// A configured trigger instance bound to a specific flow.
pub struct TriggerInstance {
    /// Unique id of this instance.
    pub id: String,
    /// Which flow this trigger is bound to.
    pub flow_id: String,
    /// The trigger implementation.
    pub trigger: Arc<dyn Trigger>,
    /// Callback URL provisioned by the host, for webhook triggers.
    pub webhook_url: Option<String>,
}

impl TriggerInstance {
    /// Store scope owned by this instance.
    pub fn scope(&self) -> String {
        format!("{}/{}", self.flow_id, self.id)
    }
}

struct Slot {
    instance: TriggerInstance,
    state: Mutex<TriggerState>,
}

/// Drives enable/disable/run for a set of trigger instances.
///
/// Invocations for one instance are expected to be serialized by the
/// caller; the state lock is never held across an await.
pub struct TriggerRunner {
    slots: HashMap<String, Slot>,
    store: Arc<dyn TriggerStore>,
    event_tx: mpsc::Sender<TriggerEvent>,
}

impl TriggerRunner {
    /// Create a new trigger runner.
    ///
    /// - `instances`: configured triggers to manage, all starting disabled
    /// - `store`: persistence shared by all instances, scoped per instance
    /// - `event_tx`: channel receiving emitted events
    pub fn new(
        instances: Vec<TriggerInstance>,
        store: Arc<dyn TriggerStore>,
        event_tx: mpsc::Sender<TriggerEvent>,
    ) -> Self {
        let slots = instances
            .into_iter()
            .map(|instance| {
                (
                    instance.id.clone(),
                    Slot {
                        instance,
                        state: Mutex::new(TriggerState::Disabled),
                    },
                )
            })
            .collect();
        Self {
            slots,
            store,
            event_tx,
        }
    }

    /// Current state of an instance, `None` if unknown.
    pub fn state(&self, trigger_id: &str) -> Option<TriggerState> {
        self.slots.get(trigger_id).map(|slot| *slot.state.lock())
    }

    /// `Disabled → Enabling → Enabled`. A failed enable returns to `Disabled`.
    pub async fn enable(&self, trigger_id: &str) -> Result<(), TriggerError> {
        let slot = self.slot(trigger_id)?;
        transition(slot, trigger_id, TriggerState::Disabled, TriggerState::Enabling)?;

        let ctx = self.ctx(&slot.instance, None);
        match slot.instance.trigger.on_enable(&ctx).await {
            Ok(()) => {
                *slot.state.lock() = TriggerState::Enabled;
                tracing::info!(
                    trigger_id = %trigger_id,
                    flow_id = %slot.instance.flow_id,
                    trigger_type = slot.instance.trigger.trigger_type(),
                    "trigger enabled"
                );
                Ok(())
            }
            Err(e) => {
                *slot.state.lock() = TriggerState::Disabled;
                tracing::error!(
                    trigger_id = %trigger_id,
                    flow_id = %slot.instance.flow_id,
                    "trigger enable failed: {e}"
                );
                Err(e)
            }
        }
    }

    /// `Enabled → Disabling → Disabled`. Always ends `Disabled`, even when
    /// the trigger reports an error.
    pub async fn disable(&self, trigger_id: &str) -> Result<DisableOutcome, TriggerError> {
        let slot = self.slot(trigger_id)?;
        transition(slot, trigger_id, TriggerState::Enabled, TriggerState::Disabling)?;

        let ctx = self.ctx(&slot.instance, None);
        let outcome = slot.instance.trigger.on_disable(&ctx).await;
        *slot.state.lock() = TriggerState::Disabled;

        match &outcome {
            Ok(DisableOutcome::RemovedLocally { warning, .. }) => tracing::warn!(
                trigger_id = %trigger_id,
                warning = %warning,
                "trigger disabled with remote cleanup warning"
            ),
            Ok(_) => tracing::info!(trigger_id = %trigger_id, "trigger disabled"),
            Err(e) => tracing::error!(trigger_id = %trigger_id, "trigger disable failed: {e}"),
        }
        outcome
    }

    /// Hand an inbound delivery to a webhook trigger and forward its
    /// events. Returns the number of events sent.
    pub async fn deliver(
        &self,
        trigger_id: &str,
        payload: WebhookPayload,
    ) -> Result<usize, TriggerError> {
        let slot = self.enabled_slot(trigger_id)?;
        let ctx = self.ctx(&slot.instance, Some(payload));
        let events = slot.instance.trigger.run(&ctx).await?;
        self.forward(&slot.instance, events).await
    }

    /// Run one poll for a polling trigger and forward its events. Returns
    /// the number of events sent.
    pub async fn poll(&self, trigger_id: &str) -> Result<usize, TriggerError> {
        let slot = self.enabled_slot(trigger_id)?;
        let ctx = self.ctx(&slot.instance, None);
        let events = slot.instance.trigger.run(&ctx).await?;
        self.forward(&slot.instance, events).await
    }

    /// Preview sample output. Works in any state and sends nothing.
    pub async fn test(
        &self,
        trigger_id: &str,
        payload: Option<WebhookPayload>,
    ) -> Result<Vec<Value>, TriggerError> {
        let slot = self.slot(trigger_id)?;
        let ctx = self.ctx(&slot.instance, payload);
        slot.instance.trigger.test(&ctx).await
    }

    /// Ids of every instance of the given kind.
    pub fn instances_of(&self, kind: TriggerKind) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .slots
            .values()
            .filter(|slot| slot.instance.trigger.kind() == kind)
            .map(|slot| slot.instance.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    fn slot(&self, trigger_id: &str) -> Result<&Slot, TriggerError> {
        self.slots
            .get(trigger_id)
            .ok_or_else(|| TriggerError::UnknownInstance {
                trigger_id: trigger_id.to_string(),
            })
    }

    fn enabled_slot(&self, trigger_id: &str) -> Result<&Slot, TriggerError> {
        let slot = self.slot(trigger_id)?;
        let state = *slot.state.lock();
        if state != TriggerState::Enabled {
            return Err(TriggerError::InvalidState {
                trigger_id: trigger_id.to_string(),
                expected: TriggerState::Enabled,
                actual: state,
            });
        }
        Ok(slot)
    }

    fn ctx(&self, instance: &TriggerInstance, payload: Option<WebhookPayload>) -> TriggerCtx {
        let store = StoreHandle::new(Arc::clone(&self.store), instance.scope());
        let mut ctx = TriggerCtx::new(instance.id.clone(), store);
        if let Some(url) = &instance.webhook_url {
            ctx = ctx.with_webhook_url(url.clone());
        }
        if let Some(payload) = payload {
            ctx = ctx.with_payload(payload);
        }
        ctx
    }

    async fn forward(
        &self,
        instance: &TriggerInstance,
        events: Vec<EmittedEvent>,
    ) -> Result<usize, TriggerError> {
        let count = events.len();
        for event in events {
            let idempotency_key = match &event.source {
                TriggerSource::Poll { item_id: Some(id) } => Some(format!("poll:{}:{id}", instance.id)),
                _ => None,
            };
            let event = TriggerEvent {
                flow_id: instance.flow_id.clone(),
                trigger_id: instance.id.clone(),
                payload: event.payload,
                source: event.source,
                idempotency_key,
            };
            self.event_tx
                .send(event)
                .await
                .map_err(|_| TriggerError::ChannelClosed)?;
        }
        Ok(count)
    }
}

fn transition(
    slot: &Slot,
    trigger_id: &str,
    from: TriggerState,
    to: TriggerState,
) -> Result<(), TriggerError> {
    let mut state = slot.state.lock();
    if *state != from {
        return Err(TriggerError::InvalidState {
            trigger_id: trigger_id.to_string(),
            expected: from,
            actual: *state,
        });
    }
    *state = to;
    Ok(())
}
