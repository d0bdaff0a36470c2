//! Polling trigger controller.
//!
//! Holds no remote state. The only thing persisted is the
//! [`PollingCursor`] under [`CURSOR_KEY`].

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::dedupe::{dedupe, seed_cursor};
use crate::config::PollingConfig;
use crate::errors::{StoreError, TriggerError};
use crate::trigger_ctx::TriggerCtx;
use crate::traits::{EmittedEvent, FetchRequest, PollingSource, Trigger};
use crate::types::{DisableOutcome, PollingCursor, TriggerKind, TriggerSource};

/// Store key holding the [`PollingCursor`].
pub const CURSOR_KEY: &str = "cursor";

/// Trigger controller for vendors that must be polled.
pub struct PollingTrigger<S> {
    trigger_type: String,
    source: S,
    config: PollingConfig,
}

impl<S: PollingSource> PollingTrigger<S> {
    pub fn new(trigger_type: impl Into<String>, source: S, config: PollingConfig) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            source,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    async fn load_cursor(&self, ctx: &TriggerCtx) -> Result<Option<PollingCursor>, TriggerError> {
        match ctx.store().get_json::<PollingCursor>(CURSOR_KEY).await {
            Ok(cursor) => Ok(cursor),
            Err(StoreError::Malformed { message, .. }) => {
                tracing::warn!(
                    trigger_id = %ctx.trigger_id(),
                    error = %message,
                    "ignoring malformed polling cursor"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S: PollingSource> Trigger for PollingTrigger<S> {
    fn trigger_type(&self) -> &str {
        &self.trigger_type
    }

    fn kind(&self) -> TriggerKind {
        TriggerKind::Polling
    }

    async fn on_enable(&self, ctx: &TriggerCtx) -> Result<(), TriggerError> {
        let items = self
            .source
            .fetch(FetchRequest {
                limit: self.config.seed_page_size,
                cursor: None,
            })
            .await?;

        let strategy = self.source.strategy();
        match seed_cursor(strategy, &items, Utc::now().timestamp_millis()) {
            Some(cursor) => ctx.store().put_json(CURSOR_KEY, &cursor).await?,
            None => ctx.store().delete(CURSOR_KEY).await?,
        }

        tracing::info!(
            trigger_id = %ctx.trigger_id(),
            source = self.source.name(),
            ?strategy,
            "polling cursor seeded"
        );
        Ok(())
    }

    async fn on_disable(&self, _ctx: &TriggerCtx) -> Result<DisableOutcome, TriggerError> {
        Ok(DisableOutcome::NoSubscription)
    }

    async fn run(&self, ctx: &TriggerCtx) -> Result<Vec<EmittedEvent>, TriggerError> {
        let cursor = self.load_cursor(ctx).await?;
        let items = self
            .source
            .fetch(FetchRequest {
                limit: self.config.page_size,
                cursor: cursor.as_ref(),
            })
            .await?;
        let fetched = items.len();

        let outcome = dedupe(self.source.strategy(), items, cursor.as_ref());
        if outcome.cursor != cursor {
            if let Some(next) = &outcome.cursor {
                ctx.store().put_json(CURSOR_KEY, next).await?;
            }
        }

        tracing::debug!(
            trigger_id = %ctx.trigger_id(),
            source = self.source.name(),
            fetched,
            new = outcome.new_items.len(),
            "poll complete"
        );

        Ok(outcome
            .new_items
            .into_iter()
            .map(|item| EmittedEvent {
                payload: item.data,
                source: TriggerSource::Poll {
                    item_id: Some(item.id),
                },
            })
            .collect())
    }

    async fn test(&self, _ctx: &TriggerCtx) -> Result<Vec<Value>, TriggerError> {
        let mut items = self
            .source
            .fetch(FetchRequest {
                limit: self.config.sample_size,
                cursor: None,
            })
            .await?;
        items.truncate(self.config.sample_size);
        items.reverse();
        Ok(items.into_iter().map(|item| item.data).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger_ctx::test_support::TestTriggerCtx;
    use crate::types::{DedupeStrategy, PolledItem};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Serves whatever page is currently loaded, truncated to the limit.
    struct MockSource {
        strategy: DedupeStrategy,
        page: Mutex<Vec<PolledItem>>,
        limits: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl MockSource {
        fn new(strategy: DedupeStrategy, page: Vec<PolledItem>) -> Self {
            Self {
                strategy,
                page: Mutex::new(page),
                limits: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn set_page(&self, page: Vec<PolledItem>) {
            *self.page.lock() = page;
        }
    }

    #[async_trait]
    impl PollingSource for MockSource {
        fn name(&self) -> &str {
            "mock"
        }

        fn strategy(&self) -> DedupeStrategy {
            self.strategy
        }

        async fn fetch(&self, request: FetchRequest<'_>) -> Result<Vec<PolledItem>, TriggerError> {
            self.limits.lock().push(request.limit);
            if self.fail {
                return Err(TriggerError::transport(Some(401), "unauthorized"));
            }
            Ok(self.page.lock().iter().take(request.limit).cloned().collect())
        }
    }

    fn item(id: &str, ts: i64) -> PolledItem {
        PolledItem::new(id, ts, json!({"id": id}))
    }

    fn page(ids_and_ts: &[(&str, i64)]) -> Vec<PolledItem> {
        ids_and_ts.iter().map(|(id, ts)| item(id, *ts)).collect()
    }

    fn payload_ids(events: &[EmittedEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| e.payload["id"].as_str().unwrap().to_string())
            .collect()
    }

    async fn stored_cursor(ctx: &TriggerCtx) -> Option<PollingCursor> {
        ctx.store().get_json(CURSOR_KEY).await.unwrap()
    }

    #[tokio::test]
    async fn test_enable_seeds_without_emitting() {
        let source = MockSource::new(
            DedupeStrategy::LastItem,
            page(&[("i3", 3), ("i2", 2), ("i1", 1)]),
        );
        let trigger = PollingTrigger::new("new_task", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();

        trigger.on_enable(&ctx).await.unwrap();

        assert_eq!(stored_cursor(&ctx).await, Some(PollingCursor::last_item("i3")));
        assert_eq!(*trigger.source().limits.lock(), vec![1]);

        // Nothing new since the seed.
        assert!(trigger.run(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_item_run_emits_oldest_first() {
        let source = MockSource::new(DedupeStrategy::LastItem, page(&[("i3", 3)]));
        let trigger = PollingTrigger::new("new_task", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        trigger.on_enable(&ctx).await.unwrap();

        trigger
            .source()
            .set_page(page(&[("i5", 5), ("i4", 4), ("i3", 3), ("i2", 2), ("i1", 1)]));
        let events = trigger.run(&ctx).await.unwrap();

        assert_eq!(payload_ids(&events), vec!["i4", "i5"]);
        assert_eq!(stored_cursor(&ctx).await, Some(PollingCursor::last_item("i5")));
        match &events[0].source {
            TriggerSource::Poll { item_id } => assert_eq!(item_id.as_deref(), Some("i4")),
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_time_based_run() {
        let source = MockSource::new(DedupeStrategy::TimeBased, vec![]);
        let trigger = PollingTrigger::new("new_video", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        ctx.store()
            .put_json(CURSOR_KEY, &PollingCursor::time(35))
            .await
            .unwrap();

        trigger
            .source()
            .set_page(page(&[("t50", 50), ("t40", 40), ("t30", 30)]));
        let events = trigger.run(&ctx).await.unwrap();

        assert_eq!(payload_ids(&events), vec!["t40", "t50"]);
        assert_eq!(stored_cursor(&ctx).await, Some(PollingCursor::time(50)));
    }

    #[tokio::test]
    async fn test_time_based_enable_on_empty_page_uses_now() {
        let source = MockSource::new(DedupeStrategy::TimeBased, vec![]);
        let trigger = PollingTrigger::new("new_video", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();

        let before = Utc::now().timestamp_millis();
        trigger.on_enable(&ctx).await.unwrap();
        let seeded = stored_cursor(&ctx).await.and_then(|c| c.epoch_ms()).unwrap();
        assert!(seeded >= before);
    }

    #[tokio::test]
    async fn test_cursor_is_monotonic_across_polls() {
        let source = MockSource::new(DedupeStrategy::TimeBased, page(&[("a", 10)]));
        let trigger = PollingTrigger::new("new_video", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        trigger.on_enable(&ctx).await.unwrap();

        let pages = [
            page(&[("b", 20), ("a", 10)]),
            page(&[("b", 20), ("a", 10)]),
            page(&[("d", 40), ("c", 30), ("b", 20)]),
            page(&[("c", 30)]),
            page(&[]),
        ];

        let mut last = 10;
        let mut emitted = Vec::new();
        for p in pages {
            trigger.source().set_page(p);
            emitted.extend(payload_ids(&trigger.run(&ctx).await.unwrap()));
            let now = stored_cursor(&ctx).await.and_then(|c| c.epoch_ms()).unwrap();
            assert!(now >= last, "cursor went from {last} to {now}");
            last = now;
        }
        assert_eq!(last, 40);
        assert_eq!(emitted, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_disable_is_noop() {
        let source = MockSource::new(DedupeStrategy::LastItem, page(&[("i1", 1)]));
        let trigger = PollingTrigger::new("new_task", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        trigger.on_enable(&ctx).await.unwrap();

        let fetches = trigger.source().limits.lock().len();
        let outcome = trigger.on_disable(&ctx).await.unwrap();
        assert_eq!(outcome, DisableOutcome::NoSubscription);
        assert_eq!(trigger.source().limits.lock().len(), fetches);
    }

    #[tokio::test]
    async fn test_test_is_a_dry_run() {
        let source = MockSource::new(
            DedupeStrategy::LastItem,
            page(&[("i3", 3), ("i2", 2), ("i1", 1)]),
        );
        let trigger = PollingTrigger::new(
            "new_task",
            source,
            PollingConfig::default().sample_size(2),
        );
        let (ctx, store) = TestTriggerCtx::builder().build();

        let samples = trigger.test(&ctx).await.unwrap();
        assert_eq!(samples, vec![json!({"id": "i2"}), json!({"id": "i3"})]);
        assert!(store.snapshot(ctx.store().scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagates_and_cursor_is_kept() {
        let mut source = MockSource::new(DedupeStrategy::LastItem, vec![]);
        source.fail = true;
        let trigger = PollingTrigger::new("new_task", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        ctx.store()
            .put_json(CURSOR_KEY, &PollingCursor::last_item("i3"))
            .await
            .unwrap();

        let err = trigger.run(&ctx).await.unwrap_err();
        assert!(matches!(err, TriggerError::Transport { status: Some(401), .. }));
        assert_eq!(stored_cursor(&ctx).await, Some(PollingCursor::last_item("i3")));
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_treated_as_absent() {
        let source = MockSource::new(DedupeStrategy::LastItem, page(&[("i2", 2), ("i1", 1)]));
        let trigger = PollingTrigger::new("new_task", source, PollingConfig::default());
        let (ctx, _store) = TestTriggerCtx::builder().build();
        ctx.store().put(CURSOR_KEY, json!(17)).await.unwrap();

        let events = trigger.run(&ctx).await.unwrap();
        assert_eq!(payload_ids(&events), vec!["i1", "i2"]);
        assert_eq!(stored_cursor(&ctx).await, Some(PollingCursor::last_item("i2")));
    }
}
