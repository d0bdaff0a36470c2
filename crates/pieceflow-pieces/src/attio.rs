//! Attio CRM webhooks.
//!
//! Attio signs every delivery with a hex HMAC-SHA256 of the raw body in the
//! `Attio-Signature` header, keyed by the secret returned at creation. One
//! delivery can batch several events.

use async_trait::async_trait;
use pieceflow_triggers::{
    SignatureScheme, SubscriptionRecord, TriggerError, WebhookRegistration, WebhookVendor,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::PieceConfig;
use crate::http::VendorClient;

pub const ATTIO_BASE_URL: &str = "https://api.attio.com";
pub const SIGNATURE_HEADER: &str = "Attio-Signature";

#[derive(Debug, Serialize)]
struct CreateWebhookRequest<'a> {
    data: CreateWebhookData<'a>,
}

#[derive(Debug, Serialize)]
struct CreateWebhookData<'a> {
    target_url: &'a str,
    subscriptions: Vec<Subscription<'a>>,
}

#[derive(Debug, Serialize)]
struct Subscription<'a> {
    event_type: &'a str,
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CreateWebhookResponse {
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    id: WebhookId,
    #[serde(default)]
    secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookId {
    #[serde(default)]
    webhook_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delivery {
    events: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct AttioWebhooks {
    client: VendorClient,
}

impl AttioWebhooks {
    pub fn new(config: PieceConfig) -> Result<Self, TriggerError> {
        Ok(Self {
            client: VendorClient::new(config)?,
        })
    }
}

#[async_trait]
impl WebhookVendor for AttioWebhooks {
    fn name(&self) -> &str {
        "attio"
    }

    async fn subscribe(
        &self,
        target_url: &str,
        events: &[String],
    ) -> Result<WebhookRegistration, TriggerError> {
        let request = CreateWebhookRequest {
            data: CreateWebhookData {
                target_url,
                subscriptions: events
                    .iter()
                    .map(|event_type| Subscription {
                        event_type: event_type.as_str(),
                        filter: None,
                    })
                    .collect(),
            },
        };
        let response: CreateWebhookResponse =
            self.client.post_json("/v2/webhooks", &request).await?;
        Ok(WebhookRegistration {
            id: response.data.id.webhook_id,
            secret: response.data.secret,
        })
    }

    async fn unsubscribe(
        &self,
        record: &SubscriptionRecord,
        _target_url: Option<&str>,
    ) -> Result<(), TriggerError> {
        self.client
            .delete::<()>(&format!("/v2/webhooks/{}", record.webhook_id), None)
            .await
    }

    fn signature_scheme(&self) -> Option<SignatureScheme> {
        Some(SignatureScheme::hex(SIGNATURE_HEADER))
    }

    /// One event per entry of `events`. A body that is not a batch passes
    /// through unchanged.
    fn events(&self, body: &Value) -> Vec<Value> {
        match serde_json::from_value::<Delivery>(body.clone()) {
            Ok(Delivery {
                events: Some(events),
            }) => events,
            _ => vec![body.clone()],
        }
    }

    fn sample(&self) -> Value {
        json!({
            "webhook_id": "a3b1c2d4-0000-4000-8000-000000000001",
            "events": [{
                "event_type": "record.created",
                "id": {
                    "workspace_id": "14beef7a-99f7-4534-a87e-70b564330a4c",
                    "object_id": "97052eb9-e65e-443f-a297-f2d9a4a7f795",
                    "record_id": "bf071e1f-6035-429d-b874-d83ea64ea13b"
                },
                "actor": {"type": "workspace-member", "id": "50cf242c-7fa3-4cad-87d0-75b1af71c57b"}
            }]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pieceflow_triggers::{
        TestTriggerCtx, Trigger, WebhookPayload, WebhookTrigger, WebhookTriggerConfig,
        SUBSCRIPTION_KEY,
    };
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vendor(server: &MockServer) -> AttioWebhooks {
        AttioWebhooks::new(PieceConfig::bearer(server.uri(), "attio-token")).unwrap()
    }

    fn trigger(server: &MockServer) -> WebhookTrigger<AttioWebhooks> {
        WebhookTrigger::new(
            "attio_record_created",
            vendor(server),
            WebhookTriggerConfig::default().event("record.created"),
        )
    }

    #[tokio::test]
    async fn test_subscribe_sends_attio_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/webhooks"))
            .and(header("authorization", "Bearer attio-token"))
            .and(body_json(json!({
                "data": {
                    "target_url": "https://hooks.example/abc",
                    "subscriptions": [{"event_type": "record.created", "filter": null}]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": {"workspace_id": "w1", "webhook_id": "wh-1"}, "secret": "s3cr3t"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registration = vendor(&server)
            .subscribe("https://hooks.example/abc", &["record.created".to_string()])
            .await
            .unwrap();
        assert_eq!(registration.id.as_deref(), Some("wh-1"));
        assert_eq!(registration.secret.as_deref(), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn test_enable_then_disable_deletes_stored_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": {"webhook_id": "wh-42"}, "secret": "k"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v2/webhooks/wh-42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, store) = TestTriggerCtx::builder()
            .webhook_url("https://hooks.example/abc")
            .build();
        let trigger = trigger(&server);
        trigger.on_enable(&ctx).await.unwrap();
        assert_eq!(
            store.snapshot(ctx.store().scope()).await.get(SUBSCRIPTION_KEY),
            Some(&json!({"webhookId": "wh-42", "secret": "k"}))
        );

        trigger.on_disable(&ctx).await.unwrap();
        assert!(store.snapshot(ctx.store().scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_webhook_id_is_registration_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": {}, "secret": "k"}
            })))
            .mount(&server)
            .await;

        let (ctx, store) = TestTriggerCtx::builder()
            .webhook_url("https://hooks.example/abc")
            .build();
        let err = trigger(&server).on_enable(&ctx).await.unwrap_err();
        assert!(matches!(err, TriggerError::Registration { .. }));
        assert!(store.snapshot(ctx.store().scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_vendor_outage_fails_enable_and_persists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/webhooks"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let (ctx, store) = TestTriggerCtx::builder()
            .webhook_url("https://hooks.example/abc")
            .build();
        let err = trigger(&server).on_enable(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            TriggerError::Transport { status: Some(500), ref message } if message == "down"
        ));
        assert!(err.is_retryable());
        assert!(store.snapshot(ctx.store().scope()).await.is_empty());
    }

    #[tokio::test]
    async fn test_signed_batch_splits_into_events() {
        let server = MockServer::start().await;
        let (ctx, _store) = TestTriggerCtx::builder().build();
        ctx.store()
            .put(SUBSCRIPTION_KEY, json!({"webhookId": "wh-1", "secret": "k"}))
            .await
            .unwrap();

        let raw = br#"{"webhook_id":"wh-1","events":[{"event_type":"record.created","n":1},{"event_type":"record.created","n":2}]}"#.to_vec();
        let signature = SignatureScheme::hex(SIGNATURE_HEADER).sign("k", &raw);
        let payload = WebhookPayload::from_raw(Default::default(), raw)
            .with_header(SIGNATURE_HEADER, signature);

        let ctx = ctx.with_payload(payload);
        let events = trigger(&server).run(&ctx).await.unwrap();
        let ns: Vec<_> = events.iter().map(|e| e.payload["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_bad_signature_emits_nothing() {
        let server = MockServer::start().await;
        let (ctx, _store) = TestTriggerCtx::builder().build();
        ctx.store()
            .put(SUBSCRIPTION_KEY, json!({"webhookId": "wh-1", "secret": "k"}))
            .await
            .unwrap();

        let payload = WebhookPayload::new(json!({"events": [{"event_type": "record.created"}]}))
            .with_header(SIGNATURE_HEADER, "00ff");
        let ctx = ctx.with_payload(payload);
        assert!(trigger(&server).run(&ctx).await.unwrap().is_empty());
    }

    #[test]
    fn test_events_passthrough_for_unbatched_body() {
        let vendor = AttioWebhooks::new(PieceConfig::bearer(ATTIO_BASE_URL, "t")).unwrap();
        assert_eq!(vendor.events(&json!("ping")), vec![json!("ping")]);
        assert!(vendor.events(&json!({"events": []})).is_empty());
        assert_eq!(
            vendor.events(&json!({"webhook_id": "wh-1"})),
            vec![json!({"webhook_id": "wh-1"})]
        );
    }

    #[tokio::test]
    async fn test_sample_used_by_test() {
        let server = MockServer::start().await;
        let (ctx, _store) = TestTriggerCtx::builder().build();
        let samples = trigger(&server).test(&ctx).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["event_type"], "record.created");
    }
}
