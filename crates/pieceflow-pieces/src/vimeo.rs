//! Vimeo "new video" polling source.
//!
//! Lists the authenticated user's videos newest first and dedupes by upload
//! time.

use async_trait::async_trait;
use chrono::DateTime;
use pieceflow_triggers::{DedupeStrategy, FetchRequest, PolledItem, PollingSource, TriggerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PieceConfig;
use crate::http::VendorClient;

pub const VIMEO_BASE_URL: &str = "https://api.vimeo.com";
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(default)]
    data: Vec<Video>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Video {
    /// `/videos/{id}`
    uri: String,
    #[serde(default)]
    name: Option<String>,
    created_time: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Video {
    fn into_item(self) -> Result<PolledItem, TriggerError> {
        let id = self
            .uri
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| TriggerError::Decode {
                message: format!("vimeo video uri has no id: {}", self.uri),
            })?;
        let created_at_ms = DateTime::parse_from_rfc3339(&self.created_time)
            .map_err(|e| TriggerError::Decode {
                message: format!("vimeo created_time '{}': {e}", self.created_time),
            })?
            .timestamp_millis();
        let data = serde_json::to_value(&self).map_err(|e| TriggerError::Decode {
            message: e.to_string(),
        })?;
        Ok(PolledItem::new(id, created_at_ms, data))
    }
}

#[derive(Debug, Clone)]
pub struct VimeoVideos {
    client: VendorClient,
}

impl VimeoVideos {
    pub fn new(config: PieceConfig) -> Result<Self, TriggerError> {
        Ok(Self {
            client: VendorClient::new(config)?,
        })
    }
}

#[async_trait]
impl PollingSource for VimeoVideos {
    fn name(&self) -> &str {
        "vimeo"
    }

    fn strategy(&self) -> DedupeStrategy {
        DedupeStrategy::TimeBased
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<Vec<PolledItem>, TriggerError> {
        let per_page = request.limit.clamp(1, MAX_PER_PAGE);
        let page: VideoPage = self
            .client
            .get_json(
                "/me/videos",
                &[
                    ("sort", "date".to_string()),
                    ("direction", "desc".to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;
        page.data.into_iter().map(Video::into_item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pieceflow_triggers::{
        PollingConfig, PollingCursor, PollingTrigger, TestTriggerCtx, Trigger, CURSOR_KEY,
    };
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> VimeoVideos {
        VimeoVideos::new(PieceConfig::bearer(server.uri(), "vimeo-token")).unwrap()
    }

    fn video(id: u32, created: &str) -> Value {
        json!({
            "uri": format!("/videos/{id}"),
            "name": format!("clip {id}"),
            "created_time": created,
            "link": format!("https://vimeo.com/{id}")
        })
    }

    async fn mount_page(server: &MockServer, per_page: &str, videos: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/me/videos"))
            .and(query_param("sort", "date"))
            .and(query_param("direction", "desc"))
            .and(query_param("per_page", per_page))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": videos})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_maps_uri_and_created_time() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "2",
            vec![
                video(202, "2024-03-02T10:00:00+00:00"),
                video(201, "2024-03-01T10:00:00+00:00"),
            ],
        )
        .await;

        let items = source(&server)
            .fetch(FetchRequest {
                limit: 2,
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "202");
        assert_eq!(items[0].created_at_ms, 1_709_373_600_000);
        assert_eq!(items[0].data["link"], "https://vimeo.com/202");
        assert_eq!(items[0].data["name"], "clip 202");
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_decode_error() {
        let server = MockServer::start().await;
        mount_page(&server, "1", vec![video(1, "yesterday")]).await;

        let err = source(&server)
            .fetch(FetchRequest {
                limit: 1,
                cursor: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_poll_emits_only_newer_videos() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "10",
            vec![
                video(3, "2024-03-03T00:00:00Z"),
                video(2, "2024-03-02T00:00:00Z"),
                video(1, "2024-03-01T00:00:00Z"),
            ],
        )
        .await;

        let (ctx, _store) = TestTriggerCtx::builder().build();
        let cutoff = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .timestamp_millis();
        ctx.store()
            .put_json(CURSOR_KEY, &PollingCursor::time(cutoff))
            .await
            .unwrap();

        let trigger = PollingTrigger::new("vimeo_new_video", source(&server), PollingConfig::default());
        let events = trigger.run(&ctx).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.payload["uri"].clone()).collect();
        assert_eq!(ids, vec![json!("/videos/2"), json!("/videos/3")]);

        let cursor: PollingCursor = ctx.store().get_json(CURSOR_KEY).await.unwrap().unwrap();
        assert_eq!(
            cursor.epoch_ms(),
            Some(
                DateTime::parse_from_rfc3339("2024-03-03T00:00:00Z")
                    .unwrap()
                    .timestamp_millis()
            )
        );
    }

    #[test]
    fn test_default_base_url() {
        let config = PieceConfig::bearer(VIMEO_BASE_URL, "t");
        let source = VimeoVideos::new(config).unwrap();
        assert_eq!(source.client.base_url(), "https://api.vimeo.com");
        assert_eq!(source.strategy(), DedupeStrategy::TimeBased);
    }

    #[tokio::test]
    async fn test_per_page_is_capped() {
        let server = MockServer::start().await;
        mount_page(&server, "100", vec![]).await;

        let items = source(&server)
            .fetch(FetchRequest {
                limit: 500,
                cursor: None,
            })
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
