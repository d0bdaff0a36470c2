//! Shared `reqwest` client used by every vendor adapter.

use pieceflow_triggers::TriggerError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{PieceAuth, PieceConfig};

/// Authenticated HTTP client bound to one vendor base URL.
#[derive(Debug, Clone)]
pub struct VendorClient {
    client: Client,
    config: PieceConfig,
}

impl VendorClient {
    pub fn new(config: PieceConfig) -> Result<Self, TriggerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TriggerError::Config {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            PieceAuth::Bearer { token } => request.bearer_auth(token),
            PieceAuth::Header { name, value } => request.header(name.as_str(), value.as_str()),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TriggerError> {
        let request = self.client.get(self.url(path)).query(query);
        let response = self.send(request).await?;
        decode(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TriggerError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.send(request).await?;
        decode(response).await
    }

    /// DELETE with an optional JSON body. The response body is ignored.
    pub async fn delete<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), TriggerError> {
        let mut request = self.client.delete(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TriggerError> {
        let request = self
            .authorize(request)
            .header("Accept", "application/json")
            .build()
            .map_err(|e| TriggerError::Config {
                message: format!("invalid vendor request: {e}"),
            })?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| TriggerError::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::debug!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                "vendor request failed"
            );
            return Err(TriggerError::transport(Some(status.as_u16()), error_text));
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TriggerError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TriggerError::transport(None, e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TriggerError::Decode {
        message: e.to_string(),
    })
}
