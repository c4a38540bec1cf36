/**
 * HTTP Gateway
 *
 * Talks to the hosted document backend over REST and receives realtime
 * changes over a long-lived Server-Sent Events response.
 *
 * # Endpoints
 *
 * - `GET  /databases/{db}/collections/{col}/documents?queries[]=...`
 * - `GET  /databases/{db}/collections/{col}/documents/{id}`
 * - `POST /databases/{db}/collections/{col}/documents`
 * - `PATCH /databases/{db}/collections/{col}/documents/{id}`
 * - `GET  /realtime?project=...&channels[]=...` (text/event-stream)
 *
 * # Authentication
 *
 * Every request carries `X-Project`. A session token is sent as
 * `X-Session`; otherwise an API key, if configured, as `X-Api-Key`.
 *
 * # Realtime
 *
 * The stream is read chunk by chunk as raw bytes and decoded with
 * [`SseDecoder`], so chunk boundaries may fall anywhere. When
 * the stream ends or fails the subscription simply ends; reconnecting is
 * left to the caller.
 */

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::sse::SseDecoder;
use super::{DocumentQuery, Filter, Ordering, RemoteGateway, Result, Subscription};
use crate::shared::config::InboxConfig;
use crate::shared::error::GatewayError;

/// Capacity of each subscription's buffer
const SUBSCRIPTION_BUFFER: usize = 256;

/// Document listing response
#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    documents: Vec<serde_json::Value>,
}

/// reqwest-based gateway
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: InboxConfig,
    client: Client,
}

impl HttpGateway {
    /// Create a gateway for the configured backend
    pub fn new(config: InboxConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn documents_url(&self, collection: &str) -> String {
        self.config.api_url(&format!(
            "/databases/{}/collections/{}/documents",
            self.config.database, collection
        ))
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.documents_url(collection), id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("X-Project", &self.config.project);
        if let Some(token) = self.config.session_token.as_ref() {
            request.header("X-Session", token)
        } else if let Some(key) = self.config.api_key.as_ref() {
            request.header("X-Api-Key", key)
        } else {
            request
        }
    }
}

/// Encode a query as the backend's `queries[]` JSON strings
pub fn encode_query(query: &DocumentQuery) -> Vec<String> {
    let mut encoded = Vec::new();
    for filter in &query.filters {
        match filter {
            Filter::Equal { attribute, value } => encoded.push(
                serde_json::json!({"method": "equal", "attribute": attribute, "values": [value]})
                    .to_string(),
            ),
        }
    }
    match &query.order {
        Some(Ordering::Asc(attribute)) => encoded.push(
            serde_json::json!({"method": "orderAsc", "attribute": attribute}).to_string(),
        ),
        Some(Ordering::Desc(attribute)) => encoded.push(
            serde_json::json!({"method": "orderDesc", "attribute": attribute}).to_string(),
        ),
        None => {}
    }
    if let Some(limit) = query.limit {
        encoded.push(serde_json::json!({"method": "limit", "values": [limit]}).to_string());
    }
    encoded
}

/// Map a non-success response to a gateway error
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::unauthorized(body),
        StatusCode::NOT_FOUND => GatewayError::not_found(body),
        other => GatewayError::status(other.as_u16(), body),
    })
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<serde_json::Value>> {
        let params: Vec<(&str, String)> = encode_query(query)
            .into_iter()
            .map(|q| ("queries[]", q))
            .collect();

        let response = self
            .authorize(self.client.get(self.documents_url(collection)))
            .query(&params)
            .send()
            .await?;
        let list: DocumentList = check(response).await?.json().await?;
        tracing::debug!(
            "[Gateway] Listed {} of {} documents in {}",
            list.documents.len(),
            list.total,
            collection
        );
        Ok(list.documents)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let response = self
            .authorize(self.client.get(self.document_url(collection, id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "documentId": id, "data": data });
        let response = self
            .authorize(self.client.post(self.documents_url(collection)))
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "data": data });
        let response = self
            .authorize(self.client.patch(self.document_url(collection, id)))
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let url = self.config.api_url("/realtime");
        tracing::info!("[Gateway] Subscribing to {} via {}", channel, url);

        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "text/event-stream")
            .query(&[("project", self.config.project.as_str()), ("channels[]", channel)])
            .send()
            .await
            .map_err(|e| GatewayError::subscription(format!("network: {}", e)))?;
        let response = check(response).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel_name = channel.to_string();
        let pump = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!("[Gateway] Realtime stream for {} failed: {}", channel_name, e);
                        return;
                    }
                };
                for event in decoder.push(&chunk) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            tracing::info!("[Gateway] Realtime stream for {} closed", channel_name);
        });

        Ok(Subscription::new(channel, rx, Some(pump)))
    }
}
