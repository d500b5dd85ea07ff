//! HTTP handlers: webhook intake, health, and type listings.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use hookrelay_core::InboundRequest;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::state::{AppState, WebhookRoute};

// ── Webhooks ──────────────────────────────────────────────────────

/// `POST <path>` for one configured webhook.
///
/// The request token is cancelled when this future is dropped, so
/// in-flight deliveries stop if the client goes away.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Extension(route): Extension<Arc<WebhookRoute>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), DispatchError> {
    let req = inbound_request(&headers, query.as_deref(), body);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state
        .service
        .process_webhook(&cancel, &route.name, &req, &route.recipients)
        .await?;

    Ok((StatusCode::OK, "OK"))
}

/// Snapshot the transport request. Non-UTF-8 header values are dropped.
pub fn inbound_request(headers: &HeaderMap, query: Option<&str>, body: Bytes) -> InboundRequest {
    let mut req = InboundRequest::new(Vec::from(body));
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            req = req.with_header(name.as_str(), value);
        }
    }
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            req = req.with_query(key, value);
        }
    }
    req
}

// ── Health & listings ─────────────────────────────────────────────

pub async fn health() -> &'static str {
    "OK"
}

pub async fn webhook_types(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.webhook_types.clone())
}

pub async fn notifier_types(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.notifier_types.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn inbound_request_copies_headers_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert("X-GitHub-Event", HeaderValue::from_static("push"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let req = inbound_request(
            &headers,
            Some("token=a%20b&token=second&x=1"),
            Bytes::from_static(b"{}"),
        );

        assert_eq!(req.header("x-github-event"), Some("push"));
        assert_eq!(req.content_type().as_deref(), Some("application/json"));
        assert_eq!(req.query("token"), Some("a b"));
        assert_eq!(req.query("x"), Some("1"));
        assert_eq!(req.body(), b"{}");
    }

    #[test]
    fn non_utf8_header_values_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bin", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        let req = inbound_request(&headers, None, Bytes::new());
        assert_eq!(req.header("x-bin"), None);
    }
}
