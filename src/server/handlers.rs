use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use futures_util::stream;
use serde_json::json;

use crate::auth::Principal;
use crate::driver::{RecordStream, StreamEvent};
use crate::errors::GatewayError;
use crate::executor::Gateway;

use super::models::{
    invalid_query_body, render_batch_envelope, render_compact_record, StatementEntry,
    StatementsPayload,
};
use super::AppState;

const NDJSON: &str = "application/x-ndjson";

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "service": "boltgate",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `POST /db/{database}/tx/commit` — the begin-and-commit-in-one-request
/// endpoint. The Accept header picks the shape: `application/json` takes a
/// statement container and answers with the legacy envelope,
/// `application/x-ndjson` takes a single statement and streams one compact
/// object per record.
pub async fn tx_commit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(database): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let gateway = &app_state.gateway;

    let Some((username, password)) = basic_credentials(&headers) else {
        return unauthorized();
    };
    let principal = match gateway.authenticate(&username, &password).await {
        Ok(principal) => principal,
        Err(GatewayError::Auth) => return unauthorized(),
        Err(e) => return error_response(&e),
    };
    log::debug!(
        "request for database '{}' as '{}'",
        database,
        principal.username
    );

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept.contains(NDJSON) {
        stream_response(gateway, &principal, &database, &body).await
    } else {
        batch_response(gateway, &principal, &database, &body).await
    }
}

async fn batch_response(
    gateway: &Gateway,
    principal: &Principal,
    database: &str,
    body: &Bytes,
) -> Response {
    let payload: StatementsPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return bad_payload(e),
    };
    let container = match payload.into_container() {
        Ok(container) => container,
        Err(e) => return error_response(&e),
    };

    match gateway.run(principal, database, container).await {
        Ok(outcome) => (StatusCode::OK, Json(render_batch_envelope(&outcome))).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn stream_response(
    gateway: &Gateway,
    principal: &Principal,
    database: &str,
    body: &Bytes,
) -> Response {
    let entry: StatementEntry = match serde_json::from_slice(body) {
        Ok(entry) => entry,
        Err(e) => return bad_payload(e),
    };
    let query = match entry.into_annotated() {
        Ok(query) => query,
        Err(e) => return error_response(&e),
    };

    match gateway.stream(principal, database, &query).await {
        Ok(record_stream) => ndjson_response(record_stream),
        // Under server-side routing no EXPLAIN pre-pass runs, so a syntax
        // error first surfaces from RUN; it still answers as an invalid
        // query here.
        Err(GatewayError::Database(e)) if e.is_syntax_error() => {
            error_response(&GatewayError::InvalidQuery(query.text.clone()))
        }
        Err(e) => error_response(&e),
    }
}

fn ndjson_response(record_stream: RecordStream) -> Response {
    let columns: Arc<Vec<String>> = Arc::new(record_stream.columns().to_vec());

    let body_stream = stream::unfold(record_stream, move |mut record_stream| {
        let columns = Arc::clone(&columns);
        async move {
            loop {
                let event = record_stream.next().await?;
                let line = match event {
                    StreamEvent::Record(values) => {
                        let record = render_compact_record(&columns, &values);
                        match serde_json::to_string(&record) {
                            Ok(mut line) => {
                                line.push('\n');
                                line
                            }
                            Err(e) => {
                                log::error!("failed to serialize record: {}", e);
                                continue;
                            }
                        }
                    }
                    StreamEvent::End(_) => continue,
                    StreamEvent::Error(e) => {
                        log::error!("record stream terminated: {}", e);
                        let mut line = stream_error_line(&e).to_string();
                        line.push('\n');
                        line
                    }
                };
                return Some((
                    Ok::<_, std::convert::Infallible>(Bytes::from(line)),
                    record_stream,
                ));
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON)
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|e| {
            log::error!("failed to build streaming response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

fn stream_error_line(error: &GatewayError) -> serde_json::Value {
    match error {
        GatewayError::Database(e) => json!({"error": e.code, "message": e.message}),
        other => json!({"error": "TransportError", "message": other.to_string()}),
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"boltgate\"")],
        Json(json!({"error": "Unauthorized", "status": 401})),
    )
        .into_response()
}

fn bad_payload(error: serde_json::Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "Invalid payload",
            "message": error.to_string(),
            "status": 400,
        })),
    )
        .into_response()
}

fn error_response(error: &GatewayError) -> Response {
    match error {
        GatewayError::InvalidQuery(query_text) => {
            (StatusCode::BAD_REQUEST, Json(invalid_query_body(query_text))).into_response()
        }
        GatewayError::InvalidParameter(message) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid parameter",
                "message": message,
                "status": 400,
            })),
        )
            .into_response(),
        GatewayError::Auth => unauthorized(),
        GatewayError::Database(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": e.code,
                "message": e.message,
                "status": 500,
            })),
        )
            .into_response(),
        GatewayError::Transport(message) => {
            log::error!("transport failure: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "TransportError",
                    "message": "the database is unavailable",
                    "status": 500,
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_basic_credentials_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic bmVvNGo6cGFzc3dvcmQ="), // neo4j:password
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("neo4j".to_string(), "password".to_string()))
        );
    }

    #[test]
    fn test_missing_or_malformed_credentials() {
        assert_eq!(basic_credentials(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token"),
        );
        assert_eq!(basic_credentials(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic not-base64!"),
        );
        assert_eq!(basic_credentials(&headers), None);
    }

    #[test]
    fn test_password_may_contain_colon() {
        let mut headers = HeaderMap::new();
        // alice:pa:ss
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic YWxpY2U6cGE6c3M="),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("alice".to_string(), "pa:ss".to_string()))
        );
    }
}
