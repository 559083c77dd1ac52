use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the correlation token attached to every request.
const TOKEN_LEN: usize = 8;

/// Opaque per-request correlation token. Lives in a different namespace from
/// job ids: a job outlives the request that triggered it, the token does not.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub fn request_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Tag the request with a fresh token, expose it to handlers through request
/// extensions and to clients through the `x-request-id` header, and emit one
/// access-log line once the response is ready.
pub async fn request_log(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(request_token());
    let method = request.method().clone();
    let uri = request.uri().clone();
    request.extensions_mut().insert(request_id.clone());

    let start = Instant::now();
    let mut response = next.run(request).await;
    let latency = start.elapsed();

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    tracing::info!(
        request_id = %request_id.0,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_short_and_alphanumeric() {
        let token = request_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_not_repeated() {
        let a = request_token();
        let b = request_token();
        assert_ne!(a, b);
    }
}
