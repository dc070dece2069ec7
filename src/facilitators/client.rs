use crate::facilitators::AdapterError;
use std::time::Duration;

pub(crate) fn build_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send a request with an explicit timeout and parse the JSON body.
/// Non-2xx responses surface as `UpstreamStatus`; an empty body is `null`.
pub(crate) async fn send_json(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<serde_json::Value, AdapterError> {
    let response = builder.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AdapterError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(AdapterError::UpstreamStatus(status.as_u16()));
    }

    if body.is_empty() {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_str(&body).map_err(|_| AdapterError::InvalidJson)
}

/// `send_json` with a single retry on transport-level failure. Only for
/// idempotent calls (`supported`, `verify`) — settle must go through the
/// idempotency engine instead.
pub(crate) async fn send_json_with_retry(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<serde_json::Value, AdapterError> {
    let first = match builder.try_clone() {
        Some(b) => b,
        None => return send_json(builder, timeout).await,
    };

    match send_json(first, timeout).await {
        Err(e) if e.is_network() => {
            tracing::warn!(error = %e, "upstream call failed at transport level, retrying once");
            send_json(builder, timeout).await
        }
        other => other,
    }
}

/// Probe a URL for a 2xx without caring about the body.
pub(crate) async fn send_ok(
    builder: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<(), AdapterError> {
    let response = builder.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            AdapterError::Timeout
        } else {
            AdapterError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::UpstreamStatus(status.as_u16()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_handles_trailing_and_leading_slashes() {
        assert_eq!(build_url("https://a.example/", "/verify"), "https://a.example/verify");
        assert_eq!(build_url("https://a.example/v2/x402", "settle"), "https://a.example/v2/x402/settle");
    }
}
