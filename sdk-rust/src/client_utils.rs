use crate::{types::ApiEnvelope, FolioError, FolioResult, TokenProvider};
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde_json::Value;

/// Send the request and read the body as JSON.
/// Throws error on non OK status code.
pub(crate) async fn send_json(request: RequestBuilder) -> FolioResult<Value> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    read_json(response).await
}

/// Send the request with the provider's bearer token. A 401 is reported back
/// to the provider before the error is returned.
pub(crate) async fn send_authed(
    tokens: &dyn TokenProvider,
    request: RequestBuilder,
) -> FolioResult<Response> {
    let token = tokens.bearer_token().ok_or(FolioError::AuthRequired)?;
    let response = request
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .send()
        .await?;
    if response.status().is_success() {
        return Ok(response);
    }

    let error = status_error(response).await;
    if matches!(error, FolioError::Unauthorized(_)) {
        tokens.on_unauthorized(&token);
    }
    Err(error)
}

/// Read a JSON body, treating an empty body as `null`.
pub(crate) async fn read_json(response: Response) -> FolioResult<Value> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| FolioError::Invariant("backend", format!("invalid JSON body: {e}")))
}

/// Turn a non-OK response into the matching error, keeping the backend's
/// `error` or `message` text when it sends one.
pub(crate) async fn status_error(response: Response) -> FolioError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, &body)
}

pub(crate) fn error_for_status(status: StatusCode, body: &str) -> FolioError {
    let reason = serde_json::from_str::<ApiEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.reason().map(str::to_string));

    match status {
        StatusCode::UNAUTHORIZED => {
            FolioError::Unauthorized(reason.unwrap_or_else(|| "session expired".to_string()))
        }
        StatusCode::NOT_FOUND => {
            FolioError::NotFound(reason.unwrap_or_else(|| "record not found".to_string()))
        }
        StatusCode::TOO_MANY_REQUESTS => FolioError::RateLimited(
            reason.unwrap_or_else(|| "too many requests".to_string()),
        ),
        status if status.is_client_error() => match reason {
            Some(reason) => FolioError::Validation(reason),
            None => FolioError::StatusCode(status, body.to_string()),
        },
        status => FolioError::StatusCode(status, reason.unwrap_or_else(|| body.to_string())),
    }
}

/// Parse the standard `{ success, data, message | error }` envelope. A body
/// that is not an object is treated as an empty envelope.
pub(crate) fn envelope(body: &Value) -> ApiEnvelope {
    serde_json::from_value(body.clone()).unwrap_or_default()
}

/// Fail with `Rejected` when a 2xx reply still says `success: false`.
pub(crate) fn ensure_success(body: &Value) -> FolioResult<()> {
    let envelope = envelope(body);
    if envelope.success == Some(false) {
        return Err(FolioError::Rejected(
            envelope
                .reason()
                .unwrap_or("request was not successful")
                .to_string(),
        ));
    }
    Ok(())
}
