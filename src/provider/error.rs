use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by provider clients and the dispatcher.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider name is not one of the supported backends, or the backend
    /// was compiled out of this build.
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The backend could not be reached at all.
    #[error("failed to connect to provider API")]
    Connection(#[source] reqwest::Error),

    /// The backend does not know the requested model (HTTP 404).
    #[error("model not found: {model}: {message}")]
    ModelNotFound { model: String, message: String },

    /// Any other non-success HTTP status.
    #[error("provider API error: HTTP {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("HTTP transport error")]
    Http(#[source] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_connection(&self) -> bool {
        matches!(self, ProviderError::Connection(_))
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self, ProviderError::ModelNotFound { .. })
    }

    /// Classify an error returned by `reqwest` while sending or reading.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ProviderError::Connection(e)
        } else {
            ProviderError::Http(e)
        }
    }

    /// Classify a non-success HTTP response.
    pub(crate) fn from_status(status: StatusCode, body: String, model: &str) -> Self {
        if status == StatusCode::NOT_FOUND {
            ProviderError::ModelNotFound {
                model: model.to_string(),
                message: body,
            }
        } else {
            ProviderError::Api { status, body }
        }
    }
}

/// Turn a non-success response into a [`ProviderError`], passing success through.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status, body, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_model_not_found() {
        let e = ProviderError::from_status(StatusCode::NOT_FOUND, "nope".into(), "llama9");
        assert!(e.is_model_not_found());
        assert!(e.to_string().contains("llama9"));
    }

    #[test]
    fn other_statuses_map_to_api_error() {
        let e = ProviderError::from_status(StatusCode::UNAUTHORIZED, "bad key".into(), "gpt-4o");
        match e {
            ProviderError::Api { status, body } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
