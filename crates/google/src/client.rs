use std::time::Duration;

use huntbot_core::errors::BackendError;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GoogleApiError {
    #[error("invalid base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{operation} request failed: {source}")]
    Request {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned {status}: {message}")]
    Status { operation: String, status: StatusCode, message: String },
}

impl GoogleApiError {
    pub fn into_store(self) -> BackendError {
        BackendError::Store(self.to_string())
    }

    pub fn into_documents(self) -> BackendError {
        BackendError::Documents(self.to_string())
    }
}

/// Authenticated HTTP access to one Google API base URL.
#[derive(Clone)]
pub struct GoogleClient {
    http: Client,
    base_url: Url,
    access_token: SecretString,
}

impl GoogleClient {
    pub fn new(base_url: &str, access_token: SecretString) -> Result<Self, GoogleApiError> {
        let invalid = |reason: String| GoogleApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason,
        };
        let parsed =
            Url::parse(base_url.trim_end_matches('/')).map_err(|error| invalid(error.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("cannot carry a path".to_owned()));
        }
        let http =
            Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(GoogleApiError::Client)?;
        Ok(Self { http, base_url: parsed, access_token })
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.post(url))
    }

    pub fn put(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.put(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.access_token.expose_secret())
    }
}

/// Sends `request` and turns transport failures and non-success statuses into
/// errors naming `operation`.
pub async fn send(request: RequestBuilder, operation: &str) -> Result<Response, GoogleApiError> {
    let response = request
        .send()
        .await
        .map_err(|source| GoogleApiError::Request { operation: operation.to_owned(), source })?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GoogleApiError::Status {
        operation: operation.to_owned(),
        status,
        message: error_message(&body),
    })
}

/// Extracts `error.message` from a Google error payload, falling back to the
/// raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value.pointer("/error/message").and_then(|message| message.as_str()).map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use huntbot_core::errors::BackendError;
    use reqwest::StatusCode;

    use super::{error_message, GoogleApiError, GoogleClient};

    #[test]
    fn endpoint_encodes_each_segment() {
        let client =
            GoogleClient::new("https://sheets.googleapis.com/v4/", "token".to_owned().into())
                .expect("client");

        let url = client.endpoint(&["spreadsheets", "abc", "values", "'Puzzle List'!A:G"]);

        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Puzzle%20List'!A:G"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            GoogleClient::new("not a url", "token".to_owned().into()),
            Err(GoogleApiError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            GoogleClient::new("mailto:someone@example.com", "token".to_owned().into()),
            Err(GoogleApiError::InvalidBaseUrl { ref url, .. })
                if url == "mailto:someone@example.com"
        ));
    }

    #[test]
    fn status_errors_map_into_backend_errors() {
        let error = GoogleApiError::Status {
            operation: "sheets values.get".to_owned(),
            status: StatusCode::FORBIDDEN,
            message: "The caller does not have permission".to_owned(),
        };

        assert_eq!(
            error.into_store(),
            BackendError::Store(
                "sheets values.get returned 403 Forbidden: The caller does not have permission"
                    .to_owned()
            )
        );
    }

    #[tokio::test]
    async fn unreachable_hosts_surface_as_request_errors() {
        let client =
            GoogleClient::new("http://127.0.0.1:9/drive/v3", "token".to_owned().into())
                .expect("client");

        let error = super::send(client.get(client.endpoint(&["files"])), "drive files.list")
            .await
            .expect_err("unreachable");

        assert!(matches!(
            error,
            GoogleApiError::Request { ref operation, .. } if operation == "drive files.list"
        ));
        assert!(matches!(error.into_documents(), BackendError::Documents(_)));
    }

    #[test]
    fn error_message_prefers_google_payload() {
        let body = r#"{"error":{"code":403,"message":"The caller does not have permission"}}"#;
        assert_eq!(error_message(body), "The caller does not have permission");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }
}
