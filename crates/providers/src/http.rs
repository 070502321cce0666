//! Response helpers shared by the provider clients.

use litessay_core::error::CollaboratorError;

/// Map a transport-level failure to a collaborator error.
pub(crate) fn request_error(service: &'static str, err: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Request {
        service,
        message: err.to_string(),
    }
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`CollaboratorError::Api`] carrying the status
/// and body text on failure.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(CollaboratorError::Api {
            service,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let response = ensure_success(service, response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| CollaboratorError::Decode {
            service,
            message: e.to_string(),
        })
}
