use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures raised by an external collaborator (text source, language
/// model, embedding model, vector index).
///
/// These are transient by nature; the pipeline treats them as fatal to the
/// current run and leaves recovery to an operator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },

    /// The service answered with a non-success status.
    #[error("{service} API error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{service} returned an unexpected payload: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// The collaborator is missing required configuration.
    #[error("{service} is not configured: {message}")]
    Config {
        service: &'static str,
        message: String,
    },
}
