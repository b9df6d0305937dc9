//! Graph-request validation.

use validator::Validate;

use clash_types::GraphRequest;

/// A graph request failed its bounds.
#[derive(Debug, thiserror::Error)]
#[error("invalid network parameters: {0}")]
pub struct GraphRequestError(pub String);

/// Check a request's bounds and round its probability fields.
///
/// # Errors
///
/// Returns [`GraphRequestError`] listing the offending fields.
pub fn validate_request(request: GraphRequest) -> Result<GraphRequest, GraphRequestError> {
    request
        .validate()
        .map_err(|e| GraphRequestError(e.to_string()))?;
    Ok(request.rounded())
}
