use serde::de::DeserializeOwned;

use super::response::ApiError;

/// Decodes a POST body as JSON first, falling back to form encoding. The
/// panel's own client sends JSON; the fallback keeps plain `curl -d` and
/// legacy form posts working against the same endpoints.
pub fn decode<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    if let Ok(value) = serde_json::from_slice(body) {
        return Ok(value);
    }
    serde_urlencoded::from_bytes(body)
        .map_err(|_| ApiError::bad_request("Malformed request body"))
}
