//! Long-lived credential extraction

use axum::http::HeaderMap;

use crate::api::types::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Credential from the `X-API-Key` header, if present
pub fn api_key_from_headers(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(API_KEY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid X-API-Key header encoding"))?
        .trim();

    if key.is_empty() {
        return Ok(None);
    }

    Ok(Some(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_extract_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("  ak_live_abc  "));

        assert_eq!(
            api_key_from_headers(&headers).unwrap(),
            Some("ak_live_abc".to_string())
        );
    }

    #[test]
    fn test_missing_or_blank_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(api_key_from_headers(&headers).unwrap(), None);

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("   "));
        assert_eq!(api_key_from_headers(&headers).unwrap(), None);
    }

    #[test]
    fn test_non_ascii_key_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_bytes(b"ak_\xff").unwrap());

        let err = api_key_from_headers(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
