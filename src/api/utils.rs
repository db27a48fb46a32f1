//! Stateless helpers for request and response handling

use axum::{body::Body, http::HeaderMap};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;

use crate::api::error::ApiError;

/// Parses and validates a Content-Type header for application/json
///
/// Accepts `application/json` with or without parameters; rejects
/// `application/jsonp`, `text/json`, structured suffixes and garbage.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Check the Content-Type, read at most `max_size` bytes and decode JSON
///
/// Collection stops at the first frame past the limit, so oversized or
/// endless bodies are never buffered.
pub async fn read_json<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: Body,
    max_size: usize,
) -> Result<T, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::InvalidPayload(err.to_string())
            }
        })?
        .to_bytes();

    Ok(serde_json::from_slice(&data)?)
}

/// `Content-Disposition` value for a download, with an ASCII fallback name
/// and the exact UTF-8 name as `filename*`
pub fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};
    use serde::Deserialize;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        for value in ["application/jsonp", "text/json", "text/plain", "invalid", ""] {
            assert!(parse_content_type(value).is_err(), "{value}");
        }
    }

    #[derive(Debug, Deserialize)]
    struct Lookup {
        url: Option<String>,
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[tokio::test]
    async fn test_read_json() {
        let lookup: Lookup = read_json(&json_headers(), Body::from(r#"{"url":"https://a"}"#), 1024)
            .await
            .unwrap();
        assert_eq!(lookup.url.as_deref(), Some("https://a"));

        let err = read_json::<Lookup>(&HeaderMap::new(), Body::from("{}"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));

        let err = read_json::<Lookup>(&json_headers(), Body::from("not json"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidPayload(_)));

        let err = read_json::<Lookup>(&json_headers(), Body::from(r#"{"url":"x"}"#), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(4)));

        let exact = r#"{"url":"x"}"#;
        let lookup: Lookup = read_json(&json_headers(), Body::from(exact), exact.len())
            .await
            .unwrap();
        assert_eq!(lookup.url.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_read_json_stops_at_limit_on_endless_body() {
        let endless = futures::stream::repeat_with(|| Ok::<_, std::io::Error>("x".repeat(65536)));

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            read_json::<Lookup>(&json_headers(), Body::from_stream(endless), 32),
        )
        .await
        .expect("read_json must give up at the limit");

        assert!(matches!(result, Err(ApiError::PayloadTooLarge(32))));
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("clip.mp4"),
            "attachment; filename=\"clip.mp4\"; filename*=UTF-8''clip.mp4"
        );
        assert_eq!(
            attachment_disposition("a \"b\" é.mp4"),
            "attachment; filename=\"a _b_ _.mp4\"; filename*=UTF-8''a%20%22b%22%20%C3%A9.mp4"
        );
    }
}
