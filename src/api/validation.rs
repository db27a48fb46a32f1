use thiserror::Error;

const MAX_URL_LEN: usize = 2048;
const MAX_FORMAT_LEN: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("URL is required")]
    MissingUrl,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("format selector must be at most {MAX_FORMAT_LEN} characters")]
    FormatTooLong,
    #[error("format selector must not contain whitespace or control characters")]
    InvalidFormat,
}

/// Only `http://` and `https://` URLs are handed to the extractor.
/// Returns the trimmed URL.
pub fn validate_url(url: Option<&str>) -> Result<&str, RequestValidationError> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(RequestValidationError::MissingUrl)?;

    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    if !has_scheme || url.len() > MAX_URL_LEN || url.chars().any(char::is_control) {
        return Err(RequestValidationError::InvalidUrl);
    }
    Ok(url)
}

/// Format selectors go straight to the extractor's `--format`. An empty
/// selector means "use the configured default".
pub fn validate_format(format: &str) -> Result<(), RequestValidationError> {
    if format.len() > MAX_FORMAT_LEN {
        return Err(RequestValidationError::FormatTooLong);
    }
    if format.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RequestValidationError::InvalidFormat);
    }
    Ok(())
}
