//! Boundary token extraction from a multipart `Content-Type` value.

use crate::error::VecError;

/// Longest boundary RFC 2046 allows.
const MAX_BOUNDARY_LEN: usize = 70;

/// Extract the `boundary=` token from a `Content-Type` value. The token is
/// terminated by a double quote, a semicolon, or the end of the value, and
/// must be 1-70 ASCII bytes.
pub(crate) fn extract_boundary(content_type: &str) -> Result<String, VecError> {
    let pos = content_type
        .find("boundary=")
        .ok_or(VecError::InvalidMultipart)?;
    let rest = &content_type[pos + "boundary=".len()..];
    let token = rest
        .split(|c| c == '"' || c == ';')
        .find(|t| !t.is_empty())
        .unwrap_or("");
    if token.is_empty() || token.len() > MAX_BOUNDARY_LEN || !token.is_ascii() {
        return Err(VecError::InvalidMultipart);
    }
    Ok(token.to_string())
}
