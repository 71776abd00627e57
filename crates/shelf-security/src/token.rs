//! Static admin bearer token.

use crate::AuthError;

/// The single shared token guarding admin routes.
///
/// An empty configured token disables admin access entirely rather than
/// letting an empty credential through.
#[derive(Clone)]
pub struct AdminToken {
    expected: Option<String>,
}

impl AdminToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            expected: (!token.is_empty()).then_some(token),
        }
    }

    /// Token from optional config; `None` disables admin access.
    pub fn from_config(token: Option<&str>) -> Self {
        token.map(Self::new).unwrap_or(Self { expected: None })
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    /// Check a presented token.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), AuthError> {
        let expected = self.expected.as_deref().ok_or(AuthError::Disabled)?;
        let presented = presented.ok_or(AuthError::MissingToken)?;
        if constant_time_compare(expected.as_bytes(), presented.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<(), AuthError> {
        self.verify(header.and_then(bearer_token))
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminToken")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Extract the credential from `Bearer <token>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_header() {
        let admin = AdminToken::new("s3cret");
        assert!(admin.verify_header(Some("Bearer s3cret")).is_ok());
        assert!(admin.verify_header(Some("bearer s3cret")).is_ok());
        assert_eq!(
            admin.verify_header(Some("Bearer nope")),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(admin.verify_header(None), Err(AuthError::MissingToken));
        assert_eq!(
            admin.verify_header(Some("Basic s3cret")),
            Err(AuthError::MissingToken)
        );
    }

    #[test]
    fn test_empty_token_disables_admin() {
        let admin = AdminToken::new("");
        assert!(!admin.is_enabled());
        assert_eq!(admin.verify(Some("")), Err(AuthError::Disabled));
        assert_eq!(
            AdminToken::from_config(None).verify(Some("x")),
            Err(AuthError::Disabled)
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("  Bearer   abc  "), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", AdminToken::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
