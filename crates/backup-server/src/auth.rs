//! Authorization of requests.
//!

use axum::http::{HeaderMap, header::AUTHORIZATION};
use subtle::ConstantTimeEq;

/// Decides if a request may manage backups.
pub trait Authorizer: Send + Sync {
    /// If the request with these headers is authorized.
    fn is_authorized(&self, headers: &HeaderMap) -> bool;
}

/// Authorizes requests carrying `Authorization: Bearer <token>` with a known admin token.
#[derive(Debug, Default, Clone)]
pub struct TokenAuthorizer {
    tokens: Vec<String>,
}

impl TokenAuthorizer {
    /// Create an authorizer accepting the given tokens. Empty tokens are ignored.
    pub fn new(tokens: Vec<String>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|token| !token.is_empty())
            .collect();

        Self { tokens }
    }

    /// If no token is accepted.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authorizer for TokenAuthorizer {
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
        else {
            return false;
        };

        self.tokens
            .iter()
            .any(|known| bool::from(known.as_bytes().ct_eq(token.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn accepts_known_token() {
        let authorizer = TokenAuthorizer::new(vec!["secret".to_string(), "other".to_string()]);

        assert!(authorizer.is_authorized(&headers("Bearer secret")));
        assert!(authorizer.is_authorized(&headers("Bearer other")));
    }

    #[test]
    fn rejects_unknown_or_missing_token() {
        let authorizer = TokenAuthorizer::new(vec!["secret".to_string()]);

        assert!(!authorizer.is_authorized(&HeaderMap::new()));
        assert!(!authorizer.is_authorized(&headers("Bearer wrong")));
        assert!(!authorizer.is_authorized(&headers("Bearer secret2")));
        assert!(!authorizer.is_authorized(&headers("secret")));
        assert!(!authorizer.is_authorized(&headers("Basic secret")));
    }

    #[test]
    fn no_tokens_rejects_everything() {
        let authorizer = TokenAuthorizer::new(vec![String::new()]);

        assert!(authorizer.is_empty());
        assert!(!authorizer.is_authorized(&headers("Bearer ")));
    }
}
