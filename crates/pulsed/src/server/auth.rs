//! Bearer-token authentication.
//!
//! Identity is resolved server-side only: the request body never names
//! a user. A missing, malformed, or unknown token degrades to an
//! anonymous caller rather than an error - the ingestion endpoint
//! accepts anonymous samples, and the reporting endpoints decide for
//! themselves whether anonymous is acceptable.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use pulse_core::UserId;

use crate::server::AppState;

/// Who is making this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User(UserId),
    Anonymous,
}

impl Caller {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

/// Immutable token to user mapping, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    tokens: HashMap<String, UserId>,
}

impl TokenTable {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(token, user)| (token, UserId::new(user)))
                .collect(),
        }
    }

    /// Resolves an `Authorization` header value to a caller.
    pub fn resolve(&self, header: Option<&str>) -> Caller {
        let Some(header) = header else {
            return Caller::Anonymous;
        };
        let Some(token) = header.strip_prefix("Bearer ") else {
            return Caller::Anonymous;
        };
        match self.tokens.get(token.trim()) {
            Some(user) => Caller::User(user.clone()),
            None => Caller::Anonymous,
        }
    }
}

/// Middleware attaching a `Caller` extension to every request.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let caller = state.tokens.resolve(header);
    request.extensions_mut().insert(caller);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TokenTable {
        TokenTable::new(HashMap::from([(
            "tok-alpha".to_string(),
            "user-alpha".to_string(),
        )]))
    }

    #[test]
    fn test_resolves_known_token() {
        let caller = table().resolve(Some("Bearer tok-alpha"));
        assert_eq!(caller, Caller::User(UserId::new("user-alpha")));
    }

    #[test]
    fn test_unknown_token_is_anonymous() {
        assert_eq!(table().resolve(Some("Bearer nope")), Caller::Anonymous);
    }

    #[test]
    fn test_missing_or_malformed_header_is_anonymous() {
        assert_eq!(table().resolve(None), Caller::Anonymous);
        assert_eq!(table().resolve(Some("Basic dXNlcg==")), Caller::Anonymous);
        assert_eq!(table().resolve(Some("tok-alpha")), Caller::Anonymous);
    }
}
