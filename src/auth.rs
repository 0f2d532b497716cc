//! Callers and their privileges.
//!
//! Token issuance is outside hostdb: tokens are configured statically and
//! presented as `Authorization: Token <token>` (or `Bearer <token>`).

use crate::config::TokenConfig;
use std::collections::HashMap;

/// Message returned to authenticated callers lacking superuser status.
pub const SUPERUSER_REQUIRED: &str = "Only superusers are allowed to perform this action!";

/// The caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: Option<String>,
    pub is_authenticated: bool,
    /// A valid credential accompanied the request.
    pub has_credential: bool,
    pub is_superuser: bool,
}

impl Principal {
    /// Unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            username: None,
            is_authenticated: false,
            has_credential: false,
            is_superuser: false,
        }
    }

    /// Authenticated caller holding a valid credential.
    pub fn user(username: impl Into<String>, is_superuser: bool) -> Self {
        Self {
            username: Some(username.into()),
            is_authenticated: true,
            has_credential: true,
            is_superuser,
        }
    }

    /// Local operator acting on the database directly.
    pub fn operator() -> Self {
        Self::user("operator", true)
    }

    /// Display name for logs.
    pub fn name(&self) -> &str {
        self.username.as_deref().unwrap_or("anonymous")
    }
}

/// Outcome of an authorization check for a destructive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    AuthRequired,
    Forbidden,
}

/// Require an authenticated superuser.
pub fn require_superuser(principal: &Principal) -> Access {
    if !principal.is_authenticated || !principal.has_credential {
        Access::AuthRequired
    } else if !principal.is_superuser {
        Access::Forbidden
    } else {
        Access::Granted
    }
}

/// Static token table.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: HashMap<String, (String, bool)>,
}

impl TokenStore {
    pub fn new(tokens: &[TokenConfig]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| (t.token.clone(), (t.username.clone(), t.superuser)))
                .collect(),
        }
    }

    /// Resolve the value of an `Authorization` header.
    ///
    /// Missing, malformed or unknown credentials resolve to the anonymous
    /// principal.
    pub fn authenticate(&self, header: Option<&str>) -> Principal {
        let Some(token) = header.and_then(parse_authorization) else {
            return Principal::anonymous();
        };
        match self.tokens.get(token) {
            Some((username, superuser)) => Principal::user(username.clone(), *superuser),
            None => {
                tracing::debug!("rejected unknown api token");
                Principal::anonymous()
            }
        }
    }
}

fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TokenStore {
        TokenStore::new(&[
            TokenConfig {
                token: "root-token".into(),
                username: "admin".into(),
                superuser: true,
            },
            TokenConfig {
                token: "user-token".into(),
                username: "alice".into(),
                superuser: false,
            },
        ])
    }

    #[test]
    fn test_authenticate() {
        let store = store();
        let cases = [
            (None, Principal::anonymous(), "no header"),
            (Some("Token root-token"), Principal::user("admin", true), "token scheme"),
            (Some("Bearer user-token"), Principal::user("alice", false), "bearer scheme"),
            (Some("token   root-token "), Principal::user("admin", true), "extra spaces"),
            (Some("Token nope"), Principal::anonymous(), "unknown token"),
            (Some("Basic root-token"), Principal::anonymous(), "wrong scheme"),
            (Some("Token"), Principal::anonymous(), "missing token"),
        ];

        for (header, expected, desc) in cases {
            assert_eq!(store.authenticate(header), expected, "{}", desc);
        }
    }

    #[test]
    fn test_require_superuser() {
        assert_eq!(require_superuser(&Principal::anonymous()), Access::AuthRequired);
        assert_eq!(
            require_superuser(&Principal::user("alice", false)),
            Access::Forbidden
        );
        assert_eq!(require_superuser(&Principal::operator()), Access::Granted);

        // A superuser flag without a credential still requires authentication.
        let stale = Principal {
            has_credential: false,
            ..Principal::user("admin", true)
        };
        assert_eq!(require_superuser(&stale), Access::AuthRequired);
    }
}
