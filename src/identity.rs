// Caller identity supplied by the upstream gateway

use crate::error::LedgerError;
use crate::models::Role;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::str::FromStr;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(LedgerError::Unauthorized(format!("unknown role '{}'", other))),
        }
    }
}

/// Authenticated caller. Trusted as given; authentication happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
}

impl Identity {
    /// Reading a wallet: owners see their own, admins see everyone's.
    pub fn authorize_wallet_read(&self, owner_id: i64) -> Result<(), LedgerError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Student | Role::Instructor if self.user_id == owner_id => Ok(()),
            Role::Student | Role::Instructor => Err(LedgerError::Forbidden(format!(
                "user {} may not read wallet of user {}",
                self.user_id, owner_id
            ))),
        }
    }

    /// Ledger administration (redemptions, reconciliation).
    pub fn authorize_ledger_admin(&self) -> Result<(), LedgerError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Student | Role::Instructor => Err(LedgerError::Forbidden(
                "ledger administration requires the admin role".to_string(),
            )),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)?
            .trim()
            .parse::<i64>()
            .map_err(|_| LedgerError::Unauthorized("malformed user id".to_string()))?;
        let role = header_value(parts, USER_ROLE_HEADER)?.parse::<Role>()?;

        Ok(Identity { user_id, role })
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, LedgerError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| LedgerError::Unauthorized(format!("missing {} header", name)))
}
