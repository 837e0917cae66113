//! Permissions and database error classification.
//!
//! DESIGN
//! ======
//! Every request carries a [`Principal`]: the signed-in profile, its role
//! and its granted permissions. Route handlers call [`Principal::require`]
//! before touching a service. Admins implicitly hold every permission.
//!
//! ERROR HANDLING
//! ==============
//! Failures that come back from Postgres are classified once, here, by
//! [`classify_db_error`]. The structured SQLSTATE is authoritative; message
//! matching is a fallback for errors that carry no code (driver-level or
//! proxied errors).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// PERMISSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "clients:read")]
    ClientsRead,
    #[serde(rename = "clients:write")]
    ClientsWrite,
    #[serde(rename = "operations:read")]
    OperationsRead,
    #[serde(rename = "operations:write")]
    OperationsWrite,
    #[serde(rename = "operations:delete")]
    OperationsDelete,
    #[serde(rename = "stats:read")]
    StatsRead,
    #[serde(rename = "users:manage")]
    UsersManage,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ClientsRead,
        Permission::ClientsWrite,
        Permission::OperationsRead,
        Permission::OperationsWrite,
        Permission::OperationsDelete,
        Permission::StatsRead,
        Permission::UsersManage,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ClientsRead => "clients:read",
            Permission::ClientsWrite => "clients:write",
            Permission::OperationsRead => "operations:read",
            Permission::OperationsWrite => "operations:write",
            Permission::OperationsDelete => "operations:delete",
            Permission::StatsRead => "stats:read",
            Permission::UsersManage => "users:manage",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| AccessError::UnknownPermission(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
        }
    }

    /// Parse a stored role. Anything unrecognized is treated as an agent.
    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") { Role::Admin } else { Role::Agent }
    }
}

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The authenticated caller of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub permissions: BTreeSet<Permission>,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.is_admin() || self.permissions.contains(&permission)
    }

    /// # Errors
    ///
    /// Returns [`AccessError::Denied`] if the caller lacks `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AccessError> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, %permission, "permission denied");
            Err(AccessError::Denied(permission))
        }
    }

    /// Effective permissions: all of them for admins, the granted set otherwise.
    #[must_use]
    pub fn effective_permissions(&self) -> Vec<Permission> {
        if self.is_admin() {
            Permission::ALL.to_vec()
        } else {
            self.permissions.iter().copied().collect()
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("permission denied: {0} required")]
    Denied(Permission),
    #[error("unknown permission: {0}")]
    UnknownPermission(String),
}

impl crate::frame::ErrorCode for AccessError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Denied(_) => "E_PERMISSION_DENIED",
            Self::UnknownPermission(_) => "E_UNKNOWN_PERMISSION",
        }
    }
}

/// What a database failure means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorClass {
    /// Row-level security or a missing grant.
    PermissionDenied,
    /// A referenced row does not exist, or the row is still referenced.
    ForeignKey,
    UniqueViolation,
    CheckViolation,
    /// A trigger or function raised on purpose.
    Raised,
    RowNotFound,
    Unavailable,
    Other,
}

/// Map a SQLSTATE code to its class, if it is one we distinguish.
#[must_use]
pub fn class_for_sqlstate(code: &str) -> Option<DbErrorClass> {
    match code {
        "42501" => Some(DbErrorClass::PermissionDenied),
        "23503" => Some(DbErrorClass::ForeignKey),
        "23505" => Some(DbErrorClass::UniqueViolation),
        "23514" => Some(DbErrorClass::CheckViolation),
        "P0001" => Some(DbErrorClass::Raised),
        _ => None,
    }
}

/// Message fallback for errors that carry no SQLSTATE.
#[must_use]
pub fn class_for_message(message: &str) -> DbErrorClass {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission denied") || lower.contains("row-level security") {
        DbErrorClass::PermissionDenied
    } else if lower.contains("foreign key") {
        DbErrorClass::ForeignKey
    } else if lower.contains("duplicate key") {
        DbErrorClass::UniqueViolation
    } else {
        DbErrorClass::Other
    }
}

/// Classify a `sqlx` error.
#[must_use]
pub fn classify_db_error(err: &sqlx::Error) -> DbErrorClass {
    match err {
        sqlx::Error::RowNotFound => DbErrorClass::RowNotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => DbErrorClass::Unavailable,
        sqlx::Error::Database(db) => {
            if let Some(class) = db.code().as_deref().and_then(class_for_sqlstate) {
                return class;
            }
            if db.code().is_some() {
                return DbErrorClass::Other;
            }
            class_for_message(db.message())
        }
        other => class_for_message(&other.to_string()),
    }
}

#[cfg(test)]
#[path = "access_test.rs"]
mod tests;
