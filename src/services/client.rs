//! Client service: CRUD, search, and status.
//!
//! DESIGN
//! ======
//! The `balance` column belongs to the database: triggers on deposits,
//! withdrawals and direct operations move it. This service never writes it
//! after creation; `stats` reports where it has drifted.
//!
//! Updates are read-merge-write: the current row is loaded, the patch is
//! applied and validated in Rust, and every editable column is written back.
//! A blank optional field in a patch clears it.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::access::{DbErrorClass, classify_db_error};
use super::audit::{self, ArchiveTable};
use super::filter::{self, ClientFilter};
use super::validation::{self, NAME_MAX_LEN, ValidationError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Inactive,
}

impl ClientStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
        }
    }

    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("inactive") { ClientStatus::Inactive } else { ClientStatus::Active }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub balance: Decimal,
    pub status: ClientStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<ClientStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("permission denied by database policy")]
    Denied,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        match classify_db_error(&err) {
            DbErrorClass::PermissionDenied => Self::Denied,
            _ => Self::Database(err),
        }
    }
}

impl crate::frame::ErrorCode for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_CLIENT_NOT_FOUND",
            Self::Invalid(inner) => inner.error_code(),
            Self::Denied => "E_PERMISSION_DENIED",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

const CLIENT_COLUMNS: &str = "id, first_name, last_name, phone, email, balance, status, created_at";

fn row_to_client(r: &PgRow) -> ClientRow {
    let status: String = r.get("status");
    ClientRow {
        id: r.get("id"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        phone: r.get("phone"),
        email: r.get("email"),
        balance: r.get("balance"),
        status: ClientStatus::from_db(&status),
        created_at: r.get("created_at"),
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validated column values for an insert or full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFields {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: ClientStatus,
}

impl NewClient {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<ClientFields, ValidationError> {
        Ok(ClientFields {
            first_name: validation::required_text("first_name", &self.first_name, NAME_MAX_LEN)?,
            last_name: validation::required_text("last_name", &self.last_name, NAME_MAX_LEN)?,
            phone: validation::phone(self.phone.as_deref())?,
            email: validation::email(self.email.as_deref())?,
            status: ClientStatus::Active,
        })
    }
}

impl ClientPatch {
    /// Merge onto `current` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn apply(&self, current: &ClientRow) -> Result<ClientFields, ValidationError> {
        let first = self.first_name.as_deref().unwrap_or(&current.first_name);
        let last = self.last_name.as_deref().unwrap_or(&current.last_name);
        let phone = match &self.phone {
            Some(p) => p.as_str(),
            None => current.phone.as_deref().unwrap_or(""),
        };
        let email = match &self.email {
            Some(e) => e.as_str(),
            None => current.email.as_deref().unwrap_or(""),
        };
        Ok(ClientFields {
            first_name: validation::required_text("first_name", first, NAME_MAX_LEN)?,
            last_name: validation::required_text("last_name", last, NAME_MAX_LEN)?,
            phone: validation::phone(Some(phone))?,
            email: validation::email(Some(email))?,
            status: self.status.unwrap_or(current.status),
        })
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a client with a zero balance.
///
/// # Errors
///
/// Returns a validation or database error.
pub async fn create_client(pool: &PgPool, input: &NewClient) -> Result<ClientRow, ClientError> {
    let fields = input.validate()?;
    let sql = format!(
        "INSERT INTO clients (first_name, last_name, phone, email, status)
         VALUES ($1, $2, $3, $4, $5) RETURNING {CLIENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(fields.status.as_str())
        .fetch_one(pool)
        .await?;
    let client = row_to_client(&row);
    info!(client_id = %client.id, "client created");
    Ok(client)
}

/// # Errors
///
/// Returns [`ClientError::NotFound`] if there is no such client.
pub async fn get_client(pool: &PgPool, id: Uuid) -> Result<ClientRow, ClientError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ClientError::NotFound(id))?;
    Ok(row_to_client(&row))
}

/// All clients ordered by last then first name, narrowed by `filter`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_clients(pool: &PgPool, filter: &ClientFilter) -> Result<Vec<ClientRow>, ClientError> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY last_name, first_name");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let clients = rows.iter().map(row_to_client).collect();
    Ok(filter::filter_clients(clients, filter))
}

/// # Errors
///
/// Returns [`ClientError::NotFound`], a validation error, or a database error.
pub async fn update_client(pool: &PgPool, id: Uuid, patch: &ClientPatch) -> Result<ClientRow, ClientError> {
    let current = get_client(pool, id).await?;
    let fields = patch.apply(&current)?;
    let sql = format!(
        "UPDATE clients SET first_name = $2, last_name = $3, phone = $4, email = $5, status = $6
         WHERE id = $1 RETURNING {CLIENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(fields.status.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or(ClientError::NotFound(id))?;
    info!(client_id = %id, status = %fields.status, "client updated");
    Ok(row_to_client(&row))
}

/// Archive then delete a client. Operations keep their denormalized names.
///
/// # Errors
///
/// Returns [`ClientError::NotFound`] or a database error.
pub async fn delete_client(pool: &PgPool, id: Uuid, deleted_by: Uuid) -> Result<(), ClientError> {
    if audit::delete_archived(pool, ArchiveTable::Clients, id, Some(deleted_by)).await? {
        Ok(())
    } else {
        Err(ClientError::NotFound(id))
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
