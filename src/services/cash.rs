//! Deposits and withdrawals.
//!
//! DESIGN
//! ======
//! The two tables share one shape, so one service handles both,
//! parameterized by [`CashKind`]. Creating a deposit writes exactly one row
//! to `deposits`; the client's balance moves through the database trigger,
//! never from here. The client's name is copied onto the row at write time
//! so history survives renames and deletions.
//!
//! ERROR HANDLING
//! ==============
//! Deletes archive the row into `deleted_deposits` / `deleted_withdrawals`
//! in the same transaction (see `audit`).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::amount::AmountInput;
use super::audit;
use super::operation::{OperationError, OperationKind, client_display_name};
use super::validation::{self, NOTES_MAX_LEN, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashKind {
    Deposit,
    Withdrawal,
}

impl CashKind {
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            CashKind::Deposit => "deposits",
            CashKind::Withdrawal => "withdrawals",
        }
    }

    #[must_use]
    pub fn kind(self) -> OperationKind {
        match self {
            CashKind::Deposit => OperationKind::Deposit,
            CashKind::Withdrawal => OperationKind::Withdrawal,
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashRow {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub client_name: String,
    pub amount: Decimal,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub modified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCash {
    pub client_id: Uuid,
    pub amount: AmountInput,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CashPatch {
    pub client_id: Option<Uuid>,
    pub amount: Option<AmountInput>,
    pub operation_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

/// Validated column values, before the client name is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashFields {
    pub client_id: Uuid,
    pub amount: Decimal,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
}

impl NewCash {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<CashFields, ValidationError> {
        Ok(CashFields {
            client_id: self.client_id,
            amount: validation::amount(&self.amount)?,
            operation_date: self.operation_date,
            notes: validation::optional_text("notes", self.notes.as_deref(), NOTES_MAX_LEN)?,
            status: validation::status(self.status.as_deref())?,
        })
    }
}

impl CashPatch {
    /// Merge onto `current` and validate. A blank `notes` clears it.
    /// `Ok(None)` when neither the patch nor the row names a client (the
    /// client was deleted and no replacement was given).
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn apply(&self, current: &CashRow) -> Result<Option<CashFields>, ValidationError> {
        let Some(client_id) = self.client_id.or(current.client_id) else {
            return Ok(None);
        };
        let amount = match &self.amount {
            Some(input) => validation::amount(input)?,
            None => current.amount,
        };
        let notes = match &self.notes {
            Some(n) => validation::optional_text("notes", Some(n), NOTES_MAX_LEN)?,
            None => current.notes.clone(),
        };
        let status = match &self.status {
            Some(s) => validation::status(Some(s))?,
            None => current.status.clone(),
        };
        Ok(Some(CashFields {
            client_id,
            amount,
            operation_date: self.operation_date.unwrap_or(current.operation_date),
            notes,
            status,
        }))
    }
}

const CASH_COLUMNS: &str = "id, client_id, client_name, amount, operation_date, notes, status, \
                            created_by, modified_by, created_at, updated_at";

fn row_to_cash(r: &PgRow) -> CashRow {
    CashRow {
        id: r.get("id"),
        client_id: r.get("client_id"),
        client_name: r.get("client_name"),
        amount: r.get("amount"),
        operation_date: r.get("operation_date"),
        notes: r.get("notes"),
        status: r.get("status"),
        created_by: r.get("created_by"),
        modified_by: r.get("modified_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Record a deposit or withdrawal for an existing client.
///
/// # Errors
///
/// Returns a validation error, [`OperationError::ClientNotFound`], or a database error.
pub async fn create(pool: &PgPool, kind: CashKind, input: &NewCash, actor: Uuid) -> Result<CashRow, OperationError> {
    let fields = input.validate()?;
    let client_name = client_display_name(pool, fields.client_id).await?;
    let sql = format!(
        "INSERT INTO {table} (client_id, client_name, amount, operation_date, notes, status, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CASH_COLUMNS}",
        table = kind.table(),
    );
    let row = sqlx::query(&sql)
        .bind(fields.client_id)
        .bind(&client_name)
        .bind(fields.amount)
        .bind(fields.operation_date)
        .bind(&fields.notes)
        .bind(&fields.status)
        .bind(actor)
        .fetch_one(pool)
        .await?;
    let cash = row_to_cash(&row);
    info!(kind = %kind.kind(), id = %cash.id, client_id = %fields.client_id, amount = %cash.amount, "cash operation created");
    Ok(cash)
}

/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn get(pool: &PgPool, kind: CashKind, id: Uuid) -> Result<CashRow, OperationError> {
    let sql = format!("SELECT {CASH_COLUMNS} FROM {table} WHERE id = $1", table = kind.table());
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(kind.kind(), id))?;
    Ok(row_to_cash(&row))
}

/// Newest first; optionally only one client's rows.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list(pool: &PgPool, kind: CashKind, client_id: Option<Uuid>) -> Result<Vec<CashRow>, OperationError> {
    let sql = format!(
        "SELECT {CASH_COLUMNS} FROM {table}
         WHERE ($1::uuid IS NULL OR client_id = $1)
         ORDER BY operation_date DESC, created_at DESC",
        table = kind.table(),
    );
    let rows = sqlx::query(&sql).bind(client_id).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_cash).collect())
}

/// # Errors
///
/// Returns [`OperationError::NotFound`], a validation error, or a database error.
pub async fn update(
    pool: &PgPool,
    kind: CashKind,
    id: Uuid,
    patch: &CashPatch,
    actor: Uuid,
) -> Result<CashRow, OperationError> {
    let current = get(pool, kind, id).await?;
    let fields = patch
        .apply(&current)?
        .ok_or(ValidationError::Required { field: "client_id" })?;
    let client_name = if Some(fields.client_id) == current.client_id {
        current.client_name.clone()
    } else {
        client_display_name(pool, fields.client_id).await?
    };

    let sql = format!(
        "UPDATE {table}
            SET client_id = $2, client_name = $3, amount = $4, operation_date = $5,
                notes = $6, status = $7, modified_by = $8, updated_at = now()
          WHERE id = $1
          RETURNING {CASH_COLUMNS}",
        table = kind.table(),
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(fields.client_id)
        .bind(&client_name)
        .bind(fields.amount)
        .bind(fields.operation_date)
        .bind(&fields.notes)
        .bind(&fields.status)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(kind.kind(), id))?;
    info!(kind = %kind.kind(), %id, "cash operation updated");
    Ok(row_to_cash(&row))
}

/// Archive then delete.
///
/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn delete(pool: &PgPool, kind: CashKind, id: Uuid, actor: Uuid) -> Result<(), OperationError> {
    if audit::delete_archived(pool, kind.kind().archive(), id, Some(actor)).await? {
        Ok(())
    } else {
        Err(OperationError::NotFound(kind.kind(), id))
    }
}

#[cfg(test)]
#[path = "cash_test.rs"]
mod tests;
