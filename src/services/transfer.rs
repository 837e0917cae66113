//! Transfers between clients, recorded by name.
//!
//! Transfers carry only denormalized sender and recipient names, so no
//! balance trigger applies to them. Direct operations are the
//! balance-moving counterpart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::amount::AmountInput;
use super::audit::{self, ArchiveTable};
use super::operation::{OperationError, OperationKind};
use super::validation::{self, NAME_MAX_LEN, NOTES_MAX_LEN, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRow {
    pub id: Uuid,
    pub from_client: String,
    pub to_client: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransfer {
    pub from_client: String,
    pub to_client: String,
    pub amount: AmountInput,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferPatch {
    pub from_client: Option<String>,
    pub to_client: Option<String>,
    pub amount: Option<AmountInput>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFields {
    pub from_client: String,
    pub to_client: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

fn check_parties(from: &str, to: &str) -> Result<(String, String), ValidationError> {
    let from = validation::required_text("from_client", from, NAME_MAX_LEN)?;
    let to = validation::required_text("to_client", to, NAME_MAX_LEN)?;
    if from.to_lowercase() == to.to_lowercase() {
        return Err(ValidationError::SameClient);
    }
    Ok((from, to))
}

impl NewTransfer {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<TransferFields, ValidationError> {
        let (from_client, to_client) = check_parties(&self.from_client, &self.to_client)?;
        Ok(TransferFields {
            from_client,
            to_client,
            amount: validation::amount(&self.amount)?,
            reason: validation::optional_text("reason", self.reason.as_deref(), NOTES_MAX_LEN)?,
        })
    }
}

impl TransferPatch {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn apply(&self, current: &TransferRow) -> Result<TransferFields, ValidationError> {
        let (from_client, to_client) = check_parties(
            self.from_client.as_deref().unwrap_or(&current.from_client),
            self.to_client.as_deref().unwrap_or(&current.to_client),
        )?;
        let amount = match &self.amount {
            Some(input) => validation::amount(input)?,
            None => current.amount,
        };
        let reason = match &self.reason {
            Some(r) => validation::optional_text("reason", Some(r), NOTES_MAX_LEN)?,
            None => current.reason.clone(),
        };
        Ok(TransferFields { from_client, to_client, amount, reason })
    }
}

const TRANSFER_COLUMNS: &str = "id, from_client, to_client, amount, reason, created_by, created_at, updated_at";

fn row_to_transfer(r: &PgRow) -> TransferRow {
    TransferRow {
        id: r.get("id"),
        from_client: r.get("from_client"),
        to_client: r.get("to_client"),
        amount: r.get("amount"),
        reason: r.get("reason"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// # Errors
///
/// Returns a validation or database error.
pub async fn create(pool: &PgPool, input: &NewTransfer, actor: Uuid) -> Result<TransferRow, OperationError> {
    let fields = input.validate()?;
    let sql = format!(
        "INSERT INTO transfers (from_client, to_client, amount, reason, created_by)
         VALUES ($1, $2, $3, $4, $5) RETURNING {TRANSFER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&fields.from_client)
        .bind(&fields.to_client)
        .bind(fields.amount)
        .bind(&fields.reason)
        .bind(actor)
        .fetch_one(pool)
        .await?;
    let transfer = row_to_transfer(&row);
    info!(id = %transfer.id, amount = %transfer.amount, "transfer created");
    Ok(transfer)
}

/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn get(pool: &PgPool, id: Uuid) -> Result<TransferRow, OperationError> {
    let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(OperationKind::Transfer, id))?;
    Ok(row_to_transfer(&row))
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list(pool: &PgPool) -> Result<Vec<TransferRow>, OperationError> {
    let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers ORDER BY created_at DESC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_transfer).collect())
}

/// # Errors
///
/// Returns [`OperationError::NotFound`], a validation error, or a database error.
pub async fn update(pool: &PgPool, id: Uuid, patch: &TransferPatch) -> Result<TransferRow, OperationError> {
    let current = get(pool, id).await?;
    let fields = patch.apply(&current)?;
    let sql = format!(
        "UPDATE transfers
            SET from_client = $2, to_client = $3, amount = $4, reason = $5, updated_at = now()
          WHERE id = $1
          RETURNING {TRANSFER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(&fields.from_client)
        .bind(&fields.to_client)
        .bind(fields.amount)
        .bind(&fields.reason)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(OperationKind::Transfer, id))?;
    info!(%id, "transfer updated");
    Ok(row_to_transfer(&row))
}

/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn delete(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<(), OperationError> {
    if audit::delete_archived(pool, ArchiveTable::Transfers, id, Some(actor)).await? {
        Ok(())
    } else {
        Err(OperationError::NotFound(OperationKind::Transfer, id))
    }
}

#[cfg(test)]
#[path = "transfer_test.rs"]
mod tests;
