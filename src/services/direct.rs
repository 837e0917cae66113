//! Direct operations: money moved from one client to another.
//!
//! Both sides are real clients. The balance trigger debits the sender and
//! credits the recipient; names are copied onto the row at write time.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::amount::AmountInput;
use super::audit::{self, ArchiveTable};
use super::operation::{OperationError, OperationKind, client_display_name};
use super::validation::{self, NOTES_MAX_LEN, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectRow {
    pub id: Uuid,
    pub from_client_id: Option<Uuid>,
    pub from_client_name: String,
    pub to_client_id: Option<Uuid>,
    pub to_client_name: String,
    pub amount: Decimal,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDirect {
    pub from_client_id: Uuid,
    pub to_client_id: Uuid,
    pub amount: AmountInput,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectPatch {
    pub from_client_id: Option<Uuid>,
    pub to_client_id: Option<Uuid>,
    pub amount: Option<AmountInput>,
    pub operation_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectFields {
    pub from_client_id: Uuid,
    pub to_client_id: Uuid,
    pub amount: Decimal,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
}

impl NewDirect {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<DirectFields, ValidationError> {
        if self.from_client_id == self.to_client_id {
            return Err(ValidationError::SameClient);
        }
        Ok(DirectFields {
            from_client_id: self.from_client_id,
            to_client_id: self.to_client_id,
            amount: validation::amount(&self.amount)?,
            operation_date: self.operation_date,
            notes: validation::optional_text("notes", self.notes.as_deref(), NOTES_MAX_LEN)?,
            status: validation::status(self.status.as_deref())?,
        })
    }
}

impl DirectPatch {
    /// # Errors
    ///
    /// Returns the first field that fails validation; a side whose client was
    /// deleted must be named again.
    pub fn apply(&self, current: &DirectRow) -> Result<DirectFields, ValidationError> {
        let from_client_id = self
            .from_client_id
            .or(current.from_client_id)
            .ok_or(ValidationError::Required { field: "from_client_id" })?;
        let to_client_id = self
            .to_client_id
            .or(current.to_client_id)
            .ok_or(ValidationError::Required { field: "to_client_id" })?;
        if from_client_id == to_client_id {
            return Err(ValidationError::SameClient);
        }
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
        Ok(DirectFields {
            from_client_id,
            to_client_id,
            amount,
            operation_date: self.operation_date.unwrap_or(current.operation_date),
            notes,
            status,
        })
    }
}

const DIRECT_COLUMNS: &str = "id, from_client_id, from_client_name, to_client_id, to_client_name, amount, \
                              operation_date, notes, status, created_by, created_at, updated_at";

fn row_to_direct(r: &PgRow) -> DirectRow {
    DirectRow {
        id: r.get("id"),
        from_client_id: r.get("from_client_id"),
        from_client_name: r.get("from_client_name"),
        to_client_id: r.get("to_client_id"),
        to_client_name: r.get("to_client_name"),
        amount: r.get("amount"),
        operation_date: r.get("operation_date"),
        notes: r.get("notes"),
        status: r.get("status"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// Keep a stored name when the side did not change, otherwise look it up.
async fn side_name(
    pool: &PgPool,
    wanted: Uuid,
    current_id: Option<Uuid>,
    current_name: &str,
) -> Result<String, OperationError> {
    if Some(wanted) == current_id {
        Ok(current_name.to_owned())
    } else {
        client_display_name(pool, wanted).await
    }
}

/// # Errors
///
/// Returns a validation error, [`OperationError::ClientNotFound`], or a database error.
pub async fn create(pool: &PgPool, input: &NewDirect, actor: Uuid) -> Result<DirectRow, OperationError> {
    let fields = input.validate()?;
    let from_name = client_display_name(pool, fields.from_client_id).await?;
    let to_name = client_display_name(pool, fields.to_client_id).await?;
    let sql = format!(
        "INSERT INTO direct_operations
             (from_client_id, from_client_name, to_client_id, to_client_name, amount,
              operation_date, notes, status, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {DIRECT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(fields.from_client_id)
        .bind(&from_name)
        .bind(fields.to_client_id)
        .bind(&to_name)
        .bind(fields.amount)
        .bind(fields.operation_date)
        .bind(&fields.notes)
        .bind(&fields.status)
        .bind(actor)
        .fetch_one(pool)
        .await?;
    let direct = row_to_direct(&row);
    info!(
        id = %direct.id,
        from = %fields.from_client_id,
        to = %fields.to_client_id,
        amount = %direct.amount,
        "direct operation created"
    );
    Ok(direct)
}

/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn get(pool: &PgPool, id: Uuid) -> Result<DirectRow, OperationError> {
    let sql = format!("SELECT {DIRECT_COLUMNS} FROM direct_operations WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(OperationKind::Direct, id))?;
    Ok(row_to_direct(&row))
}

/// Newest first; optionally only rows where `client_id` is either side.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list(pool: &PgPool, client_id: Option<Uuid>) -> Result<Vec<DirectRow>, OperationError> {
    let sql = format!(
        "SELECT {DIRECT_COLUMNS} FROM direct_operations
         WHERE ($1::uuid IS NULL OR from_client_id = $1 OR to_client_id = $1)
         ORDER BY operation_date DESC, created_at DESC"
    );
    let rows = sqlx::query(&sql).bind(client_id).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_direct).collect())
}

/// # Errors
///
/// Returns [`OperationError::NotFound`], a validation error, or a database error.
pub async fn update(pool: &PgPool, id: Uuid, patch: &DirectPatch) -> Result<DirectRow, OperationError> {
    let current = get(pool, id).await?;
    let fields = patch.apply(&current)?;
    let from_name = side_name(pool, fields.from_client_id, current.from_client_id, &current.from_client_name).await?;
    let to_name = side_name(pool, fields.to_client_id, current.to_client_id, &current.to_client_name).await?;

    let sql = format!(
        "UPDATE direct_operations
            SET from_client_id = $2, from_client_name = $3, to_client_id = $4, to_client_name = $5,
                amount = $6, operation_date = $7, notes = $8, status = $9, updated_at = now()
          WHERE id = $1
          RETURNING {DIRECT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(fields.from_client_id)
        .bind(&from_name)
        .bind(fields.to_client_id)
        .bind(&to_name)
        .bind(fields.amount)
        .bind(fields.operation_date)
        .bind(&fields.notes)
        .bind(&fields.status)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::NotFound(OperationKind::Direct, id))?;
    info!(%id, "direct operation updated");
    Ok(row_to_direct(&row))
}

/// # Errors
///
/// Returns [`OperationError::NotFound`] or a database error.
pub async fn delete(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<(), OperationError> {
    if audit::delete_archived(pool, ArchiveTable::DirectOperations, id, Some(actor)).await? {
        Ok(())
    } else {
        Err(OperationError::NotFound(OperationKind::Direct, id))
    }
}

#[cfg(test)]
#[path = "direct_test.rs"]
mod tests;
