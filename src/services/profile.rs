//! Profiles, passwords and sign-in.
//!
//! DESIGN
//! ======
//! A profile is a back-office user: an admin or an agent. Agents act
//! through the permissions granted in `user_permissions`; admins hold every
//! permission implicitly. Passwords are stored as Argon2id PHC strings.
//!
//! Sign-in is the one request with an explicit deadline: the lookup and the
//! password check run under `tokio::time::timeout` so a stalled database
//! surfaces as [`AuthError::Timeout`] instead of a hung login form.
//!
//! TRADE-OFFS
//! ==========
//! Unknown usernames and wrong passwords return the same error. Argon2 runs
//! on the request task; sign-in volume is a handful of users, not a public
//! login endpoint.

use std::collections::BTreeSet;
use std::time::Duration;

use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use super::access::{DbErrorClass, Permission, Principal, Role, classify_db_error};
use super::session;
use super::validation::{self, NAME_MAX_LEN, ValidationError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("profile is inactive")]
    Inactive,
    #[error("sign-in timed out")]
    Timeout,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("profile not found: {0}")]
    NotFound(Uuid),
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("cannot delete or deactivate your own profile")]
    SelfTarget,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("permission denied by database policy")]
    Denied,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match classify_db_error(&err) {
            DbErrorClass::PermissionDenied => Self::Denied,
            _ => Self::Database(err),
        }
    }
}

impl crate::frame::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Inactive => "E_PROFILE_INACTIVE",
            Self::Timeout => "E_TIMEOUT",
            Self::Invalid(inner) => inner.error_code(),
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::UsernameTaken(_) => "E_USERNAME_TAKEN",
            Self::SelfTarget => "E_SELF_TARGET",
            Self::Hash(_) => "E_PASSWORD_HASH",
            Self::Denied => "E_PERMISSION_DENIED",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Database(err) => classify_db_error(err) == DbErrorClass::Unavailable,
            _ => false,
        }
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password into an Argon2id PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Hash`] if Argon2 rejects its input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check `candidate` against a stored PHC string. A malformed stored hash
/// never verifies.
#[must_use]
pub fn verify_password(candidate: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        warn!("stored password hash is malformed");
        return false;
    };
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(PasswordHashError::Password) => false,
        Err(e) => {
            warn!(error = %e, "password verification failed");
            false
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

/// Validated profile columns, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl NewProfile {
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<ProfileFields, ValidationError> {
        validation::password(&self.password)?;
        Ok(ProfileFields {
            username: validation::username(&self.username)?,
            full_name: validation::required_text("full_name", &self.full_name, NAME_MAX_LEN)?,
            email: validation::email(self.email.as_deref())?,
            role: self.role.unwrap_or(Role::Agent),
        })
    }
}

impl ProfilePatch {
    /// Merge onto `current`. The password is checked here but hashed by the caller.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn apply(&self, current: &ProfileRow) -> Result<ProfileFields, ValidationError> {
        if let Some(password) = &self.password {
            validation::password(password)?;
        }
        let full_name = match &self.full_name {
            Some(name) => validation::required_text("full_name", name, NAME_MAX_LEN)?,
            None => current.full_name.clone(),
        };
        let email = match &self.email {
            Some(email) => validation::email(Some(email))?,
            None => current.email.clone(),
        };
        Ok(ProfileFields {
            username: current.username.clone(),
            full_name,
            email,
            role: self.role.unwrap_or(current.role),
        })
    }
}

/// Parse stored permission names, skipping any this build does not know.
fn parse_permissions(raw: Vec<String>) -> Vec<Permission> {
    let mut out: Vec<Permission> = raw
        .iter()
        .filter_map(|name| match name.parse::<Permission>() {
            Ok(p) => Some(p),
            Err(_) => {
                warn!(permission = %name, "ignoring unknown stored permission");
                None
            }
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

const PROFILE_SELECT: &str = "SELECT p.id, p.username, p.full_name, p.email, p.role, p.active, p.created_at,
            COALESCE(array_agg(up.permission) FILTER (WHERE up.permission IS NOT NULL), '{}') AS permissions
       FROM profiles p
       LEFT JOIN user_permissions up ON up.user_id = p.id";

fn row_to_profile(r: &PgRow) -> ProfileRow {
    let role: String = r.get("role");
    ProfileRow {
        id: r.get("id"),
        username: r.get("username"),
        full_name: r.get("full_name"),
        email: r.get("email"),
        role: Role::from_db(&role),
        active: r.get("active"),
        permissions: parse_permissions(r.get("permissions")),
        created_at: r.get("created_at"),
    }
}

// =============================================================================
// PRINCIPALS & SIGN-IN
// =============================================================================

/// Load the caller for an active profile; `None` if missing or inactive.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn load_principal(pool: &PgPool, user_id: Uuid) -> Result<Option<Principal>, sqlx::Error> {
    let sql = format!("{PROFILE_SELECT} WHERE p.id = $1 AND p.active GROUP BY p.id");
    let row = sqlx::query(&sql).bind(user_id).fetch_optional(pool).await?;
    Ok(row.map(|r| {
        let profile = row_to_profile(&r);
        Principal {
            id: profile.id,
            username: profile.username,
            full_name: profile.full_name,
            role: profile.role,
            permissions: profile.permissions.into_iter().collect::<BTreeSet<_>>(),
        }
    }))
}

async fn check_credentials(pool: &PgPool, username: &str, password: &str) -> Result<Principal, AuthError> {
    let username = username.trim().to_ascii_lowercase();
    let row = sqlx::query("SELECT id, password_hash, active FROM profiles WHERE username = $1")
        .bind(&username)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(AuthError::InvalidCredentials);
    };
    let stored: String = row.get("password_hash");
    if !verify_password(password, &stored) {
        return Err(AuthError::InvalidCredentials);
    }
    if !row.get::<bool, _>("active") {
        return Err(AuthError::Inactive);
    }
    let id: Uuid = row.get("id");
    load_principal(pool, id).await?.ok_or(AuthError::Inactive)
}

/// Verify credentials within `timeout`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentials`], [`AuthError::Inactive`],
/// [`AuthError::Timeout`], or a database error.
pub async fn login(pool: &PgPool, username: &str, password: &str, timeout: Duration) -> Result<Principal, AuthError> {
    let principal = tokio::time::timeout(timeout, check_credentials(pool, username, password))
        .await
        .map_err(|_| {
            warn!(%username, timeout_ms = timeout.as_millis(), "sign-in timed out");
            AuthError::Timeout
        })??;
    info!(user_id = %principal.id, username = %principal.username, "signed in");
    Ok(principal)
}

// =============================================================================
// ADMINISTRATION
// =============================================================================

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_profiles(pool: &PgPool) -> Result<Vec<ProfileRow>, AuthError> {
    let sql = format!("{PROFILE_SELECT} GROUP BY p.id ORDER BY p.username");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_profile).collect())
}

/// # Errors
///
/// Returns [`AuthError::NotFound`] or a database error.
pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<ProfileRow, AuthError> {
    let sql = format!("{PROFILE_SELECT} WHERE p.id = $1 GROUP BY p.id");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::NotFound(id))?;
    Ok(row_to_profile(&row))
}

/// Create a profile and its initial grants in one transaction.
///
/// # Errors
///
/// Returns a validation error, [`AuthError::UsernameTaken`], or a database error.
pub async fn create_profile(pool: &PgPool, input: &NewProfile) -> Result<ProfileRow, AuthError> {
    let fields = input.validate()?;
    let password_hash = hash_password(&input.password)?;

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO profiles (username, full_name, email, role, password_hash)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(&fields.username)
    .bind(&fields.full_name)
    .bind(&fields.email)
    .bind(fields.role.as_str())
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await;
    let id: Uuid = match inserted {
        Ok(row) => row.get("id"),
        Err(err) if classify_db_error(&err) == DbErrorClass::UniqueViolation => {
            return Err(AuthError::UsernameTaken(fields.username));
        }
        Err(err) => return Err(err.into()),
    };
    for permission in &input.permissions {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(user_id = %id, username = %fields.username, role = fields.role.as_str(), "profile created");
    get_profile(pool, id).await
}

/// Update a profile. Deactivating or changing the password ends every
/// session of that profile.
///
/// # Errors
///
/// Returns [`AuthError::NotFound`], [`AuthError::SelfTarget`], a validation
/// error, or a database error.
pub async fn update_profile(pool: &PgPool, id: Uuid, patch: &ProfilePatch, actor: Uuid) -> Result<ProfileRow, AuthError> {
    if id == actor && patch.active == Some(false) {
        return Err(AuthError::SelfTarget);
    }
    let current = get_profile(pool, id).await?;
    let fields = patch.apply(&current)?;
    let active = patch.active.unwrap_or(current.active);
    let password_hash = patch.password.as_deref().map(hash_password).transpose()?;

    sqlx::query(
        "UPDATE profiles
            SET full_name = $2, email = $3, role = $4, active = $5,
                password_hash = COALESCE($6, password_hash)
          WHERE id = $1",
    )
    .bind(id)
    .bind(&fields.full_name)
    .bind(&fields.email)
    .bind(fields.role.as_str())
    .bind(active)
    .bind(&password_hash)
    .execute(pool)
    .await?;

    if !active || password_hash.is_some() {
        let ended = session::delete_user_sessions(pool, id).await?;
        info!(user_id = %id, ended, "sessions ended after profile change");
    }
    info!(user_id = %id, "profile updated");
    get_profile(pool, id).await
}

/// # Errors
///
/// Returns [`AuthError::SelfTarget`], [`AuthError::NotFound`], or a database error.
pub async fn delete_profile(pool: &PgPool, id: Uuid, actor: Uuid) -> Result<(), AuthError> {
    if id == actor {
        return Err(AuthError::SelfTarget);
    }
    let result = sqlx::query("DELETE FROM profiles WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::NotFound(id));
    }
    info!(user_id = %id, %actor, "profile deleted");
    Ok(())
}

/// Replace the granted permissions of a profile.
///
/// # Errors
///
/// Returns [`AuthError::NotFound`] or a database error.
pub async fn set_permissions(pool: &PgPool, id: Uuid, permissions: &[Permission]) -> Result<ProfileRow, AuthError> {
    let mut tx = pool.begin().await?;
    let exists = sqlx::query("SELECT 1 FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AuthError::NotFound(id));
    }
    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let wanted: BTreeSet<Permission> = permissions.iter().copied().collect();
    for permission in &wanted {
        sqlx::query("INSERT INTO user_permissions (user_id, permission) VALUES ($1, $2)")
            .bind(id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    info!(user_id = %id, count = wanted.len(), "permissions replaced");
    get_profile(pool, id).await
}

/// Create the first admin when no profile exists yet. Returns the new id,
/// or `None` if profiles were already present.
///
/// # Errors
///
/// Returns a validation or database error.
pub async fn bootstrap_admin(pool: &PgPool, username: &str, password: &str) -> Result<Option<Uuid>, AuthError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles").fetch_one(pool).await?;
    if existing > 0 {
        return Ok(None);
    }
    let input = NewProfile {
        username: username.to_owned(),
        full_name: "Administrator".to_owned(),
        email: None,
        role: Some(Role::Admin),
        password: password.to_owned(),
        permissions: Vec::new(),
    };
    let profile = create_profile(pool, &input).await?;
    info!(user_id = %profile.id, username = %profile.username, "bootstrap admin created");
    Ok(Some(profile.id))
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
