//! Postgres-backed user directory.
//!
//! Reads the `users` and `admins` tables. Enum-typed columns are cast to
//! text in SQL so decoding does not depend on the database enum names.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use careerlink_auth::{AdminProfile, AdminRole, Principal, PrincipalId};

use super::{parse_role, Credentials, DirectoryError, LoginIdentifier, UserDirectory};

const PRINCIPAL_COLUMNS: &str = "id, username, email, role::text AS role, avatar, is_active";

/// Shares one SQLx pool (thread-safe, `Clone`) across all requests.
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_principal_where(&self, column: &str, bind: PrincipalBind<'_>) -> Result<Principal, DirectoryError> {
        let sql = format!("SELECT {PRINCIPAL_COLUMNS} FROM users WHERE {column} = $1");
        let query = sqlx::query(&sql);
        let query = match bind {
            PrincipalBind::Id(id) => query.bind(id),
            PrincipalBind::Text(text) => query.bind(text),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(DirectoryError::NotFound)?;

        principal_from_row(&row)
    }
}

enum PrincipalBind<'a> {
    Id(Uuid),
    Text(&'a str),
}

fn db_err(e: sqlx::Error) -> DirectoryError {
    match e {
        sqlx::Error::PoolTimedOut => DirectoryError::Timeout,
        other => DirectoryError::Unavailable(other.to_string()),
    }
}

fn decode_err(e: sqlx::Error) -> DirectoryError {
    DirectoryError::InvalidRecord(e.to_string())
}

fn principal_from_row(row: &PgRow) -> Result<Principal, DirectoryError> {
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    let role: String = row.try_get("role").map_err(decode_err)?;

    Ok(Principal {
        id: PrincipalId::from_uuid(id),
        username: row.try_get("username").map_err(decode_err)?,
        email: row.try_get("email").map_err(decode_err)?,
        role: parse_role(&role)?,
        is_active: row.try_get("is_active").map_err(decode_err)?,
        avatar: row.try_get("avatar").map_err(decode_err)?,
    })
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn fetch_by_id(&self, id: PrincipalId) -> Result<Principal, DirectoryError> {
        self.fetch_principal_where("id", PrincipalBind::Id(*id.as_uuid())).await
    }

    async fn fetch_admin_profile(&self, id: PrincipalId) -> Result<AdminProfile, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, role::text AS role, is_active
            FROM admins
            WHERE user_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(DirectoryError::NotFound)?;

        let raw_role: String = row.try_get("role").map_err(decode_err)?;
        let sub_role = AdminRole::parse(&raw_role)
            .ok_or_else(|| DirectoryError::InvalidRecord(format!("unknown admin role '{raw_role}'")))?;

        Ok(AdminProfile {
            admin_id: row.try_get("id").map_err(decode_err)?,
            sub_role,
            is_active: row.try_get("is_active").map_err(decode_err)?,
        })
    }

    async fn fetch_by_email(&self, email: &str) -> Result<Principal, DirectoryError> {
        self.fetch_principal_where("email", PrincipalBind::Text(email)).await
    }

    async fn fetch_by_username(&self, username: &str) -> Result<Principal, DirectoryError> {
        self.fetch_principal_where("username", PrincipalBind::Text(username)).await
    }

    async fn fetch_credentials(&self, identifier: &LoginIdentifier) -> Result<Credentials, DirectoryError> {
        let (column, value) = match identifier {
            LoginIdentifier::Email(email) => ("email", email.as_str()),
            LoginIdentifier::Username(username) => ("username", username.as_str()),
        };

        let sql = format!("SELECT {PRINCIPAL_COLUMNS}, password FROM users WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(DirectoryError::NotFound)?;

        Ok(Credentials {
            principal: principal_from_row(&row)?,
            password_hash: row.try_get("password").map_err(decode_err)?,
        })
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_err)
    }
}
