use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    #[sqlx(rename = "admin")]
    #[serde(rename = "admin")]
    Admin,
    #[sqlx(rename = "discente")]
    #[serde(rename = "discente")]
    Student,
    #[sqlx(rename = "servidor")]
    #[serde(rename = "servidor")]
    Staff,
    #[default]
    #[sqlx(rename = "visitante")]
    #[serde(rename = "visitante")]
    Guest,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // Argon2 PHC string, not exposed in JSON
    pub active: bool,
    pub role: Role,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The `id, name, email` projection returned by inserts and updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

/// Fields supplied on registration; the store fills in the rest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirmation_token: String,
}

/// Exactly one key a record can be matched by.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Id(Uuid),
    Email(&'a str),
    ResetToken(&'a str),
    ConfirmationToken(&'a str),
}

/// Column changes for a conditional update. `None` leaves a column untouched;
/// `Some(None)` on a token column clears it.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub password: Option<String>,
    pub active: Option<bool>,
    pub reset_token: Option<Option<String>>,
    pub confirmation_token: Option<Option<String>>,
}
