use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::users::repo_types::{Lookup, NewUser, User, UserChanges, UserSummary};

const USER_COLUMNS: &str = "id, name, email, password, active, role, reset_token, \
                            confirmation_token, created_at, updated_at";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("email already registered")]
    DuplicateEmail,
}

/// Record store for users. Both `insert` and `update` are single atomic
/// statements: the duplicate check happens inside the insert and the match
/// on `lookup` happens inside the update.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, StoreError>;

    /// Fails with `DuplicateEmail` when the address is taken.
    async fn insert(&self, user: NewUser) -> Result<UserSummary, StoreError>;

    /// Applies `changes` to the record matching `lookup`; `None` if nothing matched.
    async fn update(
        &self,
        lookup: Lookup<'_>,
        changes: UserChanges,
    ) -> Result<Option<UserSummary>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_lookup(qb: &mut QueryBuilder<'_, Postgres>, lookup: Lookup<'_>) {
    match lookup {
        Lookup::Id(id) => qb.push("id = ").push_bind(id),
        Lookup::Email(email) => qb.push("email = ").push_bind(email.to_string()),
        Lookup::ResetToken(token) => qb.push("reset_token = ").push_bind(token.to_string()),
        Lookup::ConfirmationToken(token) => qb
            .push("confirmation_token = ")
            .push_bind(token.to_string()),
    };
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find(&self, lookup: Lookup<'_>) -> Result<Option<User>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE "));
        push_lookup(&mut qb, lookup);
        let user = qb.build_query_as::<User>().fetch_optional(&self.db).await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<UserSummary, StoreError> {
        let saved = sqlx::query_as::<_, UserSummary>(
            r#"
            INSERT INTO users (name, email, password, confirmation_token)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password)
        .bind(user.confirmation_token)
        .fetch_optional(&self.db)
        .await?;
        saved.ok_or(StoreError::DuplicateEmail)
    }

    async fn update(
        &self,
        lookup: Lookup<'_>,
        changes: UserChanges,
    ) -> Result<Option<UserSummary>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(password) = changes.password {
            qb.push(", password = ").push_bind(password);
        }
        if let Some(active) = changes.active {
            qb.push(", active = ").push_bind(active);
        }
        if let Some(reset_token) = changes.reset_token {
            qb.push(", reset_token = ").push_bind(reset_token);
        }
        if let Some(confirmation_token) = changes.confirmation_token {
            qb.push(", confirmation_token = ").push_bind(confirmation_token);
        }
        qb.push(" WHERE ");
        push_lookup(&mut qb, lookup);
        qb.push(" RETURNING id, name, email");

        let updated = qb
            .build_query_as::<UserSummary>()
            .fetch_optional(&self.db)
            .await?;
        Ok(updated)
    }
}
