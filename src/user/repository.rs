//! Handle database requests.

use sqlx::{Pool, Postgres};

use crate::error::Result;
use crate::user::User;

const USER_COLUMNS: &str = "u.id, u.email, u.name, u.password, u.is_active, u.is_staff, u.is_superuser, u.created_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert [`User`] into database, returning it with its generated fields.
    pub async fn insert(&self, user: &User) -> Result<User> {
        let query = format!(
            r#"INSERT INTO users AS u (email, name, password, is_active, is_staff, is_superuser)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {USER_COLUMNS}"#
        );

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Find user using `id` field.
    pub async fn find_by_id(&self, user_id: i64) -> Result<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Find user using its normalized `email` field.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Find the active user owning a token digest.
    pub async fn find_by_token(&self, digest: &str) -> Result<Option<User>> {
        let query = format!(
            r#"SELECT {USER_COLUMNS} FROM users u
                INNER JOIN tokens t ON t.user_id = u.id
                WHERE t.digest = $1 AND u.is_active"#
        );

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(digest)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Update current user.
    pub async fn update(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"UPDATE users
                SET email = $1, name = $2, password = $3, is_active = $4, is_staff = $5, is_superuser = $6
                WHERE id = $7"#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a token digest linked to user into database.
    pub async fn insert_token(&self, digest: &str, user_id: i64) -> Result<()> {
        sqlx::query(r#"INSERT INTO tokens (digest, user_id) VALUES ($1, $2)"#)
            .bind(digest)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
