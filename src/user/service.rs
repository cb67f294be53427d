use std::sync::Arc;

use sqlx::{Pool, Postgres};
use validator::{ValidationError, ValidationErrors};

use crate::crypto::{Crypto, random_token};
use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository, normalize_email};

/// Fields a user may change on its own account.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    pub repo: UserRepository,
    pub crypto: Arc<Crypto>,
    pub data: User,
}

fn missing_email() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "email",
        ValidationError::new("required")
            .with_message("Users must have a valid email address.".into()),
    );
    errors
}

/// Map the unique violation on `users.email` to a field error.
fn email_taken(err: ServerError) -> ServerError {
    match &err {
        ServerError::Sql(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            let mut errors = ValidationErrors::new();
            errors.add(
                "email",
                ValidationError::new("unique")
                    .with_message("User with this email already exists.".into()),
            );
            errors.into()
        },
        _ => err,
    }
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(user: User, pool: Pool<Postgres>, crypto: Arc<Crypto>) -> Self {
        Self {
            data: user,
            repo: UserRepository::new(pool),
            crypto,
        }
    }

    /// Create builded user.
    ///
    /// Normalize email and hash password.
    pub async fn create_user(mut self) -> Result<Self> {
        self.data.email = normalize_email(&self.data.email);
        if self.data.email.is_empty() {
            return Err(missing_email().into());
        }

        self.data.password = self.crypto.pwd.hash_password(&self.data.password)?;
        self.data = self.repo.insert(&self.data).await.map_err(email_taken)?;

        tracing::info!(user_id = self.data.id, "user created");
        Ok(self)
    }

    /// Create builded user with staff and superuser rights.
    pub async fn create_superuser(self) -> Result<Self> {
        let mut service = self.create_user().await?;
        service.data.is_staff = true;
        service.data.is_superuser = true;
        service.repo.update(&service.data).await?;

        tracing::info!(user_id = service.data.id, "user promoted to superuser");
        Ok(service)
    }

    /// Check credentials of builded user and issue a new token.
    pub async fn authenticate(mut self, password: &str) -> Result<String> {
        let email = normalize_email(&self.data.email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            return Err(ServerError::Unauthorized);
        };

        if !user.is_active {
            return Err(ServerError::Unauthorized);
        }

        self.crypto
            .pwd
            .verify_password(password, &user.password)
            .map_err(|_| ServerError::Unauthorized)?;

        self.data = user;
        self.generate_token().await
    }

    /// Generate a new opaque token to user.
    ///
    /// Only its digest is saved.
    pub async fn generate_token(&self) -> Result<String> {
        let token = random_token();

        self.repo
            .insert_token(&self.crypto.hasher.digest(&token), self.data.id)
            .await?;
        Ok(token)
    }

    /// Apply changes on current user and save them.
    pub async fn update(mut self, changes: UserChanges) -> Result<Self> {
        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(missing_email().into());
            }
            self.data.email = email;
        }

        if let Some(name) = changes.name {
            self.data.name = name;
        }

        if let Some(password) = changes.password {
            self.data.password = self.crypto.pwd.hash_password(password)?;
        }

        self.repo.update(&self.data).await.map_err(email_taken)?;
        Ok(self)
    }
}
