//! Typed builder for User.

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::crypto::Crypto;
use crate::user::{User, UserService};

/// [`User`] builder.
#[derive(Debug, Clone)]
pub struct UserBuilder<Email> {
    email: Email,
    name: String,
    password: String,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl Default for UserBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl UserBuilder<Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            email: Missing,
            name: String::default(),
            password: String::default(),
        }
    }

    /// Update `email` field on [`UserBuilder`].
    pub fn email(self, email: impl Into<String>) -> UserBuilder<Present<String>> {
        UserBuilder {
            email: Present(email.into()),
            name: self.name,
            password: self.password,
        }
    }
}

impl<Email> UserBuilder<Email> {
    /// Update `password` field on [`UserBuilder`].
    pub fn password(mut self, password: impl ToString) -> Self {
        self.password = password.to_string();
        self
    }

    /// Update `name` field on [`UserBuilder`].
    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = name.unwrap_or_default();
        self
    }
}

impl UserBuilder<Present<String>> {
    /// Build a [`UserService`] around a not-yet-saved [`User`].
    ///
    /// `password` stays in plain text until
    /// [`UserService::create_user`] hashes it.
    pub fn build(self, pool: Pool<Postgres>, crypto: Arc<Crypto>) -> UserService {
        let user = User {
            email: self.email.0,
            name: self.name,
            password: self.password,
            is_active: true,
            ..Default::default()
        };

        UserService::new(user, pool, crypto)
    }
}
