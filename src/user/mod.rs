mod builder;
mod repository;
mod service;

pub use builder::*;
pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

/// User as saved on database.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub is_active: bool,
    #[serde(skip)]
    pub is_staff: bool,
    #[serde(skip)]
    pub is_superuser: bool,
    #[serde(skip)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Normalize an email address by lowercasing its domain part.
///
/// The local part is kept as-is: mailboxes may be case-sensitive.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();

    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_owned(),
    }
}
