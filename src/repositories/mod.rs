//! Capa de persistencia para gatos, logros y usuarios.
//!
//! Los handlers y el serializer solo conocen los traits; la implementación
//! concreta (Postgres o memoria) se elige al arrancar según la configuración.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    achievement::Achievement,
    cat::{Cat, CatRecord, NewCat},
    user::{NewUser, User},
};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRepository;
pub use postgres::PgRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(String),

    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            // 23505: UNIQUE, 23503: FOREIGN KEY
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("23505") | Some("23503")) =>
            {
                RepositoryError::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::ConnectionError(error.to_string())
            }
            _ => RepositoryError::Unknown(error.to_string()),
        }
    }
}

#[async_trait]
pub trait CatRepository: Send + Sync {
    /// Inserta el gato. Con `Some(nombres)` cada logro se busca o se crea y
    /// queda enlazado al gato. Todo ocurre en una sola transacción.
    async fn create(
        &self,
        cat: NewCat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<CatRecord, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<CatRecord>, RepositoryError>;

    /// Guarda los campos escalares de `cat`. Con `Some(nombres)` el conjunto de
    /// logros se reemplaza por exactamente esos nombres.
    async fn update(
        &self,
        cat: Cat,
        achievements: Option<Vec<String>>,
    ) -> Result<CatRecord, RepositoryError>;

    /// Devuelve la fila borrada para poder limpiar su imagen.
    async fn delete_by_id(&self, id: i64) -> Result<Cat, RepositoryError>;

    async fn get_or_create_achievement(&self, name: &str) -> Result<Achievement, RepositoryError>;

    async fn get_achievement(&self, id: i64) -> Result<Achievement, RepositoryError>;

    async fn list_achievements(&self) -> Result<Vec<Achievement>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn count_users(&self) -> Result<i64, RepositoryError>;
}

/// Quita nombres repetidos conservando el orden de llegada.
pub(crate) fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}
