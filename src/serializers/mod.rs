use std::sync::Arc;

use thiserror::Error;

use crate::{
    repositories::{CatRepository, RepositoryError},
    storage::{MediaStorage, StorageError},
};

pub mod achievement;
pub mod cat;
pub mod errors;

pub use achievement::{AchievementResponse, AchievementSerializer};
pub use cat::{CatResponse, CatSerializer, ValidatedCat};
pub use errors::ValidationErrors;

/// Lo que necesita un serializer para guardar: repositorio y almacenamiento
/// de imágenes. Se pasa explícitamente a cada create/update.
#[derive(Clone)]
pub struct Persistence {
    pub cats: Arc<dyn CatRepository>,
    pub media: MediaStorage,
}

impl Persistence {
    pub fn new(cats: Arc<dyn CatRepository>, media: MediaStorage) -> Self {
        Self { cats, media }
    }
}

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
