use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs; // Usamos el sistema de archivos asíncrono
use uuid::Uuid;

use crate::fields::ContentFile;

// Subcarpeta de UPLOAD_DIR donde van las fotos de gatos
pub const CAT_IMAGES_DIR: &str = "cats/images";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Guarda archivos bajo `root` y los expone en `base_url`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Escribe el archivo con un nombre único y devuelve su ruta relativa
    /// (ej: `cats/images/550e8400-....png`).
    pub async fn save(&self, dir: &str, file: &ContentFile) -> Result<String, StorageError> {
        let extension = file
            .extension()
            .ok_or_else(|| StorageError::InvalidName(file.name.clone()))?;

        let target_dir = self.root.join(dir);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).await?;
        }

        let new_filename = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(target_dir.join(&new_filename), &file.content).await?;

        Ok(format!("{}/{}", dir.trim_end_matches('/'), new_filename))
    }

    /// Borra un archivo guardado. Si ya no existe no es un error.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        if relative.split('/').any(|part| part == "..") {
            return Err(StorageError::InvalidName(relative.to_string()));
        }

        match fs::remove_file(self.root.join(relative)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
