use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing env var: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    /// Solo obligatorio con `STORAGE_BACKEND=postgres`.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub upload_dir: String,
    pub media_url: String,
}

impl AppConfig {
    /// Lee la configuración de las variables de entorno (y del `.env`, que
    /// `main` carga antes).
    ///
    /// Defaults: `PORT=3000`, `DB_MAX_CONNECTIONS=5`, `UPLOAD_DIR=uploads`,
    /// `MEDIA_URL=/uploads`, `STORAGE_BACKEND=postgres`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let database_url = lookup("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL"));
        }

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::MissingEnvVar("JWT_SECRET"))?;

        Ok(Self {
            storage,
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            port: parse_or(&lookup, "PORT", 3000)?,
            upload_dir: lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            media_url: media_url(&lookup)?,
        })
    }
}

// Prefijo público de las imágenes: una ruta como `/uploads` o una URL
// absoluta. No puede ser la raíz, ahí vive la API.
fn media_url<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup("MEDIA_URL") else {
        return Ok("/uploads".to_string());
    };

    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() || (!trimmed.starts_with('/') && !trimmed.contains("://")) {
        return Err(ConfigError::InvalidValue {
            name: "MEDIA_URL",
            value,
        });
    }

    Ok(trimmed.to_string())
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
