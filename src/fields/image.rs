use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageReader;
use serde_json::Value;

use super::{FieldError, WireField};

pub const INLINE_IMAGE_PREFIX: &str = "data:image";
const BASE64_MARKER: &str = ";base64,";

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024; // 5MB
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

// FieldError::InvalidImage ya antepone "Upload a valid image."
const NOT_AN_IMAGE: &str = "The file you uploaded was either not an image or a corrupted image.";

/// Archivo en memoria: nombre y bytes, todavía sin guardar en disco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl ContentFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Campo de imagen que además de archivos subidos acepta
/// `data:image/<ext>;base64,<datos>`.
#[derive(Debug, Clone)]
pub struct Base64ImageField {
    media_url: String,
    max_bytes: usize,
}

impl Base64ImageField {
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Validación común a imágenes inline y a archivos de un multipart.
    pub fn validate_file(&self, file: ContentFile) -> Result<ContentFile, FieldError> {
        if file.is_empty() {
            return Err(FieldError::EmptyFile);
        }

        if file.len() > self.max_bytes {
            return Err(FieldError::InvalidImage(format!(
                "The file exceeds the maximum size of {} bytes.",
                self.max_bytes
            )));
        }

        match file.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(FieldError::InvalidImage(
                    "Only jpg, jpeg, png, webp and gif images are allowed.".to_string(),
                ))
            }
        }

        verify_image(&file.content)?;
        Ok(file)
    }
}

// Los bytes tienen que decodificarse como imagen, da igual la extensión
fn verify_image(content: &[u8]) -> Result<(), FieldError> {
    let reader = ImageReader::new(Cursor::new(content))
        .with_guessed_format()
        .map_err(|_| FieldError::InvalidImage(NOT_AN_IMAGE.to_string()))?;

    if reader.format().is_none() {
        return Err(FieldError::InvalidImage(NOT_AN_IMAGE.to_string()));
    }

    reader.decode().map(|_| ()).map_err(|e| {
        tracing::debug!("Imagen rechazada: {}", e);
        FieldError::InvalidImage(NOT_AN_IMAGE.to_string())
    })
}

/// Parte `data:image/png;base64,<datos>` en un `ContentFile` llamado `temp.png`.
pub fn decode_inline_image(data: &str) -> Result<ContentFile, FieldError> {
    let (format, payload) = data
        .split_once(BASE64_MARKER)
        .ok_or_else(|| FieldError::InvalidImage("Missing base64 marker.".to_string()))?;

    let ext = format
        .rsplit_once('/')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| FieldError::InvalidImage("Missing image subtype.".to_string()))?;

    // Base64 partido en líneas: los espacios no cuentan
    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let content = STANDARD
        .decode(payload)
        .map_err(|e| FieldError::InvalidImage(format!("Malformed base64 payload: {e}.")))?;

    Ok(ContentFile::new(format!("temp.{ext}"), content))
}

impl WireField for Base64ImageField {
    type Stored = str;
    type Wire = String;
    type Internal = ContentFile;

    fn to_representation(&self, value: &str) -> String {
        format!(
            "{}/{}",
            self.media_url.trim_end_matches('/'),
            value.trim_start_matches('/')
        )
    }

    fn to_internal_value(&self, data: &Value) -> Result<ContentFile, FieldError> {
        match data {
            Value::String(s) if s.starts_with(INLINE_IMAGE_PREFIX) => {
                self.validate_file(decode_inline_image(s)?)
            }
            // En JSON solo existen imágenes inline; los archivos llegan por multipart
            _ => Err(FieldError::NotAFile),
        }
    }
}
