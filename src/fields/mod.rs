use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod color;
pub mod image;

pub use self::color::HexColorField;
pub use self::image::{Base64ImageField, ContentFile};

// Errores de un campo individual. El texto es lo que ve el cliente.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("This field is required.")]
    Required,

    #[error("This field may not be null.")]
    Null,

    #[error("This field may not be blank.")]
    Blank,

    #[error("Not a valid string.")]
    NotAString,

    #[error("Ensure this field has no more than {0} characters.")]
    MaxLength(usize),

    #[error("A valid integer is required.")]
    InvalidInteger,

    #[error("no name exists for this color.")]
    UnknownColor,

    #[error("The submitted data was not a file. Check the encoding type on the form.")]
    NotAFile,

    #[error("The submitted file is empty.")]
    EmptyFile,

    #[error("Upload a valid image. {0}")]
    InvalidImage(String),

    #[error("Expected a list of items but got type \"{0}\".")]
    NotAList(&'static str),

    #[error("Invalid data. Expected a dictionary, but got {0}.")]
    NotAnObject(&'static str),
}

/// Conversión bidireccional entre el valor guardado en un registro y su
/// representación JSON.
///
/// `Stored` es lo que tiene el registro, `Wire` lo que ve el cliente e
/// `Internal` lo que produce la validación de entrada para la persistencia.
pub trait WireField {
    type Stored: ?Sized;
    type Wire: Serialize;
    type Internal;

    fn to_representation(&self, value: &Self::Stored) -> Self::Wire;

    fn to_internal_value(&self, data: &Value) -> Result<Self::Internal, FieldError>;
}

/// Nombre de tipo JSON tal como aparece en los mensajes de error.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharField {
    pub max_length: usize,
}

impl CharField {
    pub const fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl WireField for CharField {
    type Stored = str;
    type Wire = String;
    type Internal = String;

    fn to_representation(&self, value: &str) -> String {
        value.to_string()
    }

    fn to_internal_value(&self, data: &Value) -> Result<String, FieldError> {
        // Los números se aceptan como texto; los booleanos no
        let text = match data {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(FieldError::NotAString),
        };

        if text.is_empty() {
            return Err(FieldError::Blank);
        }
        if text.chars().count() > self.max_length {
            return Err(FieldError::MaxLength(self.max_length));
        }

        Ok(text)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerField;

impl WireField for IntegerField {
    type Stored = i32;
    type Wire = i32;
    type Internal = i32;

    fn to_representation(&self, value: &i32) -> i32 {
        *value
    }

    fn to_internal_value(&self, data: &Value) -> Result<i32, FieldError> {
        match data {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(|v| i32::try_from(v).ok())
                .ok_or(FieldError::InvalidInteger),
            Value::String(s) => s.trim().parse::<i32>().map_err(|_| FieldError::InvalidInteger),
            _ => Err(FieldError::InvalidInteger),
        }
    }
}
