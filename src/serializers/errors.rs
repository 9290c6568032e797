use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fields::FieldError;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Errores de un objeto anidado: campo -> mensajes.
pub type ItemErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Messages(Vec<String>),
    // Una entrada por elemento de la lista; vacía si el elemento era válido
    Items(Vec<ItemErrors>),
}

/// Errores de validación por campo, en el formato `{"campo": ["mensaje"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, ErrorDetail>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, error: FieldError) -> Self {
        let mut errors = Self::new();
        errors.add(field, error);
        errors
    }

    /// Errores de un objeto suelto (no anidado en una lista).
    pub fn from_item(item: ItemErrors) -> Self {
        Self(
            item.into_iter()
                .map(|(field, messages)| (field, ErrorDetail::Messages(messages)))
                .collect(),
        )
    }

    pub fn add(&mut self, field: &str, error: FieldError) {
        self.add_message(field, error.to_string());
    }

    pub fn add_message(&mut self, field: &str, message: String) {
        match self
            .0
            .entry(field.to_string())
            .or_insert_with(|| ErrorDetail::Messages(Vec::new()))
        {
            ErrorDetail::Messages(messages) => messages.push(message),
            // un campo con errores por elemento no recibe además mensajes sueltos
            ErrorDetail::Items(_) => {}
        }
    }

    pub fn set_detail(&mut self, field: &str, detail: ErrorDetail) {
        self.0.insert(field.to_string(), detail);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&ErrorDetail> {
        self.0.get(field)
    }

    /// Mensajes planos de un campo; vacío si no hay o si son por elemento.
    pub fn messages(&self, field: &str) -> &[String] {
        match self.0.get(field) {
            Some(ErrorDetail::Messages(messages)) => messages,
            _ => &[],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}
