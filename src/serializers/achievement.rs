use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ErrorDetail, ItemErrors, NON_FIELD_ERRORS};
use crate::{
    fields::{json_type_name, CharField, FieldError, WireField},
    models::achievement::Achievement,
};

pub const ACHIEVEMENT_NAME_MAX_LENGTH: usize = 64;

// En el JSON el campo "name" se llama "achievement_name"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementResponse {
    pub id: i64,
    pub achievement_name: String,
}

/// Datos validados de un logro: los campos por los que se busca o se crea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementData {
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementSerializer {
    name: CharField,
}

impl Default for AchievementSerializer {
    fn default() -> Self {
        Self {
            name: CharField::new(ACHIEVEMENT_NAME_MAX_LENGTH),
        }
    }
}

impl AchievementSerializer {
    pub fn to_representation(&self, achievement: &Achievement) -> AchievementResponse {
        AchievementResponse {
            id: achievement.id,
            achievement_name: self.name.to_representation(&achievement.name),
        }
    }

    pub fn to_internal_value(&self, data: &Value) -> Result<AchievementData, ItemErrors> {
        let mut errors = ItemErrors::new();

        let Some(object) = data.as_object() else {
            let error = FieldError::NotAnObject(json_type_name(data));
            errors.insert(NON_FIELD_ERRORS.to_string(), vec![error.to_string()]);
            return Err(errors);
        };

        let name = match object.get("achievement_name") {
            None => Err(FieldError::Required),
            Some(Value::Null) => Err(FieldError::Null),
            Some(value) => self.name.to_internal_value(value),
        };

        match name {
            Ok(name) => Ok(AchievementData { name }),
            Err(error) => {
                errors.insert("achievement_name".to_string(), vec![error.to_string()]);
                Err(errors)
            }
        }
    }

    /// Valida una lista de logros. Los errores conservan la posición de cada
    /// elemento, con un mapa vacío para los válidos.
    pub fn to_internal_list(&self, data: &Value) -> Result<Vec<AchievementData>, ErrorDetail> {
        let items = match data {
            Value::Array(items) => items,
            Value::Null => return Err(ErrorDetail::Messages(vec![FieldError::Null.to_string()])),
            other => {
                let error = FieldError::NotAList(json_type_name(other));
                return Err(ErrorDetail::Messages(vec![error.to_string()]));
            }
        };

        let results: Vec<_> = items.iter().map(|item| self.to_internal_value(item)).collect();
        if results.iter().all(Result::is_ok) {
            return Ok(results.into_iter().filter_map(Result::ok).collect());
        }

        Err(ErrorDetail::Items(
            results.into_iter().map(|r| r.err().unwrap_or_default()).collect(),
        ))
    }
}
