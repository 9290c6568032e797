use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    achievement::{AchievementData, AchievementResponse, AchievementSerializer},
    errors::{ValidationErrors, NON_FIELD_ERRORS},
    Persistence, SerializerError,
};
use crate::{
    fields::{
        json_type_name, Base64ImageField, CharField, ContentFile, FieldError, HexColorField,
        IntegerField, WireField,
    },
    models::cat::{Cat, CatRecord, NewCat},
    storage::CAT_IMAGES_DIR,
};

pub const CAT_NAME_MAX_LENGTH: usize = 16;

// Lo que devolvemos al cliente
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatResponse {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub birth_year: i32,
    pub achievements: Vec<AchievementResponse>,
    pub owner: i64,
    pub age: i64,
    pub image: Option<String>,
}

/// Resultado de validar un payload. Cada `None` significa "no venía en el
/// JSON"; `id`, `owner` y `age` son de solo lectura y nunca llegan aquí.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedCat {
    pub name: Option<String>,
    pub color: Option<String>,
    pub birth_year: Option<i32>,
    /// `Some(None)` cuando el cliente envió `"image": null`.
    pub image: Option<Option<ContentFile>>,
    /// `None` solo si la clave `achievements` no estaba en el JSON original;
    /// una lista vacía es `Some(vec![])`.
    pub achievements: Option<Vec<AchievementData>>,
}

#[derive(Debug, Clone)]
pub struct CatSerializer {
    name: CharField,
    color: HexColorField,
    birth_year: IntegerField,
    image: Base64ImageField,
    achievements: AchievementSerializer,
}

fn validate_scalar<F: WireField>(
    object: &Map<String, Value>,
    key: &str,
    field: &F,
    partial: bool,
    errors: &mut ValidationErrors,
) -> Option<F::Internal> {
    match object.get(key) {
        None if partial => None,
        None => {
            errors.add(key, FieldError::Required);
            None
        }
        Some(Value::Null) => {
            errors.add(key, FieldError::Null);
            None
        }
        Some(value) => match field.to_internal_value(value) {
            Ok(internal) => Some(internal),
            Err(error) => {
                errors.add(key, error);
                None
            }
        },
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationErrors> {
    value.ok_or_else(|| ValidationErrors::single(field, FieldError::Required))
}

fn achievement_names(achievements: Option<Vec<AchievementData>>) -> Option<Vec<String>> {
    achievements.map(|items| items.into_iter().map(|item| item.name).collect())
}

impl CatSerializer {
    pub fn new(media_url: impl Into<String>) -> Self {
        Self {
            name: CharField::new(CAT_NAME_MAX_LENGTH),
            color: HexColorField,
            birth_year: IntegerField,
            image: Base64ImageField::new(media_url),
            achievements: AchievementSerializer::default(),
        }
    }

    pub fn image_field(&self) -> &Base64ImageField {
        &self.image
    }

    pub fn to_representation(&self, record: &CatRecord) -> CatResponse {
        let cat = &record.cat;
        CatResponse {
            id: cat.id,
            name: self.name.to_representation(&cat.name),
            color: self.color.to_representation(&cat.color),
            birth_year: self.birth_year.to_representation(&cat.birth_year),
            achievements: record
                .achievements
                .iter()
                .map(|a| self.achievements.to_representation(a))
                .collect(),
            owner: cat.owner_id,
            age: cat.age(),
            image: cat
                .image
                .as_deref()
                .map(|path| self.image.to_representation(path)),
        }
    }

    /// Valida el JSON de entrada. Con `partial` ningún campo es obligatorio
    /// (PATCH). Se devuelven todos los errores juntos.
    pub fn validate(&self, data: &Value, partial: bool) -> Result<ValidatedCat, ValidationErrors> {
        let Some(object) = data.as_object() else {
            return Err(ValidationErrors::single(
                NON_FIELD_ERRORS,
                FieldError::NotAnObject(json_type_name(data)),
            ));
        };

        let mut errors = ValidationErrors::new();
        let mut validated = ValidatedCat {
            name: validate_scalar(object, "name", &self.name, partial, &mut errors),
            color: validate_scalar(object, "color", &self.color, partial, &mut errors),
            birth_year: validate_scalar(object, "birth_year", &self.birth_year, partial, &mut errors),
            ..ValidatedCat::default()
        };

        match object.get("image") {
            None => {}
            Some(Value::Null) => validated.image = Some(None),
            Some(value) => match self.image.to_internal_value(value) {
                Ok(file) => validated.image = Some(Some(file)),
                Err(error) => errors.add("image", error),
            },
        }

        if let Some(value) = object.get("achievements") {
            match self.achievements.to_internal_list(value) {
                Ok(items) => validated.achievements = Some(items),
                Err(detail) => errors.set_detail("achievements", detail),
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }

    /// Crea el gato para `owner_id`. Si el JSON traía `achievements`, cada
    /// logro se busca o se crea y se enlaza al gato nuevo.
    pub async fn create(
        &self,
        ctx: &Persistence,
        validated: ValidatedCat,
        owner_id: i64,
    ) -> Result<CatRecord, SerializerError> {
        let name = required(validated.name, "name")?;
        let color = required(validated.color, "color")?;
        let birth_year = required(validated.birth_year, "birth_year")?;

        let image = match validated.image.flatten() {
            Some(file) => Some(ctx.media.save(CAT_IMAGES_DIR, &file).await?),
            None => None,
        };

        let new_cat = NewCat {
            name,
            color,
            birth_year,
            owner_id,
            image: image.clone(),
        };

        match ctx
            .cats
            .create(new_cat, achievement_names(validated.achievements))
            .await
        {
            Ok(record) => Ok(record),
            Err(e) => {
                discard_image(ctx, image.as_deref()).await;
                Err(e.into())
            }
        }
    }

    /// Aplica sobre `instance` solo los campos presentes. Si venía
    /// `achievements`, el conjunto de logros pasa a ser exactamente esa lista.
    pub async fn update(
        &self,
        ctx: &Persistence,
        instance: Cat,
        validated: ValidatedCat,
    ) -> Result<CatRecord, SerializerError> {
        let mut cat = instance;
        let previous_image = cat.image.clone();

        cat.name = validated.name.unwrap_or(cat.name);
        cat.color = validated.color.unwrap_or(cat.color);
        cat.birth_year = validated.birth_year.unwrap_or(cat.birth_year);

        let mut saved_image = None;
        if let Some(image) = validated.image {
            cat.image = match image {
                Some(file) => {
                    let path = ctx.media.save(CAT_IMAGES_DIR, &file).await?;
                    saved_image = Some(path.clone());
                    Some(path)
                }
                None => None,
            };
        }

        match ctx
            .cats
            .update(cat, achievement_names(validated.achievements))
            .await
        {
            Ok(record) => {
                if previous_image.is_some() && previous_image != record.cat.image {
                    discard_image(ctx, previous_image.as_deref()).await;
                }
                Ok(record)
            }
            Err(e) => {
                discard_image(ctx, saved_image.as_deref()).await;
                Err(e.into())
            }
        }
    }
}

async fn discard_image(ctx: &Persistence, path: Option<&str>) {
    let Some(path) = path else {
        return;
    };
    if let Err(e) = ctx.media.delete(path).await {
        tracing::warn!("No se pudo borrar la imagen {}: {:?}", path, e);
    }
}
