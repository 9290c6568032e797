use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use mime::Mime;

use super::cat::fetch_owned_cat;
use crate::{
    errors::ApiError,
    fields::{ContentFile, FieldError},
    models::user::Claims,
    routes::AppState,
    serializers::{CatResponse, ValidatedCat, ValidationErrors},
};

fn image_error(error: FieldError) -> ApiError {
    ValidationErrors::single("image", error).into()
}

// PUT /api/cats/:id/image - sube la foto como multipart (campo "image")
pub async fn upload_cat_image_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<CatResponse>, ApiError> {
    let record = fetch_owned_cat(&state, id, &claims).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unknown.jpg").to_string();
        let content_type: Option<Mime> = field
            .content_type()
            .and_then(|ct_str| ct_str.parse::<Mime>().ok());

        // Solo imágenes comunes
        if let Some(ct) = content_type {
            let allowed = matches!(
                (ct.type_().as_str(), ct.subtype().as_str()),
                ("image", "jpeg") | ("image", "png") | ("image", "webp") | ("image", "gif")
            );
            if !allowed {
                return Err(image_error(FieldError::InvalidImage(
                    "Only jpg, jpeg, png, webp and gif images are allowed.".to_string(),
                )));
            }
        }

        let data = field
            .bytes()
            .await
            .map_err(|_| ApiError::BadRequest("Could not read the uploaded file.".to_string()))?;

        let file = state
            .serializer
            .image_field()
            .validate_file(ContentFile::new(file_name, data.to_vec()))
            .map_err(image_error)?;

        let validated = ValidatedCat {
            image: Some(Some(file)),
            ..ValidatedCat::default()
        };
        let updated = state
            .serializer
            .update(&state.persistence, record.cat, validated)
            .await?;

        tracing::info!("Imagen del gato {} actualizada", id);

        return Ok(Json(state.serializer.to_representation(&updated)));
    }

    Err(image_error(FieldError::Required))
}
