use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use serde_json::Value;

use crate::{
    errors::ApiError,
    models::{cat::CatRecord, user::Claims},
    routes::AppState,
    serializers::CatResponse,
};

// Busca el gato y comprueba que el usuario puede modificarlo
pub(crate) async fn fetch_owned_cat(
    state: &AppState,
    id: i64,
    claims: &Claims,
) -> Result<CatRecord, ApiError> {
    let record = state.persistence.cats.get_by_id(id).await?;

    if !claims.can_modify(record.cat.owner_id) {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    Ok(record)
}

// GET /api/cats (público)
pub async fn list_cats_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatResponse>>, ApiError> {
    let cats = state.persistence.cats.list_all().await?;
    Ok(Json(
        cats.iter()
            .map(|record| state.serializer.to_representation(record))
            .collect(),
    ))
}

// GET /api/cats/:id (público)
pub async fn get_cat_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<CatResponse>, ApiError> {
    let record = state.persistence.cats.get_by_id(id).await?;
    Ok(Json(state.serializer.to_representation(&record)))
}

// POST /api/cats - el dueño es siempre el usuario del token
pub async fn create_cat_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let validated = state.serializer.validate(&body, false)?;
    let record = state
        .serializer
        .create(&state.persistence, validated, claims.user_id)
        .await?;

    tracing::info!("Gato {} creado por el usuario {}", record.cat.id, claims.user_id);

    Ok((
        StatusCode::CREATED,
        Json(state.serializer.to_representation(&record)),
    ))
}

async fn update_cat(
    state: AppState,
    id: i64,
    claims: Claims,
    body: Value,
    partial: bool,
) -> Result<Json<CatResponse>, ApiError> {
    // Validamos antes de tocar nada
    let validated = state.serializer.validate(&body, partial)?;
    let record = fetch_owned_cat(&state, id, &claims).await?;

    let updated = state
        .serializer
        .update(&state.persistence, record.cat, validated)
        .await?;

    tracing::info!("Gato {} actualizado por el usuario {}", id, claims.user_id);

    Ok(Json(state.serializer.to_representation(&updated)))
}

// PUT /api/cats/:id - exige todos los campos obligatorios
pub async fn replace_cat_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CatResponse>, ApiError> {
    let Json(body) = body?;
    update_cat(state, id, claims, body, false).await
}

// PATCH /api/cats/:id - solo los campos enviados
pub async fn patch_cat_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CatResponse>, ApiError> {
    let Json(body) = body?;
    update_cat(state, id, claims, body, true).await
}

// DELETE /api/cats/:id
pub async fn delete_cat_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    fetch_owned_cat(&state, id, &claims).await?;

    let removed = state.persistence.cats.delete_by_id(id).await?;
    if let Some(image) = removed.image.as_deref() {
        if let Err(e) = state.persistence.media.delete(image).await {
            tracing::warn!("No se pudo borrar la imagen {}: {:?}", image, e);
        }
    }

    tracing::info!("Gato {} eliminado por el usuario {}", id, claims.user_id);

    Ok(StatusCode::NO_CONTENT)
}
