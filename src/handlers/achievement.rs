use axum::extract::{rejection::JsonRejection, Json, Path, State};
use serde_json::Value;

use crate::{
    errors::ApiError,
    routes::AppState,
    serializers::{AchievementResponse, ValidationErrors},
};

// GET /api/achievements (público)
pub async fn list_achievements_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AchievementResponse>>, ApiError> {
    let achievements = state.persistence.cats.list_achievements().await?;
    Ok(Json(
        achievements
            .iter()
            .map(|a| state.achievement_serializer.to_representation(a))
            .collect(),
    ))
}

// GET /api/achievements/:id (público)
pub async fn get_achievement_handler(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AchievementResponse>, ApiError> {
    let achievement = state.persistence.cats.get_achievement(id).await?;
    Ok(Json(state.achievement_serializer.to_representation(&achievement)))
}

// POST /api/achievements - devuelve el logro existente si el nombre ya está
pub async fn create_achievement_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AchievementResponse>, ApiError> {
    let Json(body) = body?;
    let data = state
        .achievement_serializer
        .to_internal_value(&body)
        .map_err(ValidationErrors::from_item)?;

    let achievement = state
        .persistence
        .cats
        .get_or_create_achievement(&data.name)
        .await?;

    Ok(Json(state.achievement_serializer.to_representation(&achievement)))
}
