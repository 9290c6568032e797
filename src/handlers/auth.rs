use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::{
    errors::ApiError,
    models::user::{AuthResponse, LoginPayload, NewUser, RegisterPayload, ROLE_ADMIN, ROLE_EDITOR},
    repositories::RepositoryError,
    routes::AppState,
    utils::{
        jwt::{decode_token, issue_token},
        security::{hash_password, verify_password},
    },
};

// POST /api/auth/register (solo admins; el primer usuario se permite sin token y queda como admin)
pub async fn register_handler(
    State(state): State<AppState>,
    // Token opcional: si ya existe un usuario, exigimos que sea admin
    maybe_auth: Option<TypedHeader<Authorization<Bearer>>>,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let user_count = state.users.count_users().await?;

    if user_count > 0 {
        let TypedHeader(auth_header) = maybe_auth.ok_or_else(|| {
            ApiError::Forbidden("Only an admin can create users.".to_string())
        })?;

        let claims =
            decode_token(&state.jwt_secret, auth_header.token()).map_err(|_| ApiError::Unauthorized)?;
        if !claims.is_admin() {
            return Err(ApiError::Forbidden("Only an admin can create users.".to_string()));
        }
    }

    // Nunca guardamos la contraseña en plano
    let password_hash = hash_password(&payload.password).map_err(|e| {
        ApiError::Internal(format!("Error al hashear la contraseña: {e}"))
    })?;

    // El primer usuario se vuelve admin automáticamente; el resto, editor
    let role = if user_count == 0 { ROLE_ADMIN } else { ROLE_EDITOR };

    let user = state
        .users
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            role: role.to_string(),
        })
        .await
        .map_err(|e| match e {
            RepositoryError::ConstraintViolation(_) => {
                ApiError::Conflict("The username or email already exists.".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!("Usuario {} creado con rol {}", user.id, user.role);

    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/auth/login
pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .users
        .find_by_email(&payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = issue_token(&state.jwt_secret, &user)
        .map_err(|e| ApiError::Internal(format!("Error generando token: {e}")))?;

    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
    }))
}
