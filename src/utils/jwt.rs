use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    errors::ApiError,
    models::user::{Claims, User},
    routes::AppState,
};

const TOKEN_TTL_HOURS: i64 = 24;

pub fn issue_token(secret: &str, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now + Duration::hours(TOKEN_TTL_HOURS);

    let claims = Claims {
        sub: user.email.clone(),
        exp: expiration.timestamp() as usize,
        iat: now.timestamp() as usize,
        user_id: user.id,
        role: user.role.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

// Se ejecuta antes de los handlers que escriben. Deja los Claims en las
// extensiones para que el handler sepa quién es el usuario.
pub async fn auth_middleware(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(auth) = auth.ok_or(ApiError::Unauthorized)?;

    match decode_token(&state.jwt_secret, auth.token()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            // Token falso, expirado o manipulado
            tracing::debug!("Token rechazado: {:?}", e);
            Err(ApiError::Unauthorized)
        }
    }
}
