use crate::error::AppError;
use crate::state::AppState;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject - the user_id
    pub exp: i64,    // expiration time (unix timestamp)
}

/// Validate JWT signature against the shared signing secret (HS256) and
/// extract claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Verify a token and parse its subject as the authenticated user id.
pub fn authenticate(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let claims = verify_token(token, secret)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)
}

/// Middleware to extract the bearer JWT and add user_id to request extensions
pub async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let user_id = authenticate(token, &state.config.jwt_secret)?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
