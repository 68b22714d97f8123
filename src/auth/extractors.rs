use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};

use super::claims::Claims;
use crate::state::AppState;

/// Verified caller identity taken from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".into()))?;

        let cfg = &state.config.jwt;
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&cfg.audience));
        validation.set_issuer(std::slice::from_ref(&cfg.issuer));
        let decoding = DecodingKey::from_secret(cfg.secret.as_bytes());

        let data = decode::<Claims>(token, &decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            (StatusCode::UNAUTHORIZED, "invalid or expired token".into())
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err((StatusCode::UNAUTHORIZED, "token has no subject".into()));
        }

        Ok(AuthUser {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Signs a token the extractor accepts for `state`.
#[cfg(test)]
pub(crate) fn bearer_for(state: &AppState, sub: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let cfg = &state.config.jwt;
    let now = time::OffsetDateTime::now_utc().unix_timestamp() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{sub}@example.com")),
        iat: now,
        exp: now + 3600,
        iss: cfg.issuer.clone(),
        aud: cfg.audience.clone(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}
