use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use bandhub_db::Database;
use bandhub_db::models::{MembershipRow, NewUser};
use bandhub_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SessionResponse,
    SwitchOrganizationRequest,
};

use crate::convert;
use crate::error::ApiError;
use crate::extract::ApiJson;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::validation("Username must be 3 to 32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }

    // Early exit before hashing; the insert still guards the name
    let username = req.username.clone();
    if crate::blocking(&state, move |db| db.get_user_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password = req.password.clone();
    let password_hash = crate::offload(move || hash_password(&password)).await?;
    let user_id = Uuid::new_v4();

    let uid = user_id.to_string();
    let username = req.username.clone();
    let created = crate::blocking(&state, move |db| {
        db.create_user(&NewUser {
            id: &uid,
            username: &username,
            password_hash: &password_hash,
            email: req.email.as_deref(),
            first_name: req.first_name.as_deref(),
            last_name: req.last_name.as_deref(),
        })
    })
    .await?;
    if !created {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let token = create_token(&state, user_id, &req.username, None)?;
    info!("Registered user {} ({})", req.username, user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = crate::blocking(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let stored = user.password.clone();
    crate::offload(move || verify_password(&req.password, &stored)).await?;

    let uid = user.id.clone();
    let context = crate::blocking(&state, move |db| db.resume_session(&uid)).await?;

    let user_id = convert::id(&user.id, "user");
    let token = create_token(&state, user_id, &user.username, context.as_ref())?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
        organization_id: context.as_ref().map(|m| convert::id(&m.organization_id, "organization")),
        role: context.as_ref().map(|m| convert::role(&m.role)),
    }))
}

/// POST /auth/switch-organization — moves the caller's session into another
/// organization they are an active member of and returns a token for it.
pub async fn switch_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SwitchOrganizationRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let oid = req.organization_id.to_string();
    let make_primary = req.make_primary;

    let membership = crate::blocking(&state, move |db| {
        db.switch_organization(&uid, &oid, make_primary)
    })
    .await?
    .ok_or_else(|| {
        warn!(
            "User {} denied switch into organization {}",
            claims.username, req.organization_id
        );
        ApiError::forbidden("You are not an active member of this organization")
    })?;

    let token = create_token(&state, claims.sub, &claims.username, Some(&membership))?;
    let role = convert::role(&membership.role);

    info!(
        "User {} switched to organization {} as {}",
        claims.username, membership.organization_name, role
    );

    Ok(Json(SessionResponse {
        token,
        organization_id: req.organization_id,
        organization_name: membership.organization_name,
        role,
    }))
}

/// Mints a session token. The organization claims come from `context`, the
/// membership row, which is the only source of a user's role.
pub fn create_token(
    state: &AppStateInner,
    user_id: Uuid,
    username: &str,
    context: Option<&MembershipRow>,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role: context.map(|m| convert::role(&m.role)),
        organization_id: context.map(|m| convert::id(&m.organization_id, "organization")),
        organization_name: context.map(|m| m.organization_name.clone()),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    // Argon2id with a random salt
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppStateInner {
        AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            token_ttl: chrono::Duration::hours(1),
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn token_carries_membership_context() {
        let state = state();
        let membership = MembershipRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            organization_id: Uuid::new_v4().to_string(),
            organization_name: "Brass Band".into(),
            role: "Admin".into(),
            section_id: None,
            section_name: None,
            is_active: true,
            joined_at: "2026-01-01 00:00:00".into(),
        };
        let user_id = Uuid::new_v4();

        let token = create_token(&state, user_id, "alice", Some(&membership)).unwrap();
        let claims = decode_token("test-secret", &token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Some(bandhub_types::models::Role::Admin));
        assert_eq!(claims.organization_id.unwrap().to_string(), membership.organization_id);
        assert_eq!(claims.organization_name.as_deref(), Some("Brass Band"));
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn token_without_context_has_no_role() {
        let state = state();
        let token = create_token(&state, Uuid::new_v4(), "alice", None).unwrap();
        let claims = decode_token("test-secret", &token).unwrap();
        assert!(claims.role.is_none());
        assert!(claims.organization_id.is_none());
    }
}
