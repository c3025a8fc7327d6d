use axum::{Extension, Json, extract::State};

use bandhub_types::api::{Claims, UpdateProfileRequest, UserProfile};

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::ApiJson;

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserProfile>, ApiError> {
    load_profile(&state, &claims).await.map(Json)
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let uid = claims.sub.to_string();
    let updated = crate::blocking(&state, move |db| {
        db.update_user_profile(
            &uid,
            req.email.as_deref(),
            req.first_name.as_deref(),
            req.last_name.as_deref(),
        )
    })
    .await?;
    if !updated {
        return Err(ApiError::not_found("User no longer exists"));
    }

    load_profile(&state, &claims).await.map(Json)
}

async fn load_profile(state: &AppState, claims: &Claims) -> Result<UserProfile, ApiError> {
    let uid = claims.sub.to_string();
    let (user, memberships) = crate::blocking(state, move |db| {
        let user = db.get_user_by_id(&uid)?;
        let memberships = db.list_user_memberships(&uid)?;
        Ok((user, memberships))
    })
    .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User no longer exists"))?;

    let memberships = memberships
        .into_iter()
        .map(|m| convert::membership_summary(m, &user))
        .collect();

    Ok(UserProfile {
        id: claims.sub,
        current_organization_id: user
            .current_organization_id
            .as_deref()
            .map(|id| convert::id(id, "organization")),
        primary_organization_id: user
            .primary_organization_id
            .as_deref()
            .map(|id| convert::id(id, "organization")),
        created_at: convert::timestamp(&user.created_at),
        username: user.username,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        memberships,
    })
}
