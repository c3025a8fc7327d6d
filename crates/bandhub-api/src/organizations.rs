use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use bandhub_db::models::OrganizationProfile;
use bandhub_types::api::{
    Claims, CreateOrganizationRequest, CreateOrganizationResponse, MembershipSummary,
    Organization, UpdateOrganizationRequest,
};

use crate::access::{admin_of, member_of};
use crate::auth::{AppState, create_token};
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

/// GET /organizations — the caller's active memberships.
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MembershipSummary>>, ApiError> {
    let uid = claims.sub.to_string();
    let (user, memberships) = crate::blocking(&state, move |db| {
        Ok((db.get_user_by_id(&uid)?, db.list_user_memberships(&uid)?))
    })
    .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User no longer exists"))?;

    Ok(Json(
        memberships
            .into_iter()
            .map(|m| convert::membership_summary(m, &user))
            .collect(),
    ))
}

/// POST /organizations — the creator becomes its first Admin and the session
/// moves into the new organization.
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.len() > 120 {
        return Err(ApiError::validation("Organization name must be 1 to 120 characters"));
    }

    let org_id = Uuid::new_v4();
    let oid = org_id.to_string();
    let uid = claims.sub.to_string();
    let (row, membership) = crate::blocking(&state, move |db| {
        db.create_organization(&oid, &name, req.description.as_deref(), &uid, &Uuid::new_v4().to_string())?;
        let row = db.get_organization(&oid)?;
        let membership = db.get_active_membership(&uid, &oid)?;
        Ok((row, membership))
    })
    .await?;

    let row = row.ok_or_else(|| anyhow::anyhow!("organization {} vanished after insert", org_id))?;
    let membership =
        membership.ok_or_else(|| anyhow::anyhow!("creator membership missing for {}", org_id))?;

    let token = create_token(&state, claims.sub, &claims.username, Some(&membership))?;
    info!("User {} created organization {} ({})", claims.username, row.name, org_id);

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization: convert::organization(row),
            token,
        }),
    ))
}

pub async fn get_organization(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Organization>, ApiError> {
    member_of(&state, claims.sub, org_id).await?;
    load_organization(&state, org_id).await.map(Json)
}

pub async fn update_organization(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    let name = req.name.map(|n| n.trim().to_string());
    if name.as_deref().is_some_and(|n| n.is_empty() || n.len() > 120) {
        return Err(ApiError::validation("Organization name must be 1 to 120 characters"));
    }

    let profile = OrganizationProfile {
        name,
        description: req.description,
        contact_email: req.contact_email,
        contact_phone: req.contact_phone,
        website: req.website,
        facebook_url: req.facebook_url,
        instagram_url: req.instagram_url,
        twitter_url: req.twitter_url,
        logo_url: req.logo_url,
        primary_color: req.primary_color,
        secondary_color: req.secondary_color,
    };

    let oid = org_id.to_string();
    crate::blocking(&state, move |db| db.update_organization(&oid, &profile)).await?;
    info!("User {} updated organization {}", claims.username, org_id);

    load_organization(&state, org_id).await.map(Json)
}

/// DELETE /organizations/{org_id} — removes the organization with its
/// memberships, sections, events and RSVPs.
pub async fn delete_organization(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    let oid = org_id.to_string();
    if !crate::blocking(&state, move |db| db.delete_organization(&oid)).await? {
        return Err(ApiError::not_found("Organization not found"));
    }

    info!("User {} deleted organization {}", claims.username, org_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn load_organization(state: &AppState, org_id: Uuid) -> Result<Organization, ApiError> {
    let oid = org_id.to_string();
    crate::blocking(state, move |db| db.get_organization(&oid))
        .await?
        .map(convert::organization)
        .ok_or_else(|| ApiError::not_found("Organization not found"))
}
