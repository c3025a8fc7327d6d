use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use bandhub_db::models::MembershipChange;
use bandhub_types::api::{AddMemberRequest, Claims, MemberResponse, UpdateMemberRequest};
use bandhub_types::models::Role;

use crate::access::{admin_of, member_of};
use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

pub async fn list_members(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    member_of(&state, claims.sub, org_id).await?;

    let oid = org_id.to_string();
    let rows = crate::blocking(&state, move |db| db.list_organization_members(&oid)).await?;
    Ok(Json(rows.into_iter().map(convert::member).collect()))
}

/// POST /organizations/{org_id}/members — adds an existing user by username.
pub async fn add_member(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    let username = req.username.trim().to_string();
    let user = crate::blocking(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(|| ApiError::not_found("No user with that username"))?;

    if let Some(section_id) = req.section_id {
        ensure_section_in_organization(&state, section_id, org_id).await?;
    }

    let role = req.role.unwrap_or(Role::Member);
    let oid = org_id.to_string();
    let uid = user.id.clone();
    let section = req.section_id.map(|s| s.to_string());
    let added = crate::blocking(&state, move |db| {
        db.add_membership(&Uuid::new_v4().to_string(), &uid, &oid, role.as_str(), section.as_deref())
    })
    .await?;
    if !added {
        return Err(ApiError::conflict("User is already a member of this organization"));
    }

    info!("User {} added {} to organization {} as {}", claims.username, user.username, org_id, role);

    let member = load_member(&state, org_id, convert::id(&user.id, "user")).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// PATCH /organizations/{org_id}/members/{user_id} — role and section changes.
pub async fn update_member(
    State(state): State<AppState>,
    ApiPath((org_id, user_id)): ApiPath<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    if let Some(Some(section_id)) = req.section_id {
        ensure_section_in_organization(&state, section_id, org_id).await?;
    }

    let uid = user_id.to_string();
    let oid = org_id.to_string();
    let role = req.role;
    let section = req.section_id.map(|s| s.map(|id| id.to_string()));
    let change = crate::blocking(&state, move |db| {
        db.update_membership(
            &uid,
            &oid,
            role.as_ref().map(Role::as_str),
            section.as_ref().map(|s| s.as_deref()),
        )
    })
    .await?;
    check_change(change)?;

    info!("User {} updated membership of {} in organization {}", claims.username, user_id, org_id);
    load_member(&state, org_id, user_id).await.map(Json)
}

/// DELETE /organizations/{org_id}/members/{user_id} — deactivates the
/// membership. Admins may remove anyone; members may remove themselves.
pub async fn remove_member(
    State(state): State<AppState>,
    ApiPath((org_id, user_id)): ApiPath<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    if user_id == claims.sub {
        member_of(&state, claims.sub, org_id).await?;
    } else {
        admin_of(&state, claims.sub, org_id).await?;
    }

    let uid = user_id.to_string();
    let oid = org_id.to_string();
    let change = crate::blocking(&state, move |db| db.deactivate_membership(&uid, &oid)).await?;
    check_change(change)?;

    info!("User {} removed {} from organization {}", claims.username, user_id, org_id);
    Ok(StatusCode::NO_CONTENT)
}

fn check_change(change: MembershipChange) -> Result<(), ApiError> {
    match change {
        MembershipChange::Updated => Ok(()),
        MembershipChange::NotFound => Err(ApiError::not_found("Member not found")),
        MembershipChange::LastAdmin => {
            Err(ApiError::conflict("An organization must keep at least one Admin"))
        }
    }
}

async fn ensure_section_in_organization(
    state: &AppState,
    section_id: Uuid,
    org_id: Uuid,
) -> Result<(), ApiError> {
    let sid = section_id.to_string();
    let section = crate::blocking(state, move |db| db.get_section(&sid)).await?;
    match section {
        Some(s) if s.organization_id == org_id.to_string() => Ok(()),
        _ => Err(ApiError::validation("Section does not belong to this organization")),
    }
}

async fn load_member(state: &AppState, org_id: Uuid, user_id: Uuid) -> Result<MemberResponse, ApiError> {
    let oid = org_id.to_string();
    let uid = user_id.to_string();
    crate::blocking(state, move |db| db.list_organization_members(&oid))
        .await?
        .into_iter()
        .find(|m| m.user_id == uid)
        .map(convert::member)
        .ok_or_else(|| ApiError::not_found("Member not found"))
}
