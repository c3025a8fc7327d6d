use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use bandhub_types::api::{Claims, CreateSectionRequest, SectionResponse};

use crate::access::{admin_of, member_of};
use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

pub async fn list_sections(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<SectionResponse>>, ApiError> {
    member_of(&state, claims.sub, org_id).await?;

    let oid = org_id.to_string();
    let rows = crate::blocking(&state, move |db| db.list_sections(&oid)).await?;
    Ok(Json(rows.into_iter().map(convert::section).collect()))
}

pub async fn create_section(
    State(state): State<AppState>,
    ApiPath(org_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    let name = req.name.trim().to_string();
    if name.is_empty() || name.len() > 64 {
        return Err(ApiError::validation("Section name must be 1 to 64 characters"));
    }

    let section_id = Uuid::new_v4();
    let sid = section_id.to_string();
    let oid = org_id.to_string();
    let created = crate::blocking(&state, move |db| {
        // Names compare case-insensitively within an organization
        if !db.create_section(&sid, &oid, &name)? {
            return Ok(None);
        }
        db.get_section(&sid)
    })
    .await?
    .ok_or_else(|| ApiError::conflict("A section with that name already exists"))?;

    info!("User {} created section {} in organization {}", claims.username, created.name, org_id);
    Ok((StatusCode::CREATED, Json(convert::section(created))))
}

pub async fn delete_section(
    State(state): State<AppState>,
    ApiPath((org_id, section_id)): ApiPath<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    admin_of(&state, claims.sub, org_id).await?;

    let oid = org_id.to_string();
    let sid = section_id.to_string();
    if !crate::blocking(&state, move |db| db.delete_section(&oid, &sid)).await? {
        return Err(ApiError::not_found("Section not found"));
    }

    info!("User {} deleted section {} from organization {}", claims.username, section_id, org_id);
    Ok(StatusCode::NO_CONTENT)
}
