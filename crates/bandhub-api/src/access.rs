//! Membership checks shared by the organization-scoped handlers.
//!
//! Token claims only name the context; the role used for authorization is
//! always re-read from the active membership row, so a deactivation or
//! demotion applies to tokens that were minted earlier.

use uuid::Uuid;

use bandhub_db::models::MembershipRow;
use bandhub_types::api::Claims;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;

/// Active membership of `user_id` in `organization_id`, or access-denied.
pub(crate) async fn member_of(
    state: &AppState,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<MembershipRow, ApiError> {
    let uid = user_id.to_string();
    let oid = organization_id.to_string();
    crate::blocking(state, move |db| db.get_active_membership(&uid, &oid))
        .await?
        .ok_or_else(|| ApiError::forbidden("You are not an active member of this organization"))
}

/// Like [`member_of`], but the membership must carry the Admin role.
pub(crate) async fn admin_of(
    state: &AppState,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<MembershipRow, ApiError> {
    ensure_admin(member_of(state, user_id, organization_id).await?)
}

/// Membership for the organization named in the caller's token.
pub(crate) async fn current_context(
    state: &AppState,
    claims: &Claims,
) -> Result<MembershipRow, ApiError> {
    let organization_id = claims
        .organization_id
        .ok_or_else(|| ApiError::forbidden("No organization selected"))?;
    member_of(state, claims.sub, organization_id).await
}

/// Current context, requiring the Admin role.
pub(crate) async fn current_admin_context(
    state: &AppState,
    claims: &Claims,
) -> Result<MembershipRow, ApiError> {
    ensure_admin(current_context(state, claims).await?)
}

fn ensure_admin(membership: MembershipRow) -> Result<MembershipRow, ApiError> {
    if !convert::role(&membership.role).is_admin() {
        return Err(ApiError::forbidden("Admin role required"));
    }
    Ok(membership)
}
