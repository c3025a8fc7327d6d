use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use bandhub_types::api::{Claims, EventRsvpsResponse, RsvpCounts, RsvpResponse, SetRsvpRequest};
use bandhub_types::models::RsvpStatus;

use crate::access::current_context;
use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::events::load_scoped_event;

/// PUT /events/{event_id}/rsvp — records the caller's response. Input is
/// case-insensitive; the canonical spelling is stored.
pub async fn set_rsvp(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SetRsvpRequest>,
) -> Result<Json<RsvpResponse>, ApiError> {
    let status: RsvpStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::validation("RSVP status must be one of Yes, No, Maybe"))?;

    let ctx = current_context(&state, &claims).await?;
    let event = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;
    if event.is_cancelled {
        return Err(ApiError::conflict("Cannot RSVP to a cancelled event"));
    }

    let uid = claims.sub.to_string();
    let eid = event.id.clone();
    let row = crate::blocking(&state, move |db| {
        db.upsert_rsvp(&Uuid::new_v4().to_string(), &uid, &eid, status.as_str())?;
        Ok(db
            .list_event_rsvps(&eid)?
            .into_iter()
            .find(|r| r.user_id == uid))
    })
    .await?
    .ok_or_else(|| anyhow::anyhow!("RSVP for event {} missing after upsert", event_id))?;

    info!("User {} answered {} for event '{}'", claims.username, status, event.title);
    Ok(Json(convert::rsvp(row)))
}

/// GET /events/{event_id}/rsvps — every response with per-status totals.
pub async fn list_rsvps(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EventRsvpsResponse>, ApiError> {
    let ctx = current_context(&state, &claims).await?;
    let event = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;

    let eid = event.id;
    let rows = crate::blocking(&state, move |db| db.list_event_rsvps(&eid)).await?;
    let rsvps: Vec<RsvpResponse> = rows.into_iter().map(convert::rsvp).collect();
    let counts = RsvpCounts::tally(rsvps.iter().map(|r| r.status));

    Ok(Json(EventRsvpsResponse {
        event_id,
        counts,
        rsvps,
    }))
}
