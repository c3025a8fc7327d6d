use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use bandhub_db::format_timestamp;
use bandhub_db::models::{EventRow, EventUpdate, MembershipRow, NewEvent};
use bandhub_types::api::{
    CancelEventRequest, Claims, CreateEventRequest, EventDetailResponse, EventResponse,
    RsvpCounts, UpdateEventRequest,
};
use bandhub_types::models::{MAX_OCCURRENCES, RsvpStatus};

use crate::access::{current_admin_context, current_context};
use crate::auth::AppState;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub include_cancelled: bool,
    /// Only events starting at or after this instant.
    pub from: Option<DateTime<Utc>>,
}

/// GET /events — events of the caller's current organization.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let ctx = current_context(&state, &claims).await?;

    let uid = claims.sub.to_string();
    let from = query.from.map(format_timestamp);
    let rows = crate::blocking(&state, move |db| {
        db.list_events(&ctx.organization_id, &uid, query.include_cancelled, from.as_deref())
    })
    .await?;

    Ok(Json(rows.into_iter().map(convert::event).collect()))
}

/// POST /events — creates an event, or a whole series when a recurrence is
/// given. The first element of the response is the series root.
pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = current_admin_context(&state, &claims).await?;

    let title = req.title.trim().to_string();
    if title.is_empty() || title.len() > 200 {
        return Err(ApiError::validation("Title must be 1 to 200 characters"));
    }
    if req.end_at.is_some_and(|end| end < req.start_at) {
        return Err(ApiError::validation("Event cannot end before it starts"));
    }

    let starts = match req.recurrence {
        None => vec![req.start_at],
        Some(recurrence) => {
            let until = req
                .recurrence_until
                .ok_or_else(|| ApiError::validation("recurrence_until is required for recurring events"))?;
            if until < req.start_at {
                return Err(ApiError::validation("recurrence_until is before the first event"));
            }
            let interval = req.recurrence_interval.unwrap_or(1);
            if interval == 0 {
                return Err(ApiError::validation("recurrence_interval must be at least 1"));
            }
            recurrence.occurrences(req.start_at, interval, until, MAX_OCCURRENCES)
        }
    };
    let duration = req.end_at.map(|end| end - req.start_at);

    let root_id = Uuid::new_v4().to_string();
    let events: Vec<NewEvent> = starts
        .iter()
        .enumerate()
        .map(|(i, start)| {
            let is_root = i == 0;
            NewEvent {
                id: if is_root { root_id.clone() } else { Uuid::new_v4().to_string() },
                organization_id: ctx.organization_id.clone(),
                parent_event_id: (!is_root).then(|| root_id.clone()),
                title: title.clone(),
                description: req.description.clone(),
                location: req.location.clone(),
                category: req.category.clone(),
                start_at: format_timestamp(*start),
                end_at: duration.map(|d| format_timestamp(*start + d)),
                recurrence: req.recurrence.filter(|_| is_root).map(|r| r.as_str().to_string()),
                recurrence_interval: req
                    .recurrence
                    .filter(|_| is_root)
                    .map(|_| i64::from(req.recurrence_interval.unwrap_or(1))),
                recurrence_until: req
                    .recurrence_until
                    .filter(|_| is_root && req.recurrence.is_some())
                    .map(format_timestamp),
                created_by: claims.sub.to_string(),
            }
        })
        .collect();

    let count = events.len();
    let uid = claims.sub.to_string();
    let rows = crate::blocking(&state, move |db| {
        db.insert_events(&events)?;
        let mut rows = Vec::with_capacity(events.len());
        for e in &events {
            if let Some(row) = db.get_event(&e.id, &uid)? {
                rows.push(row);
            }
        }
        Ok(rows)
    })
    .await?;

    info!(
        "User {} created {} event(s) '{}' in organization {}",
        claims.username, count, title, ctx.organization_name
    );

    let created: Vec<EventResponse> = rows.into_iter().map(convert::event).collect();
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /events/{event_id} — the event with RSVP totals.
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<EventDetailResponse>, ApiError> {
    let ctx = current_context(&state, &claims).await?;
    let row = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;

    let eid = row.id.clone();
    let rsvps = crate::blocking(&state, move |db| db.list_event_rsvps(&eid)).await?;
    let rsvp_counts = RsvpCounts::tally(rsvps.iter().map(|r| RsvpStatus::normalize(&r.status)));

    Ok(Json(EventDetailResponse {
        event: convert::event(row),
        rsvp_counts,
    }))
}

/// PATCH /events/{event_id} — edits a single event (one occurrence of a series).
pub async fn update_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let ctx = current_admin_context(&state, &claims).await?;
    let row = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;

    let title = req.title.map(|t| t.trim().to_string());
    if title.as_deref().is_some_and(|t| t.is_empty() || t.len() > 200) {
        return Err(ApiError::validation("Title must be 1 to 200 characters"));
    }

    let start = req.start_at.unwrap_or_else(|| convert::timestamp(&row.start_at));
    let end = req
        .end_at
        .or_else(|| row.end_at.as_deref().map(convert::timestamp));
    if end.is_some_and(|end| end < start) {
        return Err(ApiError::validation("Event cannot end before it starts"));
    }

    let update = EventUpdate {
        title,
        description: req.description,
        location: req.location,
        category: req.category,
        start_at: req.start_at.map(format_timestamp),
        end_at: req.end_at.map(format_timestamp),
    };

    let eid = row.id.clone();
    let uid = claims.sub.to_string();
    let updated = crate::blocking(&state, move |db| {
        db.update_event(&eid, &update)?;
        db.get_event(&eid, &uid)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Event not found"))?;

    info!("User {} updated event {}", claims.username, event_id);
    Ok(Json(convert::event(updated)))
}

/// POST /events/{event_id}/cancel — the body is optional.
pub async fn cancel_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    body: Option<ApiJson<CancelEventRequest>>,
) -> Result<Json<EventResponse>, ApiError> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let ctx = current_admin_context(&state, &claims).await?;
    let row = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;

    let eid = row.id.clone();
    let uid = claims.sub.to_string();
    let now = format_timestamp(Utc::now());
    let (cancelled, updated) = crate::blocking(&state, move |db| {
        let n = db.cancel_event(&eid, req.reason.as_deref(), req.whole_series, &now)?;
        Ok((n, db.get_event(&eid, &uid)?))
    })
    .await?;
    let updated = updated.ok_or_else(|| ApiError::not_found("Event not found"))?;

    info!(
        "User {} cancelled {} event(s) starting from {}",
        claims.username, cancelled, event_id
    );
    Ok(Json(convert::event(updated)))
}

/// DELETE /events/{event_id} — deleting a series root removes its occurrences.
pub async fn delete_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let ctx = current_admin_context(&state, &claims).await?;
    let row = load_scoped_event(&state, event_id, &ctx, claims.sub).await?;

    let eid = row.id;
    crate::blocking(&state, move |db| db.delete_event(&eid)).await?;

    info!("User {} deleted event {}", claims.username, event_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Loads an event of the context organization. Events of other
/// organizations are reported as missing.
pub(crate) async fn load_scoped_event(
    state: &AppState,
    event_id: Uuid,
    ctx: &MembershipRow,
    viewer: Uuid,
) -> Result<EventRow, ApiError> {
    let eid = event_id.to_string();
    let vid = viewer.to_string();
    crate::blocking(state, move |db| db.get_event(&eid, &vid))
        .await?
        .filter(|e| e.organization_id == ctx.organization_id)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}
