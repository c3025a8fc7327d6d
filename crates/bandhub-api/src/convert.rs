//! Row → API model conversion. Stored ids and timestamps are text; a corrupt
//! value is logged and replaced by a default instead of failing the request.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use bandhub_db::models::{
    EventRow, MemberRow, MembershipRow, OrganizationRow, RsvpRow, SectionRow, UserRow,
};
use bandhub_types::api::{
    EventResponse, MemberResponse, MembershipSummary, Organization, RsvpResponse, SectionResponse,
};
use bandhub_types::models::{Recurrence, Role, RsvpStatus};

pub(crate) fn id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn opt_id(raw: Option<&str>, what: &str) -> Option<Uuid> {
    raw.map(|r| id(r, what))
}

/// Parses either RFC 3339 (written by the application) or SQLite's
/// `datetime('now')` format (column defaults).
pub(crate) fn timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn opt_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(timestamp)
}

/// Role stored on a membership row. Unknown values get the least privilege.
pub(crate) fn role(raw: &str) -> Role {
    raw.parse().unwrap_or_else(|e| {
        warn!("Unknown stored role, treating as Member: {}", e);
        Role::Member
    })
}

pub(crate) fn organization(row: OrganizationRow) -> Organization {
    Organization {
        id: id(&row.id, "organization"),
        name: row.name,
        description: row.description,
        contact_email: row.contact_email,
        contact_phone: row.contact_phone,
        website: row.website,
        facebook_url: row.facebook_url,
        instagram_url: row.instagram_url,
        twitter_url: row.twitter_url,
        logo_url: row.logo_url,
        primary_color: row.primary_color,
        secondary_color: row.secondary_color,
        created_at: timestamp(&row.created_at),
    }
}

pub(crate) fn membership_summary(row: MembershipRow, user: &UserRow) -> MembershipSummary {
    let is_current = user.current_organization_id.as_deref() == Some(row.organization_id.as_str());
    let is_primary = user.primary_organization_id.as_deref() == Some(row.organization_id.as_str());
    MembershipSummary {
        organization_id: id(&row.organization_id, "organization"),
        organization_name: row.organization_name,
        role: role(&row.role),
        section_id: opt_id(row.section_id.as_deref(), "section"),
        section_name: row.section_name,
        joined_at: timestamp(&row.joined_at),
        is_current,
        is_primary,
    }
}

pub(crate) fn member(row: MemberRow) -> MemberResponse {
    MemberResponse {
        user_id: id(&row.user_id, "user"),
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        role: role(&row.role),
        section_id: opt_id(row.section_id.as_deref(), "section"),
        section_name: row.section_name,
        joined_at: timestamp(&row.joined_at),
    }
}

pub(crate) fn section(row: SectionRow) -> SectionResponse {
    SectionResponse {
        id: id(&row.id, "section"),
        organization_id: id(&row.organization_id, "organization"),
        name: row.name,
        created_at: timestamp(&row.created_at),
    }
}

pub(crate) fn event(row: EventRow) -> EventResponse {
    let recurrence = row.recurrence.as_deref().and_then(|raw| {
        raw.parse::<Recurrence>()
            .map_err(|e| warn!("Ignoring recurrence on event '{}': {}", row.id, e))
            .ok()
    });

    EventResponse {
        id: id(&row.id, "event"),
        organization_id: id(&row.organization_id, "organization"),
        title: row.title,
        description: row.description,
        location: row.location,
        category: row.category,
        start_at: timestamp(&row.start_at),
        end_at: opt_timestamp(row.end_at.as_deref()),
        recurrence,
        recurrence_interval: row.recurrence_interval.and_then(|i| u32::try_from(i).ok()),
        recurrence_until: opt_timestamp(row.recurrence_until.as_deref()),
        parent_event_id: opt_id(row.parent_event_id.as_deref(), "event"),
        is_cancelled: row.is_cancelled,
        cancellation_reason: row.cancellation_reason,
        cancelled_at: opt_timestamp(row.cancelled_at.as_deref()),
        created_by: opt_id(row.created_by.as_deref(), "user"),
        created_at: timestamp(&row.created_at),
        my_rsvp: row.viewer_rsvp.as_deref().map(RsvpStatus::normalize),
    }
}

pub(crate) fn rsvp(row: RsvpRow) -> RsvpResponse {
    RsvpResponse {
        event_id: id(&row.event_id, "event"),
        user_id: id(&row.user_id, "user"),
        username: row.username,
        section_name: row.section_name,
        status: RsvpStatus::normalize(&row.status),
        updated_at: timestamp(&row.updated_at),
    }
}
