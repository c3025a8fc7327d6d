//! Database row types. These map directly to SQLite rows and stay independent
//! of the API models in bandhub-types; ids and timestamps are kept as text.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub current_organization_id: Option<String>,
    pub primary_organization_id: Option<String>,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub twitter_url: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub created_at: String,
}

/// Profile update; `None` leaves a column unchanged.
#[derive(Debug, Default)]
pub struct OrganizationProfile {
    pub name: Option<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub twitter_url: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
}

/// Outcome of a membership write that has to leave the organization with at
/// least one active Admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Updated,
    NotFound,
    LastAdmin,
}

/// A membership row joined with its organization and section names.
#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub role: String,
    pub section_id: Option<String>,
    pub section_name: Option<String>,
    pub is_active: bool,
    pub joined_at: String,
}

/// An active member of an organization as listed to other members.
#[derive(Debug, Clone)]
pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub section_id: Option<String>,
    pub section_name: Option<String>,
    pub joined_at: String,
}

#[derive(Debug, Clone)]
pub struct SectionRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: String,
    pub organization_id: String,
    pub parent_event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: String,
    pub end_at: Option<String>,
    pub recurrence: Option<String>,
    pub recurrence_interval: Option<i64>,
    pub recurrence_until: Option<String>,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    /// Raw RSVP status of the viewing user, if they responded.
    pub viewer_rsvp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: String,
    pub organization_id: String,
    pub parent_event_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: String,
    pub end_at: Option<String>,
    pub recurrence: Option<String>,
    pub recurrence_interval: Option<i64>,
    pub recurrence_until: Option<String>,
    pub created_by: String,
}

/// Event edit; `None` leaves a column unchanged.
#[derive(Debug, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RsvpRow {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub section_name: Option<String>,
    pub status: String,
    pub updated_at: String,
}
