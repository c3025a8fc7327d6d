use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Recurrence, Role, RsvpStatus};

// -- JWT Claims --

/// Session token claims. The organization fields name the context the token
/// was minted for; they are absent until the user belongs to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub organization_name: Option<String>,
    pub exp: usize,
}

/// Distinguishes an absent field from an explicit `null` in PATCH bodies.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
    pub organization_id: Option<Uuid>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchOrganizationRequest {
    pub organization_id: Uuid,
    #[serde(default)]
    pub make_primary: bool,
}

/// A freshly minted token together with the context it carries.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: Role,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub current_organization_id: Option<Uuid>,
    pub primary_organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub memberships: Vec<MembershipSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

// -- Organizations --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrganizationResponse {
    pub organization: Organization,
    pub token: String,
}

/// Profile fields; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrganizationRequest {
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

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipSummary {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: Role,
    pub section_id: Option<Uuid>,
    pub section_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub is_current: bool,
    pub is_primary: bool,
}

// -- Members --

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub section_id: Option<Uuid>,
    pub section_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub username: String,
    pub role: Option<Role>,
    pub section_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMemberRequest {
    pub role: Option<Role>,
    /// `null` clears the section, an absent field keeps it.
    #[serde(default, deserialize_with = "double_option")]
    pub section_id: Option<Option<Uuid>>,
}

// -- Sections --

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSectionRequest {
    pub name: String,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub recurrence_interval: Option<u32>,
    pub recurrence_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelEventRequest {
    pub reason: Option<String>,
    /// Also cancel every not-yet-started event of the same series.
    #[serde(default)]
    pub whole_series: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub recurrence_interval: Option<u32>,
    pub recurrence_until: Option<DateTime<Utc>>,
    pub parent_event_id: Option<Uuid>,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// The caller's own response, if any.
    pub my_rsvp: Option<RsvpStatus>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpCounts {
    pub yes: usize,
    pub no: usize,
    pub maybe: usize,
}

impl RsvpCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = RsvpStatus>,
    {
        statuses.into_iter().fold(Self::default(), |mut counts, status| {
            match status {
                RsvpStatus::Yes => counts.yes += 1,
                RsvpStatus::No => counts.no += 1,
                RsvpStatus::Maybe => counts.maybe += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventDetailResponse {
    #[serde(flatten)]
    pub event: EventResponse,
    pub rsvp_counts: RsvpCounts,
}

// -- RSVPs --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRsvpRequest {
    /// Parsed case-insensitively; anything other than yes/no/maybe is rejected.
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RsvpResponse {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub section_name: Option<String>,
    pub status: RsvpStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventRsvpsResponse {
    pub event_id: Uuid,
    pub counts: RsvpCounts,
    pub rsvps: Vec<RsvpResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_member_distinguishes_null_from_absent() {
        let absent: UpdateMemberRequest = serde_json::from_str(r#"{"role":"Admin"}"#).unwrap();
        assert_eq!(absent.role, Some(Role::Admin));
        assert!(absent.section_id.is_none());

        let cleared: UpdateMemberRequest = serde_json::from_str(r#"{"section_id":null}"#).unwrap();
        assert_eq!(cleared.section_id, Some(None));
    }

    #[test]
    fn tally_counts_each_status() {
        let counts = RsvpCounts::tally([
            RsvpStatus::Yes,
            RsvpStatus::Yes,
            RsvpStatus::Maybe,
            RsvpStatus::No,
        ]);
        assert_eq!(counts, RsvpCounts { yes: 2, no: 1, maybe: 1 });
    }

    #[test]
    fn claims_without_context_deserialize() {
        let claims: Claims = serde_json::from_str(
            r#"{"sub":"6f1c1a40-1a0b-4c53-9c0e-2b1d3f7e8a90","username":"alice","exp":1}"#,
        )
        .unwrap();
        assert!(claims.role.is_none());
        assert!(claims.organization_id.is_none());
    }
}
