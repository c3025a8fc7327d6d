use anyhow::Result;

use crate::Database;
use crate::models::RsvpRow;

impl Database {
    /// Records a user's response to an event, replacing any earlier one.
    /// `status` is stored as given; callers write the canonical spelling.
    pub fn upsert_rsvp(&self, id: &str, user_id: &str, event_id: &str, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rsvps (id, user_id, event_id, status) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, event_id)
                 DO UPDATE SET status = excluded.status, updated_at = datetime('now')",
                [id, user_id, event_id, status],
            )?;
            Ok(())
        })
    }

    /// All responses to an event, with the responder's section in the
    /// event's organization.
    pub fn list_event_rsvps(&self, event_id: &str) -> Result<Vec<RsvpRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.event_id, r.user_id, u.username, s.name, r.status, r.updated_at
                 FROM rsvps r
                 JOIN users u ON u.id = r.user_id
                 JOIN events e ON e.id = r.event_id
                 LEFT JOIN user_organizations m
                    ON m.user_id = r.user_id AND m.organization_id = e.organization_id
                   AND m.is_active = 1
                 LEFT JOIN sections s ON s.id = m.section_id
                 WHERE r.event_id = ?1
                 ORDER BY s.name, u.username",
            )?;
            let rows = stmt
                .query_map([event_id], |row| {
                    Ok(RsvpRow {
                        event_id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        section_name: row.get(3)?,
                        status: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
