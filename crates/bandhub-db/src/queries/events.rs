use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{EventRow, EventUpdate, NewEvent};

// ?1 is always the viewing user, for the RSVP join
const EVENT_SELECT: &str = "
    SELECT e.id, e.organization_id, e.parent_event_id, e.title, e.description, e.location,
           e.category, e.start_at, e.end_at, e.recurrence, e.recurrence_interval,
           e.recurrence_until, e.is_cancelled, e.cancellation_reason, e.cancelled_at,
           e.created_by, e.created_at, r.status
    FROM events e
    LEFT JOIN rsvps r ON r.event_id = e.id AND r.user_id = ?1";

impl Database {
    /// Inserts a batch of events atomically. A series root must precede its
    /// occurrences in `events`.
    pub fn insert_events(&self, events: &[NewEvent]) -> Result<()> {
        self.with_tx(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO events (id, organization_id, parent_event_id, title, description,
                                     location, category, start_at, end_at, recurrence,
                                     recurrence_interval, recurrence_until, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for e in events {
                stmt.execute(rusqlite::params![
                    e.id,
                    e.organization_id,
                    e.parent_event_id,
                    e.title,
                    e.description,
                    e.location,
                    e.category,
                    e.start_at,
                    e.end_at,
                    e.recurrence,
                    e.recurrence_interval,
                    e.recurrence_until,
                    e.created_by,
                ])?;
            }
            Ok(())
        })
    }

    pub fn get_event(&self, id: &str, viewer_id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE e.id = ?2", EVENT_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row([viewer_id, id], map_event).optional()
        })
    }

    /// Events of an organization ordered by start time. `from` is an inclusive
    /// lower bound on `start_at` in the canonical timestamp format.
    pub fn list_events(
        &self,
        organization_id: &str,
        viewer_id: &str,
        include_cancelled: bool,
        from: Option<&str>,
    ) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE e.organization_id = ?2
                   AND (?3 OR e.is_cancelled = 0)
                   AND (?4 IS NULL OR e.start_at >= ?4)
                 ORDER BY e.start_at, e.title",
                EVENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![viewer_id, organization_id, include_cancelled, from],
                    map_event,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_event(&self, id: &str, update: &EventUpdate) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    location = COALESCE(?4, location),
                    category = COALESCE(?5, category),
                    start_at = COALESCE(?6, start_at),
                    end_at = COALESCE(?7, end_at)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.title,
                    update.description,
                    update.location,
                    update.category,
                    update.start_at,
                    update.end_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Cancels one event, or with `whole_series` also every event of its
    /// series that starts at or after `now`. Returns the number of events
    /// newly cancelled.
    pub fn cancel_event(
        &self,
        id: &str,
        reason: Option<&str>,
        whole_series: bool,
        now: &str,
    ) -> Result<usize> {
        self.with_tx(|tx| {
            let root: Option<String> = tx
                .query_row(
                    "SELECT COALESCE(parent_event_id, id) FROM events WHERE id = ?1",
                    [id],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(root) = root else {
                return Ok(0);
            };

            let mut cancelled = tx.execute(
                "UPDATE events SET is_cancelled = 1, cancellation_reason = ?2, cancelled_at = ?3
                 WHERE id = ?1 AND is_cancelled = 0",
                rusqlite::params![id, reason, now],
            )?;

            if whole_series {
                cancelled += tx.execute(
                    "UPDATE events SET is_cancelled = 1, cancellation_reason = ?2, cancelled_at = ?3
                     WHERE (id = ?1 OR parent_event_id = ?1)
                       AND start_at >= ?3
                       AND is_cancelled = 0",
                    rusqlite::params![root, reason, now],
                )?;
            }

            Ok(cancelled)
        })
    }

    /// Deletes an event; occurrences of a series root go with it.
    pub fn delete_event(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        parent_event_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        category: row.get(6)?,
        start_at: row.get(7)?,
        end_at: row.get(8)?,
        recurrence: row.get(9)?,
        recurrence_interval: row.get(10)?,
        recurrence_until: row.get(11)?,
        is_cancelled: row.get(12)?,
        cancellation_reason: row.get(13)?,
        cancelled_at: row.get(14)?,
        created_by: row.get(15)?,
        created_at: row.get(16)?,
        viewer_rsvp: row.get(17)?,
    })
}
