use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::SectionRow;

impl Database {
    /// Returns `false` if the organization already has a section with that
    /// name, compared case-insensitively.
    pub fn create_section(&self, id: &str, organization_id: &str, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO sections (id, organization_id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
                [id, organization_id, name],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_section(&self, id: &str) -> Result<Option<SectionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, organization_id, name, created_at FROM sections WHERE id = ?1",
                [id],
                map_section,
            )
            .optional()
        })
    }

    pub fn list_sections(&self, organization_id: &str) -> Result<Vec<SectionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, organization_id, name, created_at FROM sections
                 WHERE organization_id = ?1 ORDER BY name",
            )?;
            let rows = stmt
                .query_map([organization_id], map_section)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes a section of the given organization. Memberships that pointed
    /// at it lose their section.
    pub fn delete_section(&self, organization_id: &str, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE user_organizations SET section_id = NULL
                 WHERE section_id = ?1 AND organization_id = ?2",
                [id, organization_id],
            )?;
            let deleted = tx.execute(
                "DELETE FROM sections WHERE id = ?1 AND organization_id = ?2",
                [id, organization_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

fn map_section(row: &Row<'_>) -> rusqlite::Result<SectionRow> {
    Ok(SectionRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}
