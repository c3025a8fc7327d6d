use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use super::users::set_current_organization;
use crate::Database;
use crate::models::{OrganizationProfile, OrganizationRow};

impl Database {
    /// Creates an organization, makes `creator_id` its first Admin and moves
    /// the creator's current context there. The primary pointer is only
    /// filled in when the creator has none yet.
    pub fn create_organization(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        creator_id: &str,
        membership_id: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO organizations (id, name, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, description],
            )?;
            tx.execute(
                "INSERT INTO user_organizations (id, user_id, organization_id, role)
                 VALUES (?1, ?2, ?3, 'Admin')",
                rusqlite::params![membership_id, creator_id, id],
            )?;
            set_current_organization(tx, creator_id, Some(id))?;
            tx.execute(
                "UPDATE users SET primary_organization_id = ?2
                 WHERE id = ?1 AND primary_organization_id IS NULL",
                rusqlite::params![creator_id, id],
            )?;
            Ok(())
        })
    }

    pub fn get_organization(&self, id: &str) -> Result<Option<OrganizationRow>> {
        self.with_conn(|conn| query_organization(conn, id))
    }

    pub fn update_organization(&self, id: &str, profile: &OrganizationProfile) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE organizations SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    contact_email = COALESCE(?4, contact_email),
                    contact_phone = COALESCE(?5, contact_phone),
                    website = COALESCE(?6, website),
                    facebook_url = COALESCE(?7, facebook_url),
                    instagram_url = COALESCE(?8, instagram_url),
                    twitter_url = COALESCE(?9, twitter_url),
                    logo_url = COALESCE(?10, logo_url),
                    primary_color = COALESCE(?11, primary_color),
                    secondary_color = COALESCE(?12, secondary_color)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    profile.name,
                    profile.description,
                    profile.contact_email,
                    profile.contact_phone,
                    profile.website,
                    profile.facebook_url,
                    profile.instagram_url,
                    profile.twitter_url,
                    profile.logo_url,
                    profile.primary_color,
                    profile.secondary_color,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes an organization. Foreign keys cascade to memberships, sections,
    /// events and RSVPs and null out user context pointers.
    pub fn delete_organization(&self, id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            // Clear pointers explicitly as well so the result does not depend
            // on the foreign_keys pragma of this connection.
            tx.execute(
                "UPDATE users SET current_organization_id = NULL WHERE current_organization_id = ?1",
                [id],
            )?;
            tx.execute(
                "UPDATE users SET primary_organization_id = NULL WHERE primary_organization_id = ?1",
                [id],
            )?;
            let deleted = tx.execute("DELETE FROM organizations WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }
}

fn query_organization(conn: &Connection, id: &str) -> Result<Option<OrganizationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, contact_email, contact_phone, website, facebook_url,
                instagram_url, twitter_url, logo_url, primary_color, secondary_color, created_at
         FROM organizations WHERE id = ?1",
    )?;
    stmt.query_row([id], map_organization).optional()
}

fn map_organization(row: &Row<'_>) -> rusqlite::Result<OrganizationRow> {
    Ok(OrganizationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        contact_email: row.get(3)?,
        contact_phone: row.get(4)?,
        website: row.get(5)?,
        facebook_url: row.get(6)?,
        instagram_url: row.get(7)?,
        twitter_url: row.get(8)?,
        logo_url: row.get(9)?,
        primary_color: row.get(10)?,
        secondary_color: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::models::{NewEvent, OrganizationProfile};
    use crate::queries::fixtures;

    fn count(db: &Database, sql: &str, id: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(sql, [id], |r| r.get(0))?)).unwrap()
    }

    #[test]
    fn creator_becomes_admin_with_context() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let org = fixtures::organization(&db, "Brass Band", &alice);

        let membership = db.get_active_membership(&alice, &org).unwrap().unwrap();
        assert_eq!(membership.role, "Admin");
        assert_eq!(membership.organization_name, "Brass Band");

        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.current_organization_id.as_deref(), Some(org.as_str()));
        assert_eq!(user.primary_organization_id.as_deref(), Some(org.as_str()));

        // A second organization moves the current pointer but keeps the primary.
        let second = fixtures::organization(&db, "Jazz Combo", &alice);
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.current_organization_id.as_deref(), Some(second.as_str()));
        assert_eq!(user.primary_organization_id.as_deref(), Some(org.as_str()));
    }

    #[test]
    fn profile_update_is_partial() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let org = fixtures::organization(&db, "Brass Band", &alice);

        let profile = OrganizationProfile {
            contact_email: Some("band@example.org".into()),
            primary_color: Some("#aa0000".into()),
            ..Default::default()
        };
        assert!(db.update_organization(&org, &profile).unwrap());

        let row = db.get_organization(&org).unwrap().unwrap();
        assert_eq!(row.name, "Brass Band");
        assert_eq!(row.contact_email.as_deref(), Some("band@example.org"));
        assert_eq!(row.primary_color.as_deref(), Some("#aa0000"));
    }

    #[test]
    fn deleting_organization_leaves_no_orphans() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let org = fixtures::organization(&db, "Brass Band", &alice);
        db.create_section(&fixtures::id(), &org, "Trumpets").unwrap();

        let event_id = fixtures::id();
        db.insert_events(&[NewEvent {
            id: event_id.clone(),
            organization_id: org.clone(),
            parent_event_id: None,
            title: "Rehearsal".into(),
            description: None,
            location: None,
            category: None,
            start_at: "2026-05-01T19:00:00Z".into(),
            end_at: None,
            recurrence: None,
            recurrence_interval: None,
            recurrence_until: None,
            created_by: alice.clone(),
        }])
        .unwrap();
        db.upsert_rsvp(&fixtures::id(), &alice, &event_id, "Yes").unwrap();

        assert!(db.delete_organization(&org).unwrap());

        assert_eq!(count(&db, "SELECT COUNT(*) FROM events WHERE organization_id = ?1", &org), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM rsvps WHERE event_id = ?1", &event_id), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM sections WHERE organization_id = ?1", &org), 0);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM user_organizations WHERE organization_id = ?1", &org),
            0
        );

        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert!(user.current_organization_id.is_none());
        assert!(user.primary_organization_id.is_none());
        assert!(!db.delete_organization(&org).unwrap());
    }
}
