use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use super::users::{query_user, set_current_organization, set_primary_organization};
use crate::Database;
use crate::models::{MemberRow, MembershipChange, MembershipRow};

const MEMBERSHIP_SELECT: &str = "
    SELECT m.id, m.user_id, m.organization_id, o.name, m.role, m.section_id, s.name,
           m.is_active, m.joined_at
    FROM user_organizations m
    JOIN organizations o ON o.id = m.organization_id
    LEFT JOIN sections s ON s.id = m.section_id";

impl Database {
    pub fn get_active_membership(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| query_active_membership(conn, user_id, organization_id))
    }

    /// Active memberships of a user, oldest first.
    pub fn list_user_memberships(&self, user_id: &str) -> Result<Vec<MembershipRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.user_id = ?1 AND m.is_active = 1 ORDER BY m.joined_at, o.name",
                MEMBERSHIP_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_membership)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_organization_members(&self, organization_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.first_name, u.last_name, m.role, m.section_id,
                        s.name, m.joined_at
                 FROM user_organizations m
                 JOIN users u ON u.id = m.user_id
                 LEFT JOIN sections s ON s.id = m.section_id
                 WHERE m.organization_id = ?1 AND m.is_active = 1
                 ORDER BY s.name, u.username",
            )?;
            let rows = stmt
                .query_map([organization_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        role: row.get(4)?,
                        section_id: row.get(5)?,
                        section_name: row.get(6)?,
                        joined_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Inserts a new active membership. Returns `false` when the user already
    /// has an active membership in the organization; an earlier deactivated
    /// row is kept as history.
    pub fn add_membership(
        &self,
        id: &str,
        user_id: &str,
        organization_id: &str,
        role: &str,
        section_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO user_organizations (id, user_id, organization_id, role, section_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, organization_id) WHERE is_active = 1 DO NOTHING",
                rusqlite::params![id, user_id, organization_id, role, section_id],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Changes role and/or section of an active membership.
    /// `section_id: Some(None)` clears the section. Demoting the last active
    /// Admin is refused with [`MembershipChange::LastAdmin`].
    pub fn update_membership(
        &self,
        user_id: &str,
        organization_id: &str,
        role: Option<&str>,
        section_id: Option<Option<&str>>,
    ) -> Result<MembershipChange> {
        self.with_tx(|tx| {
            let Some(current) = query_active_membership(tx, user_id, organization_id)? else {
                return Ok(MembershipChange::NotFound);
            };

            if let Some(role) = role {
                if is_admin(&current.role)
                    && !is_admin(role)
                    && count_admins(tx, organization_id)? <= 1
                {
                    return Ok(MembershipChange::LastAdmin);
                }
                tx.execute(
                    "UPDATE user_organizations SET role = ?2 WHERE id = ?1",
                    rusqlite::params![current.id, role],
                )?;
            }
            if let Some(section_id) = section_id {
                tx.execute(
                    "UPDATE user_organizations SET section_id = ?2 WHERE id = ?1",
                    rusqlite::params![current.id, section_id],
                )?;
            }
            Ok(MembershipChange::Updated)
        })
    }

    /// Deactivates a membership and clears any user pointer that referenced
    /// the organization. The last active Admin cannot be deactivated.
    pub fn deactivate_membership(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<MembershipChange> {
        self.with_tx(|tx| {
            let Some(current) = query_active_membership(tx, user_id, organization_id)? else {
                return Ok(MembershipChange::NotFound);
            };
            if is_admin(&current.role) && count_admins(tx, organization_id)? <= 1 {
                return Ok(MembershipChange::LastAdmin);
            }

            tx.execute(
                "UPDATE user_organizations SET is_active = 0 WHERE id = ?1",
                [&current.id],
            )?;
            tx.execute(
                "UPDATE users SET current_organization_id = NULL
                 WHERE id = ?1 AND current_organization_id = ?2",
                [user_id, organization_id],
            )?;
            tx.execute(
                "UPDATE users SET primary_organization_id = NULL
                 WHERE id = ?1 AND primary_organization_id = ?2",
                [user_id, organization_id],
            )?;
            Ok(MembershipChange::Updated)
        })
    }

    pub fn count_active_admins(&self, organization_id: &str) -> Result<i64> {
        self.with_conn(|conn| count_admins(conn, organization_id))
    }

    /// Moves a user's current context to `organization_id`.
    ///
    /// Returns `None` without touching the user row unless an active
    /// membership exists. With `make_primary` the primary pointer follows.
    pub fn switch_organization(
        &self,
        user_id: &str,
        organization_id: &str,
        make_primary: bool,
    ) -> Result<Option<MembershipRow>> {
        self.with_tx(|tx| {
            let Some(membership) = query_active_membership(tx, user_id, organization_id)? else {
                return Ok(None);
            };
            set_current_organization(tx, user_id, Some(organization_id))?;
            if make_primary {
                set_primary_organization(tx, user_id, Some(organization_id))?;
            }
            Ok(Some(membership))
        })
    }

    /// Context for a fresh login: the current organization if still active,
    /// else the primary one, else the earliest-joined active membership.
    /// The chosen organization becomes the user's current one.
    pub fn resume_session(&self, user_id: &str) -> Result<Option<MembershipRow>> {
        self.with_tx(|tx| {
            let Some(user) = query_user(tx, "id", user_id)? else {
                return Ok(None);
            };

            let mut chosen = None;
            for candidate in [&user.current_organization_id, &user.primary_organization_id]
                .into_iter()
                .flatten()
            {
                chosen = query_active_membership(tx, user_id, candidate)?;
                if chosen.is_some() {
                    break;
                }
            }
            if chosen.is_none() {
                let sql = format!(
                    "{} WHERE m.user_id = ?1 AND m.is_active = 1 ORDER BY m.joined_at LIMIT 1",
                    MEMBERSHIP_SELECT
                );
                chosen = tx.query_row(&sql, [user_id], map_membership).optional()?;
            }

            let chosen_id = chosen.as_ref().map(|m| m.organization_id.as_str());
            if chosen_id != user.current_organization_id.as_deref() {
                set_current_organization(tx, user_id, chosen_id)?;
            }
            Ok(chosen)
        })
    }
}

fn is_admin(role: &str) -> bool {
    role.trim().eq_ignore_ascii_case("admin")
}

fn count_admins(conn: &Connection, organization_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM user_organizations
         WHERE organization_id = ?1 AND is_active = 1 AND TRIM(role) = 'Admin' COLLATE NOCASE",
        [organization_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

pub(crate) fn query_active_membership(
    conn: &Connection,
    user_id: &str,
    organization_id: &str,
) -> Result<Option<MembershipRow>> {
    let sql = format!(
        "{} WHERE m.user_id = ?1 AND m.organization_id = ?2 AND m.is_active = 1",
        MEMBERSHIP_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([user_id, organization_id], map_membership).optional()
}

fn map_membership(row: &Row<'_>) -> rusqlite::Result<MembershipRow> {
    Ok(MembershipRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        organization_id: row.get(2)?,
        organization_name: row.get(3)?,
        role: row.get(4)?,
        section_id: row.get(5)?,
        section_name: row.get(6)?,
        is_active: row.get(7)?,
        joined_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::Database;
    use crate::models::MembershipChange;
    use crate::queries::fixtures;

    #[test]
    fn only_one_active_membership_per_pair() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let org = fixtures::organization(&db, "Brass Band", &alice);

        assert!(db.add_membership(&fixtures::id(), &bob, &org, "Member", None).unwrap());
        assert!(!db.add_membership(&fixtures::id(), &bob, &org, "Member", None).unwrap());

        // After leaving, rejoining creates a fresh active row.
        assert_eq!(db.deactivate_membership(&bob, &org).unwrap(), MembershipChange::Updated);
        assert!(db.add_membership(&fixtures::id(), &bob, &org, "Admin", None).unwrap());

        let active = db.get_active_membership(&bob, &org).unwrap().unwrap();
        assert_eq!(active.role, "Admin");

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM user_organizations WHERE user_id = ?1",
                    [&bob],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn switch_requires_active_membership() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let band = fixtures::organization(&db, "Brass Band", &alice);
        let choir = fixtures::organization(&db, "Choir", &bob);

        assert!(db.switch_organization(&alice, &choir, false).unwrap().is_none());
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.current_organization_id.as_deref(), Some(band.as_str()));

        db.add_membership(&fixtures::id(), &alice, &choir, "Member", None).unwrap();
        let membership = db.switch_organization(&alice, &choir, true).unwrap().unwrap();
        assert_eq!(membership.role, "Member");

        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.current_organization_id.as_deref(), Some(choir.as_str()));
        assert_eq!(user.primary_organization_id.as_deref(), Some(choir.as_str()));

        db.deactivate_membership(&alice, &choir).unwrap();
        assert!(db.switch_organization(&alice, &choir, false).unwrap().is_none());
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert!(user.current_organization_id.is_none());
        assert!(user.primary_organization_id.is_none());
    }

    #[test]
    fn resume_session_falls_back_in_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        assert!(db.resume_session(&alice).unwrap().is_none());

        let band = fixtures::organization(&db, "Brass Band", &alice);
        let choir = fixtures::organization(&db, "Choir", &alice);
        db.add_membership(&fixtures::id(), &bob, &choir, "Admin", None).unwrap();

        // current = choir, primary = band
        let m = db.resume_session(&alice).unwrap().unwrap();
        assert_eq!(m.organization_id, choir);

        db.deactivate_membership(&alice, &choir).unwrap();
        let m = db.resume_session(&alice).unwrap().unwrap();
        assert_eq!(m.organization_id, band);
    }

    #[test]
    fn resume_session_persists_the_fallback() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let choir = fixtures::organization(&db, "Choir", &bob);
        db.add_membership(&fixtures::id(), &alice, &choir, "Member", None).unwrap();

        // Added by someone else, so no pointer names the choir yet
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert!(user.current_organization_id.is_none());

        let m = db.resume_session(&alice).unwrap().unwrap();
        assert_eq!(m.organization_id, choir);
        let user = db.get_user_by_id(&alice).unwrap().unwrap();
        assert_eq!(user.current_organization_id.as_deref(), Some(choir.as_str()));
    }

    #[test]
    fn update_membership_sets_and_clears_section() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let org = fixtures::organization(&db, "Brass Band", &alice);
        db.add_membership(&fixtures::id(), &bob, &org, "Member", None).unwrap();
        let section = fixtures::id();
        db.create_section(&section, &org, "Tubas").unwrap();

        let change = db.update_membership(&bob, &org, None, Some(Some(section.as_str()))).unwrap();
        assert_eq!(change, MembershipChange::Updated);
        let m = db.get_active_membership(&bob, &org).unwrap().unwrap();
        assert_eq!(m.section_name.as_deref(), Some("Tubas"));

        let change = db.update_membership(&bob, &org, Some("Admin"), Some(None)).unwrap();
        assert_eq!(change, MembershipChange::Updated);
        let m = db.get_active_membership(&bob, &org).unwrap().unwrap();
        assert!(m.section_id.is_none());
        assert_eq!(m.role, "Admin");
        assert_eq!(db.count_active_admins(&org).unwrap(), 2);

        let stranger = fixtures::id();
        assert_eq!(
            db.update_membership(&stranger, &org, Some("Member"), None).unwrap(),
            MembershipChange::NotFound
        );
    }

    #[test]
    fn last_admin_is_kept() {
        let db = Database::open_in_memory().unwrap();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        let org = fixtures::organization(&db, "Brass Band", &alice);
        db.add_membership(&fixtures::id(), &bob, &org, "Admin", None).unwrap();

        // Two admins demoting each other: the second change is refused
        assert_eq!(
            db.update_membership(&bob, &org, Some("Member"), None).unwrap(),
            MembershipChange::Updated
        );
        assert_eq!(
            db.update_membership(&alice, &org, Some("Member"), None).unwrap(),
            MembershipChange::LastAdmin
        );
        assert_eq!(
            db.deactivate_membership(&alice, &org).unwrap(),
            MembershipChange::LastAdmin
        );
        assert_eq!(db.count_active_admins(&org).unwrap(), 1);

        // A section-only change to the last admin is fine
        assert_eq!(
            db.update_membership(&alice, &org, Some("Admin"), Some(None)).unwrap(),
            MembershipChange::Updated
        );
        assert_eq!(
            db.deactivate_membership(&bob, &org).unwrap(),
            MembershipChange::Updated
        );
    }

    #[test]
    fn concurrent_demotions_keep_an_admin() {
        for _ in 0..20 {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let alice = fixtures::user(&db, "alice");
            let bob = fixtures::user(&db, "bob");
            let org = fixtures::organization(&db, "Brass Band", &alice);
            db.add_membership(&fixtures::id(), &bob, &org, "Admin", None).unwrap();

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = [alice, bob]
                .into_iter()
                .enumerate()
                .map(|(i, user)| {
                    let db = Arc::clone(&db);
                    let barrier = Arc::clone(&barrier);
                    let org = org.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        if i == 0 {
                            db.update_membership(&user, &org, Some("Member"), None).unwrap()
                        } else {
                            db.deactivate_membership(&user, &org).unwrap()
                        }
                    })
                })
                .collect();
            let outcomes: Vec<MembershipChange> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(db.count_active_admins(&org).unwrap(), 1);
            assert!(outcomes.contains(&MembershipChange::LastAdmin));
        }
    }
}
