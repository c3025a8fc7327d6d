use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{NewUser, UserRow};

const USER_COLUMNS: &str = "id, username, password, email, first_name, last_name, \
     current_organization_id, primary_organization_id, created_at";

impl Database {
    /// Returns `false` if the username is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password, email, first_name, last_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(username) DO NOTHING",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.password_hash,
                    user.email,
                    user.first_name,
                    user.last_name
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_user_profile(
        &self,
        id: &str,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    email = COALESCE(?2, email),
                    first_name = COALESCE(?3, first_name),
                    last_name = COALESCE(?4, last_name)
                 WHERE id = ?1",
                rusqlite::params![id, email, first_name, last_name],
            )?;
            Ok(changed > 0)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], map_user).optional()
}

pub(crate) fn set_current_organization(
    conn: &Connection,
    user_id: &str,
    organization_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET current_organization_id = ?2 WHERE id = ?1",
        rusqlite::params![user_id, organization_id],
    )?;
    Ok(())
}

pub(crate) fn set_primary_organization(
    conn: &Connection,
    user_id: &str,
    organization_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET primary_organization_id = ?2 WHERE id = ?1",
        rusqlite::params![user_id, organization_id],
    )?;
    Ok(())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        current_organization_id: row.get(6)?,
        primary_organization_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert!(by_name.current_organization_id.is_none());

        assert!(db.get_user_by_id(&id).unwrap().is_some());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "alice");
        let again = db.create_user(&crate::models::NewUser {
            id: &fixtures::id(),
            username: "alice",
            password_hash: "x",
            email: None,
            first_name: None,
            last_name: None,
        });
        assert!(!again.unwrap());
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().password, "not-a-real-hash");
    }

    #[test]
    fn profile_update_keeps_omitted_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "alice");

        db.update_user_profile(&id, Some("a@example.org"), Some("Alice"), None).unwrap();
        db.update_user_profile(&id, None, None, Some("Liddell")).unwrap();

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("a@example.org"));
        assert_eq!(user.first_name.as_deref(), Some("Alice"));
        assert_eq!(user.last_name.as_deref(), Some("Liddell"));
    }
}
