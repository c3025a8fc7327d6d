use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. Each runs once, inside a transaction, and records its
/// version in `schema_version`; never edit a step that has shipped.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "organizations, users and memberships",
        "
        CREATE TABLE organizations (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            description      TEXT,
            contact_email    TEXT,
            contact_phone    TEXT,
            website          TEXT,
            facebook_url     TEXT,
            instagram_url    TEXT,
            twitter_url      TEXT,
            logo_url         TEXT,
            primary_color    TEXT,
            secondary_color  TEXT,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE users (
            id                       TEXT PRIMARY KEY,
            username                 TEXT NOT NULL UNIQUE,
            password                 TEXT NOT NULL,
            email                    TEXT,
            first_name               TEXT,
            last_name                TEXT,
            current_organization_id  TEXT REFERENCES organizations(id) ON DELETE SET NULL,
            primary_organization_id  TEXT REFERENCES organizations(id) ON DELETE SET NULL,
            created_at               TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE sections (
            id               TEXT PRIMARY KEY,
            organization_id  TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            name             TEXT NOT NULL,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(organization_id, name)
        );

        CREATE TABLE user_organizations (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            organization_id  TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            role             TEXT NOT NULL DEFAULT 'Member',
            section_id       TEXT REFERENCES sections(id) ON DELETE SET NULL,
            is_active        INTEGER NOT NULL DEFAULT 1,
            joined_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- At most one active membership per (user, organization)
        CREATE UNIQUE INDEX idx_user_organizations_active
            ON user_organizations(user_id, organization_id) WHERE is_active = 1;

        CREATE INDEX idx_user_organizations_org
            ON user_organizations(organization_id);
        ",
    ),
    (
        2,
        "events and rsvps",
        "
        CREATE TABLE events (
            id                   TEXT PRIMARY KEY,
            organization_id      TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            parent_event_id      TEXT REFERENCES events(id) ON DELETE CASCADE,
            title                TEXT NOT NULL,
            description          TEXT,
            location             TEXT,
            category             TEXT,
            start_at             TEXT NOT NULL,
            end_at               TEXT,
            recurrence           TEXT,
            recurrence_interval  INTEGER,
            recurrence_until     TEXT,
            is_cancelled         INTEGER NOT NULL DEFAULT 0,
            cancellation_reason  TEXT,
            cancelled_at         TEXT,
            created_by           TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_events_org_start
            ON events(organization_id, start_at);

        CREATE INDEX idx_events_parent
            ON events(parent_event_id);

        CREATE TABLE rsvps (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            status      TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, event_id)
        );

        CREATE INDEX idx_rsvps_event
            ON rsvps(event_id);
        ",
    ),
    (
        3,
        "case-insensitive section names",
        "
        CREATE UNIQUE INDEX idx_sections_org_name_nocase
            ON sections(organization_id, name COLLATE NOCASE);
        ",
    ),
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        info!("Running migration v{} ({})", version, name);
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
