use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE companies (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                name                    TEXT NOT NULL,
                description             TEXT,
                is_active               INTEGER NOT NULL DEFAULT 1,
                zoom_meeting_id         TEXT,
                zoom_meeting_url        TEXT,
                zoom_meeting_password   TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now')),
                created_by              INTEGER
            );

            CREATE UNIQUE INDEX idx_companies_meeting
                ON companies(zoom_meeting_id);

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT NOT NULL,
                role            TEXT NOT NULL
                                CHECK (role IN ('super_admin', 'company_admin', 'employee')),
                company_id      INTEGER REFERENCES companies(id),
                first_name      TEXT NOT NULL,
                last_name       TEXT NOT NULL,
                is_active       INTEGER NOT NULL DEFAULT 1,
                is_blocked      INTEGER NOT NULL DEFAULT 0,
                last_login_at   TEXT,
                last_ip_address TEXT,
                device_info     TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now')),
                created_by      INTEGER REFERENCES users(id),
                CHECK (role = 'super_admin' OR company_id IS NOT NULL)
            );

            CREATE INDEX idx_users_company ON users(company_id);
            CREATE INDEX idx_users_role ON users(role);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                receiver_id     INTEGER NOT NULL REFERENCES users(id),
                company_id      INTEGER NOT NULL REFERENCES companies(id),
                message_type    TEXT NOT NULL CHECK (message_type IN ('text', 'voice')),
                content         TEXT NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_receiver ON messages(receiver_id);
            CREATE INDEX idx_messages_company ON messages(company_id);

            CREATE TABLE sessions (
                sid         TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_sessions_expiry ON sessions(expires_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
