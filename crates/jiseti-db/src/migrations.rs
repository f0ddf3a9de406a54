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
            CREATE TABLE normal_users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE administrators (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE,
                admin_number  TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE records (
                id              TEXT PRIMARY KEY,
                record_type     TEXT NOT NULL CHECK (record_type IN ('red-flag', 'intervention')),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                latitude        REAL,
                longitude       REAL,
                status          TEXT NOT NULL CHECK (status IN ('draft', 'under-investigation', 'resolved', 'rejected')),
                is_anonymous    INTEGER NOT NULL DEFAULT 0,
                owner_id        TEXT REFERENCES normal_users(id),
                tracking_token  TEXT UNIQUE,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                CHECK ((latitude IS NULL) = (longitude IS NULL)),
                CHECK (
                    (is_anonymous = 1 AND owner_id IS NULL AND tracking_token IS NOT NULL)
                    OR (is_anonymous = 0 AND owner_id IS NOT NULL AND tracking_token IS NULL)
                )
            );

            CREATE INDEX idx_records_owner ON records(owner_id, created_at);
            CREATE INDEX idx_records_status ON records(status, created_at);

            CREATE TABLE media (
                id          TEXT PRIMARY KEY,
                record_id   TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL CHECK (kind IN ('image', 'video')),
                url         TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_media_record ON media(record_id, created_at);

            CREATE TABLE votes (
                record_id   TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES normal_users(id) ON DELETE CASCADE,
                vote_type   TEXT NOT NULL CHECK (vote_type IN ('support', 'oppose')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (record_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (status history)");
        conn.execute_batch(
            "
            CREATE TABLE status_history (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id    TEXT NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                from_status  TEXT,
                to_status    TEXT NOT NULL,
                changed_by   TEXT,
                reason       TEXT,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_status_history_record ON status_history(record_id, id);

            -- Records that predate the trail get their current status as the opening entry.
            INSERT INTO status_history (record_id, from_status, to_status, changed_by, created_at)
            SELECT id, NULL, status, owner_id, created_at FROM records;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn owner_invariant_is_enforced_by_the_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        // anonymous flag with neither owner nor token
        let res = conn.execute(
            "INSERT INTO records (id, record_type, title, description, status, is_anonymous, created_at, updated_at)
             VALUES ('r1', 'red-flag', 't', 'd', 'under-investigation', 1, 'x', 'x')",
            [],
        );
        assert!(res.is_err());
    }
}
