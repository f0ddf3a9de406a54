//! Account queries. User and administrator email spaces are independent:
//! each table carries its own unique index.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use jiseti_types::models::{Administrator, NormalUser};

use crate::Database;
use crate::error::translate;
use crate::models::{AdminRow, UserRow, format_timestamp};

/// A normal user plus the number of records they own.
pub struct UserWithCount {
    pub user: NormalUser,
    pub record_count: u64,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NormalUser) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO normal_users (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    user.id.to_string(),
                    &user.name,
                    &user.email,
                    &user.password_hash,
                    format_timestamp(user.created_at),
                ),
            )
            .map_err(translate)?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<NormalUser>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<NormalUser>> {
        self.with_conn(|conn| find_user(conn, id))
    }

    /// Changes the display name; `None` when no such user exists.
    pub fn rename_user(&self, id: Uuid, name: &str) -> Result<Option<NormalUser>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE normal_users SET name = ?2 WHERE id = ?1",
                (id.to_string(), name),
            )?;
            find_user(conn, id)
        })
    }

    /// Every normal user, newest first, with how many records they own.
    pub fn list_users(&self) -> Result<Vec<UserWithCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.password, u.created_at,
                        (SELECT COUNT(*) FROM records r WHERE r.owner_id = u.id)
                 FROM normal_users u
                 ORDER BY u.created_at DESC, u.rowid DESC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        UserRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            password: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        row.get::<_, i64>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(row, count)| -> Result<UserWithCount> {
                    Ok(UserWithCount {
                        user: row.try_into()?,
                        record_count: count.max(0) as u64,
                    })
                })
                .collect()
        })
    }

    // -- Administrators --

    pub fn create_admin(&self, admin: &Administrator) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO administrators (id, name, email, admin_number, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    admin.id.to_string(),
                    &admin.name,
                    &admin.email,
                    &admin.admin_number,
                    &admin.password_hash,
                    format_timestamp(admin.created_at),
                ),
            )
            .map_err(translate)?;
            Ok(())
        })
    }

    pub fn get_admin_by_email(&self, email: &str) -> Result<Option<Administrator>> {
        self.with_conn(|conn| query_admin(conn, "email", email))
    }

    pub fn get_admin_by_id(&self, id: Uuid) -> Result<Option<Administrator>> {
        self.with_conn(|conn| query_admin(conn, "id", &id.to_string()))
    }

    pub fn rename_admin(&self, id: Uuid, name: &str) -> Result<Option<Administrator>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE administrators SET name = ?2 WHERE id = ?1",
                (id.to_string(), name),
            )?;
            query_admin(conn, "id", &id.to_string())
        })
    }
}

/// Lookup for callers already holding the connection, e.g. inside a transaction.
pub fn find_user(conn: &Connection, id: Uuid) -> Result<Option<NormalUser>> {
    query_user(conn, "id", &id.to_string())
}

// `column` is always a literal from this module, never caller input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<NormalUser>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password, created_at FROM normal_users WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    row.map(NormalUser::try_from).transpose()
}

fn query_admin(conn: &Connection, column: &str, value: &str) -> Result<Option<Administrator>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, admin_number, password, created_at FROM administrators WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(AdminRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                admin_number: row.get(3)?,
                password: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    row.map(Administrator::try_from).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UniqueViolation;
    use chrono::Utc;

    fn user(email: &str) -> NormalUser {
        NormalUser {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: email.into(),
            password_hash: "hash".into(),
            created_at: Utc::now(),
        }
    }

    fn admin(email: &str, number: &str) -> Administrator {
        Administrator {
            id: Uuid::new_v4(),
            name: "Admin".into(),
            email: email.into(),
            admin_number: number.into(),
            password_hash: "hash".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_user_email_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("a@gmail.com")).unwrap();

        let err = db.create_user(&user("a@gmail.com")).unwrap_err();
        let violation = err.downcast_ref::<UniqueViolation>().unwrap();
        assert!(violation.is_on("normal_users.email"));
    }

    #[test]
    fn user_and_admin_email_spaces_are_independent() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("same@gmail.com")).unwrap();
        db.create_admin(&admin("same@gmail.com", "ADM000001")).unwrap();

        assert!(db.get_user_by_email("same@gmail.com").unwrap().is_some());
        assert!(db.get_admin_by_email("same@gmail.com").unwrap().is_some());
    }

    #[test]
    fn duplicate_admin_number_is_reported_on_its_column() {
        let db = Database::open_in_memory().unwrap();
        db.create_admin(&admin("one@gmail.com", "ADM001")).unwrap();

        let err = db.create_admin(&admin("two@gmail.com", "ADM001")).unwrap_err();
        let violation = err.downcast_ref::<UniqueViolation>().unwrap();
        assert!(violation.is_on("administrators.admin_number"));
    }

    #[test]
    fn lookup_round_trips_fields() {
        let db = Database::open_in_memory().unwrap();
        let u = user("round@gmail.com");
        db.create_user(&u).unwrap();

        let fetched = db.get_user_by_id(u.id).unwrap().unwrap();
        assert_eq!(fetched.email, "round@gmail.com");
        assert_eq!(fetched.password_hash, "hash");
        assert!(db.get_user_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn rename_keeps_the_account_and_skips_missing_ids() {
        let db = Database::open_in_memory().unwrap();
        let u = user("rename@gmail.com");
        db.create_user(&u).unwrap();

        let renamed = db.rename_user(u.id, "Jane Wanjiru").unwrap().unwrap();
        assert_eq!(renamed.name, "Jane Wanjiru");
        assert_eq!(renamed.email, "rename@gmail.com");
        assert!(db.rename_user(Uuid::new_v4(), "Nobody").unwrap().is_none());

        let a = admin("boss@gmail.com", "ADM000002");
        db.create_admin(&a).unwrap();
        let renamed = db.rename_admin(a.id, "Chief").unwrap().unwrap();
        assert_eq!(renamed.admin_number, "ADM000002");
        assert_eq!(renamed.name, "Chief");
    }
}
