//! User Storage
//! Mission: Store admin accounts in SQLite and expose them through the user directory interface

use crate::auth::models::{NewUser, User};
use anyhow::{Context, Result};
use bcrypt::hash;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

/// Read-only view of the user directory used by the authentication core
pub trait UserDirectory: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    fn find_by_id(&self, id: i64) -> Result<Option<User>>;
}

const USER_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, \
     is_active, is_staff, is_superuser, is_admin, created_at, updated_at";

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
    hash_cost: u32,
}

impl UserStore {
    /// Open the user directory and create its schema if missing
    pub fn with_hash_cost(db_path: &str, hash_cost: u32) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            hash_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open user database at {}", self.db_path))
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                email TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_superuser INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create users table")?;

        Ok(())
    }

    /// Create a superuser from configuration when no admin-role account exists yet
    pub fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Option<User>> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE is_staff = 1 OR is_superuser = 1 OR is_admin = 1",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?;

        if count > 0 {
            return Ok(None);
        }

        let admin = self.create_user(&NewUser {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            is_active: true,
            is_staff: true,
            is_superuser: true,
            ..Default::default()
        })?;

        info!("🔐 Bootstrap admin user created (username: {})", admin.username);
        warn!("⚠️  Rotate the bootstrap admin password after first login");

        Ok(Some(admin))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");

        conn.query_row(&sql, params![username], row_to_user)
            .optional()
            .context("Failed to look up user by username")
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");

        conn.query_row(&sql, params![id], row_to_user)
            .optional()
            .context("Failed to look up user by id")
    }

    /// Create a new user, hashing the password with bcrypt
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        if new_user.username.trim().is_empty() {
            anyhow::bail!("Username must not be empty");
        }
        if self.get_user_by_username(&new_user.username)?.is_some() {
            anyhow::bail!("Username already exists: {}", new_user.username);
        }

        let password_hash =
            hash(&new_user.password, self.hash_cost).context("Failed to hash password")?;
        let now = Utc::now().to_rfc3339();

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO users (username, password_hash, email, first_name, last_name,
                                is_active, is_staff, is_superuser, is_admin, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                new_user.username,
                password_hash,
                new_user.email,
                new_user.first_name,
                new_user.last_name,
                new_user.is_active,
                new_user.is_staff,
                new_user.is_superuser,
                new_user.is_admin,
                now,
            ],
        )
        .context("Failed to insert user")?;

        let id = conn.last_insert_rowid();
        info!(user_id = id, "✅ Created user: {}", new_user.username);

        self.get_user_by_id(id)?
            .context("Inserted user could not be read back")
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?;

        Ok(users)
    }

    /// Activate or deactivate an account by username
    pub fn set_active(&self, username: &str, active: bool) -> Result<()> {
        let conn = self.connect()?;
        let rows_affected = conn.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE username = ?3",
            params![active, Utc::now().to_rfc3339(), username],
        )?;

        if rows_affected == 0 {
            anyhow::bail!("User not found: {username}");
        }

        info!(active, "Updated account status for {}", username);
        Ok(())
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        is_staff: row.get(7)?,
        is_superuser: row.get(8)?,
        is_admin: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl UserDirectory for UserStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.get_user_by_username(username)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.get_user_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcrypt::verify;
    use tempfile::NamedTempFile;

    const TEST_HASH_COST: u32 = 4;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::with_hash_cost(db_path, TEST_HASH_COST).unwrap();
        (store, temp_file)
    }

    fn staff(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "pw".to_string(),
            is_active: true,
            is_staff: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let created = store
            .create_user(&NewUser {
                email: "ana@example.org".to_string(),
                first_name: "Ana".to_string(),
                ..staff("ana")
            })
            .unwrap();
        assert!(created.id > 0);
        assert!(created.is_staff);
        assert!(!created.is_superuser);
        assert_ne!(created.password_hash, "pw");
        assert!(verify("pw", &created.password_hash).unwrap());

        let by_name = store.get_user_by_username("ana").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.first_name, "Ana");

        let by_id = store.find_by_id(created.id).unwrap().unwrap();
        assert_eq!(by_id.username, "ana");

        assert!(store.get_user_by_username("nobody").unwrap().is_none());
        assert!(store.find_by_id(9999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (store, _temp) = create_test_store();
        store.create_user(&staff("ana")).unwrap();
        assert!(store.create_user(&staff("ana")).is_err());
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_bootstrap_admin_only_when_no_admin_exists() {
        let (store, _temp) = create_test_store();

        let created = store
            .ensure_bootstrap_admin("root", "changeme", "root@example.org")
            .unwrap();
        let root = created.unwrap();
        assert!(root.is_superuser && root.is_staff && root.is_active);

        // Second call is a no-op
        assert!(store
            .ensure_bootstrap_admin("root2", "changeme", "")
            .unwrap()
            .is_none());
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_set_active() {
        let (store, _temp) = create_test_store();
        store.create_user(&staff("ana")).unwrap();

        store.set_active("ana", false).unwrap();
        assert!(!store.get_user_by_username("ana").unwrap().unwrap().is_active);

        store.set_active("ana", true).unwrap();
        assert!(store.get_user_by_username("ana").unwrap().unwrap().is_active);

        assert!(store.set_active("ghost", false).is_err());
    }
}
