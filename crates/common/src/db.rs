//! SQLite database for ESignage state persistence
//!
//! Tables:
//! - operators: accounts that own devices
//! - devices: display units with their per-device credential
//! - messages: display messages, ordered by insertion
//! - registration_tokens: single-use provisioning credentials
//! - global_settings: singleton network defaults row

use crate::types::*;
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // WAL for better concurrency; foreign keys for message cascade
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Operators
            CREATE TABLE IF NOT EXISTS operators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_operators_username ON operators(username);

            -- Devices
            CREATE TABLE IF NOT EXISTS devices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                update_interval_seconds INTEGER NOT NULL DEFAULT 60,
                rotate_interval_seconds INTEGER NOT NULL DEFAULT 10,
                device_token TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                FOREIGN KEY(owner_id) REFERENCES operators(id)
            );
            CREATE INDEX IF NOT EXISTS idx_devices_owner ON devices(owner_id);

            -- Display messages
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                font_size INTEGER NOT NULL DEFAULT 1,
                scroll INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(device_id) REFERENCES devices(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_messages_device ON messages(device_id);

            -- Registration tokens
            CREATE TABLE IF NOT EXISTS registration_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL UNIQUE,
                operator_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(operator_id) REFERENCES operators(id)
            );
            CREATE INDEX IF NOT EXISTS idx_registration_tokens_token ON registration_tokens(token);

            -- Global settings (singleton row)
            CREATE TABLE IF NOT EXISTS global_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                wifi_ssid TEXT NOT NULL,
                wifi_password TEXT NOT NULL,
                ntp_server TEXT NOT NULL,
                server_domain TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Operator operations
    // ========================================================================

    pub fn create_operator(&self, username: &str) -> Result<Operator> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO operators (username, created_at) VALUES (?1, ?2)",
            params![username, now],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Created operator {} with id {}", username, id);
        Ok(Operator {
            id,
            username: username.to_string(),
            created_at: now,
        })
    }

    pub fn operator_by_username(&self, username: &str) -> Result<Option<Operator>> {
        let conn = self.conn.lock();
        let op = conn
            .query_row(
                "SELECT id, username, created_at FROM operators WHERE username = ?1",
                params![username],
                |row| {
                    Ok(Operator {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(op)
    }

    pub fn count_operators(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM operators", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Device operations
    // ========================================================================

    /// Insert a new device. The UNIQUE constraint on device_token makes the
    /// insert atomic with respect to concurrent provisioning: a colliding
    /// token is rejected by the store, never overwritten.
    pub fn create_device(&self, owner_id: i64, name: &str, device_token: &str) -> Result<Device> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO devices (owner_id, name, update_interval_seconds, rotate_interval_seconds, device_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                owner_id,
                name,
                DEFAULT_UPDATE_INTERVAL_SECS,
                DEFAULT_ROTATE_INTERVAL_SECS,
                device_token,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Created device {} for operator {}", id, owner_id);
        Ok(Device {
            id,
            owner_id,
            name: name.to_string(),
            update_interval_seconds: DEFAULT_UPDATE_INTERVAL_SECS,
            rotate_interval_seconds: DEFAULT_ROTATE_INTERVAL_SECS,
            device_token: device_token.to_string(),
            created_at: now,
        })
    }

    pub fn device(&self, id: i64) -> Result<Option<Device>> {
        let conn = self.conn.lock();
        let device = conn
            .query_row(
                "SELECT id, owner_id, name, update_interval_seconds, rotate_interval_seconds, device_token, created_at
                 FROM devices WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Device {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        name: row.get(2)?,
                        update_interval_seconds: row.get(3)?,
                        rotate_interval_seconds: row.get(4)?,
                        device_token: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(device)
    }

    pub fn devices_for_operator(&self, owner_id: i64) -> Result<Vec<Device>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, update_interval_seconds, rotate_interval_seconds, device_token, created_at
             FROM devices WHERE owner_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![owner_id], |row| {
            Ok(Device {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                update_interval_seconds: row.get(3)?,
                rotate_interval_seconds: row.get(4)?,
                device_token: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut devices = Vec::new();
        for row in rows {
            devices.push(row?);
        }
        Ok(devices)
    }

    /// Update name and timing parameters. Intervals must already be
    /// validated as positive by the caller.
    pub fn update_device_settings(
        &self,
        id: i64,
        name: &str,
        update_interval_seconds: u32,
        rotate_interval_seconds: u32,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE devices SET name = ?1, update_interval_seconds = ?2, rotate_interval_seconds = ?3 WHERE id = ?4",
            params![name, update_interval_seconds, rotate_interval_seconds, id],
        )?;
        Ok(rows > 0)
    }

    /// Delete a device; its messages go with it (ON DELETE CASCADE).
    pub fn delete_device(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted device {}", id);
        }
        Ok(rows > 0)
    }

    // ========================================================================
    // Message operations
    // ========================================================================

    pub fn add_message(
        &self,
        device_id: i64,
        text: &str,
        font_size: i32,
        scroll: bool,
    ) -> Result<DisplayMessage> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (device_id, text, font_size, scroll) VALUES (?1, ?2, ?3, ?4)",
            params![device_id, text, font_size, scroll],
        )?;
        let id = conn.last_insert_rowid();

        Ok(DisplayMessage {
            id,
            device_id,
            text: text.to_string(),
            font_size,
            scroll,
        })
    }

    pub fn delete_message(&self, device_id: i64, message_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM messages WHERE id = ?1 AND device_id = ?2",
            params![message_id, device_id],
        )?;
        Ok(rows > 0)
    }

    /// Messages in stable insertion order (ascending id).
    pub fn messages_for_device(&self, device_id: i64) -> Result<Vec<DisplayMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, device_id, text, font_size, scroll FROM messages WHERE device_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![device_id], |row| {
            Ok(DisplayMessage {
                id: row.get(0)?,
                device_id: row.get(1)?,
                text: row.get(2)?,
                font_size: row.get(3)?,
                scroll: row.get(4)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // ========================================================================
    // Registration token operations
    // ========================================================================

    pub fn create_registration_token(
        &self,
        operator_id: i64,
        token: &str,
    ) -> Result<RegistrationToken> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO registration_tokens (token, operator_id, created_at, used) VALUES (?1, ?2, ?3, 0)",
            params![token, operator_id, now],
        )?;
        let id = conn.last_insert_rowid();

        Ok(RegistrationToken {
            id,
            token: token.to_string(),
            operator_id,
            created_at: now,
            used: false,
        })
    }

    pub fn registration_token(&self, token: &str) -> Result<Option<RegistrationToken>> {
        let conn = self.conn.lock();
        let reg = conn
            .query_row(
                "SELECT id, token, operator_id, created_at, used FROM registration_tokens WHERE token = ?1",
                params![token],
                |row| {
                    Ok(RegistrationToken {
                        id: row.get(0)?,
                        token: row.get(1)?,
                        operator_id: row.get(2)?,
                        created_at: row.get(3)?,
                        used: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(reg)
    }

    /// Atomically mark a registration token as used. Returns false when the
    /// token is unknown or was already consumed, without distinguishing the
    /// two cases.
    pub fn consume_registration_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE registration_tokens SET used = 1 WHERE token = ?1 AND used = 0",
            params![token],
        )?;
        Ok(rows > 0)
    }

    // ========================================================================
    // Global settings
    // ========================================================================

    /// Read the singleton defaults row, inserting `seed` on first read.
    pub fn global_defaults(&self, seed: &GlobalDefaults) -> Result<GlobalDefaults> {
        let conn = self.conn.lock();

        let existing = conn
            .query_row(
                "SELECT wifi_ssid, wifi_password, ntp_server, server_domain FROM global_settings WHERE id = 1",
                [],
                |row| {
                    Ok(GlobalDefaults {
                        wifi_ssid: row.get(0)?,
                        wifi_password: row.get(1)?,
                        ntp_server: row.get(2)?,
                        server_domain: row.get(3)?,
                    })
                },
            )
            .optional()?;

        match existing {
            Some(defaults) => Ok(defaults),
            None => {
                conn.execute(
                    "INSERT INTO global_settings (id, wifi_ssid, wifi_password, ntp_server, server_domain)
                     VALUES (1, ?1, ?2, ?3, ?4)",
                    params![seed.wifi_ssid, seed.wifi_password, seed.ntp_server, seed.server_domain],
                )?;
                debug!("Seeded global settings row");
                Ok(seed.clone())
            }
        }
    }

    /// Replace the singleton defaults row.
    pub fn update_global_defaults(&self, defaults: &GlobalDefaults) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO global_settings (id, wifi_ssid, wifi_password, ntp_server, server_domain)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                defaults.wifi_ssid,
                defaults.wifi_password,
                defaults.ntp_server,
                defaults.server_domain,
            ],
        )?;
        Ok(())
    }
}

/// Map a rusqlite constraint violation into a uniqueness check.
pub fn is_unique_violation(err: &Error) -> bool {
    matches!(
        err,
        Error::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::new_opaque_token;

    fn test_db() -> Database {
        Database::open_memory().unwrap()
    }

    fn seed() -> GlobalDefaults {
        GlobalDefaults {
            wifi_ssid: "signage-net".to_string(),
            wifi_password: "hunter2".to_string(),
            ntp_server: "pool.ntp.org".to_string(),
            server_domain: "signage.example.com".to_string(),
        }
    }

    #[test]
    fn test_operator_crud() {
        let db = test_db();
        let op = db.create_operator("alice").unwrap();
        assert_eq!(op.username, "alice");

        let fetched = db.operator_by_username("alice").unwrap().unwrap();
        assert_eq!(fetched.id, op.id);
        assert!(db.operator_by_username("bob").unwrap().is_none());

        // Usernames are unique
        assert!(db.create_operator("alice").is_err());
    }

    #[test]
    fn test_device_crud() {
        let db = test_db();
        let op = db.create_operator("alice").unwrap();
        let device = db.create_device(op.id, "lobby", &new_opaque_token()).unwrap();
        assert_eq!(device.update_interval_seconds, 60);
        assert_eq!(device.rotate_interval_seconds, 10);

        let fetched = db.device(device.id).unwrap().unwrap();
        assert_eq!(fetched.device_token, device.device_token);

        assert!(db
            .update_device_settings(device.id, "entrance", 120, 5)
            .unwrap());
        let updated = db.device(device.id).unwrap().unwrap();
        assert_eq!(updated.name, "entrance");
        assert_eq!(updated.update_interval_seconds, 120);
        // Token is never reissued by settings updates
        assert_eq!(updated.device_token, device.device_token);

        assert!(db.delete_device(device.id).unwrap());
        assert!(db.device(device.id).unwrap().is_none());
    }

    #[test]
    fn test_device_token_unique() {
        let db = test_db();
        let op = db.create_operator("alice").unwrap();
        let token = new_opaque_token();
        db.create_device(op.id, "a", &token).unwrap();

        let err = db.create_device(op.id, "b", &token).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_messages_cascade_and_order() {
        let db = test_db();
        let op = db.create_operator("alice").unwrap();
        let device = db.create_device(op.id, "lobby", &new_opaque_token()).unwrap();

        db.add_message(device.id, "first", 1, false).unwrap();
        db.add_message(device.id, "second", 2, true).unwrap();
        db.add_message(device.id, "third", 1, false).unwrap();

        let messages = db.messages_for_device(device.id).unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        db.delete_device(device.id).unwrap();
        assert!(db.messages_for_device(device.id).unwrap().is_empty());
    }

    #[test]
    fn test_registration_token_single_use() {
        let db = test_db();
        let op = db.create_operator("alice").unwrap();
        let token = new_opaque_token();
        let reg = db.create_registration_token(op.id, &token).unwrap();
        assert!(!reg.used);

        assert!(db.consume_registration_token(&token).unwrap());
        assert!(!db.consume_registration_token(&token).unwrap());
        assert!(!db.consume_registration_token("unknown").unwrap());

        let fetched = db.registration_token(&token).unwrap().unwrap();
        assert!(fetched.used);
    }

    #[test]
    fn test_global_defaults_lazy_seed() {
        let db = test_db();

        let defaults = db.global_defaults(&seed()).unwrap();
        assert_eq!(defaults, seed());

        // Seed is only applied once; later reads return the stored row
        let mut changed = seed();
        changed.wifi_ssid = "other-net".to_string();
        db.update_global_defaults(&changed).unwrap();

        let reread = db.global_defaults(&seed()).unwrap();
        assert_eq!(reread.wifi_ssid, "other-net");
    }
}
