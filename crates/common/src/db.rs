//! SQLite storage for contact cards
//!
//! The table layout mirrors the one the reference app creates, so a store can
//! also be opened on the `databases/storage.db` file of a graded app.

use crate::contact::{ContactField, ContactRecord, Owner};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id, user_email, contact_name, contact_affiliation, \
                              contact_description, contact_image";

/// Contact card store, scoped per owner on every operation
#[derive(Clone)]
pub struct ContactStore {
    conn: Arc<Mutex<Connection>>,
}

impl ContactStore {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_schema()?;

        info!("Opened contact store at {:?}", path.as_ref());
        Ok(store)
    }

    /// Open an existing database without writing to it, schema included
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        debug!("Opened contact store read-only at {:?}", path.as_ref());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS contact_card (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email CHAR(512),
                contact_name CHAR(512),
                contact_affiliation CHAR(512),
                contact_description TEXT,
                contact_image TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_contact_card_owner ON contact_card(user_email);
            "#,
        )?;

        debug!("Contact store schema initialized");
        Ok(())
    }

    /// Create an empty card owned by `owner`
    pub fn add(&self, owner: &Owner) -> Result<ContactRecord> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO contact_card (user_email, contact_name, contact_affiliation, \
             contact_description, contact_image) VALUES (?1, '', '', '', '')",
            params![owner.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Added contact {} for {}", id, owner);

        Ok(ContactRecord {
            id,
            user_email: owner.as_str().to_string(),
            contact_name: String::new(),
            contact_affiliation: String::new(),
            contact_description: String::new(),
            contact_image: String::new(),
        })
    }

    /// All cards of `owner` in creation order
    pub fn list(&self, owner: &Owner) -> Result<Vec<ContactRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contact_card WHERE user_email = ?1 ORDER BY id ASC",
            SELECT_COLUMNS
        ))?;

        let rows = stmt.query_map(params![owner.as_str()], read_record)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Fetch one card, only if `owner` owns it
    pub fn get(&self, owner: &Owner, id: i64) -> Result<Option<ContactRecord>> {
        let conn = self.conn.lock();

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM contact_card WHERE id = ?1 AND user_email = ?2",
                    SELECT_COLUMNS
                ),
                params![id, owner.as_str()],
                read_record,
            )
            .optional()?;

        Ok(record)
    }

    /// Set one field of a card owned by `owner`
    pub fn update_field(
        &self,
        owner: &Owner,
        id: i64,
        field: ContactField,
        value: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            &format!(
                "UPDATE contact_card SET {} = ?1 WHERE id = ?2 AND user_email = ?3",
                field.column()
            ),
            params![value, id, owner.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound {
                kind: "contact_card".to_string(),
                id: id.to_string(),
            });
        }

        debug!("Updated {} of contact {}", field.column(), id);
        Ok(())
    }

    /// Delete a card owned by `owner`; false when nothing matched
    pub fn delete(&self, owner: &Owner, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM contact_card WHERE id = ?1 AND user_email = ?2",
            params![id, owner.as_str()],
        )?;

        if rows > 0 {
            debug!("Deleted contact {} of {}", id, owner);
        }
        Ok(rows > 0)
    }

    /// Number of cards owned by `owner`
    pub fn count(&self, owner: &Owner) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM contact_card WHERE user_email = ?1",
            params![owner.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Record counts per owner, for diagnostics
    pub fn owners(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT COALESCE(user_email, ''), COUNT(*) FROM contact_card \
             GROUP BY user_email ORDER BY user_email",
        )?;
        let rows = stmt.query_map([], |row| {
            let owner: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((owner, count as usize))
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

// The reference app leaves unset columns NULL, hence the Option reads.
fn read_record(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    Ok(ContactRecord {
        id: row.get(0)?,
        user_email: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        contact_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        contact_affiliation: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        contact_description: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        contact_image: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}
