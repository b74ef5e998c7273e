//! SQLite backend implementation.

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::schema::SCHEMA;
use crate::schedule::ScheduleCode;

use super::subscriptions::{
    dedup_days, Location, OwnerId, StoreError, Subscription, SubscriptionFields,
    MAX_SUBSCRIPTIONS_PER_OWNER,
};

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Subscription store. Every public operation is one atomic call; the
/// connection is shared behind a mutex so the store can be used from the bot
/// loop and the scheduler at once.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        self.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a transaction open:
        // rusqlite rolls back when the Transaction is dropped.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Subscription operations
    // ========================================================================

    /// Insert a subscription, or replace the fields of the owner's existing
    /// subscription at the same rounded location.
    ///
    /// Fails with [`StoreError::CapExceeded`] when the owner already watches
    /// the maximum number of *other* locations.
    pub fn add_subscription(
        &self,
        owner_id: OwnerId,
        location: Location,
        fields: &SubscriptionFields,
    ) -> Result<(), StoreError> {
        let location = Location::new(location.x, location.y);
        let days_json = serde_json::to_string(&dedup_days(&fields.sweep_days))?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let others: i64 = tx.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE owner_id = ? AND NOT (x = ? AND y = ?)",
            rusqlite::params![owner_id, location.x, location.y],
            |row| row.get(0),
        )?;
        if others >= MAX_SUBSCRIPTIONS_PER_OWNER as i64 {
            return Err(StoreError::CapExceeded {
                cap: MAX_SUBSCRIPTIONS_PER_OWNER,
            });
        }

        tx.execute(
            r#"
            INSERT INTO subscriptions (
                owner_id, x, y, label, sweep_days, sweep_schedule, sweep_time, street_name
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, x, y) DO UPDATE SET
                label = excluded.label,
                sweep_days = excluded.sweep_days,
                sweep_schedule = excluded.sweep_schedule,
                sweep_time = excluded.sweep_time,
                street_name = excluded.street_name,
                created_at = excluded.created_at
            "#,
            rusqlite::params![
                owner_id,
                location.x,
                location.y,
                fields.label,
                days_json,
                fields.sweep_schedule.as_str(),
                fields.sweep_time,
                fields.street_name,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove one of the owner's subscriptions. Returns rows deleted (0 or 1).
    pub fn remove_subscription(&self, owner_id: OwnerId, id: i64) -> Result<usize, StoreError> {
        let deleted = self.lock().execute(
            "DELETE FROM subscriptions WHERE owner_id = ? AND id = ?",
            rusqlite::params![owner_id, id],
        )?;
        Ok(deleted)
    }

    /// Remove every subscription the owner holds. Returns rows deleted.
    pub fn remove_all_subscriptions(&self, owner_id: OwnerId) -> Result<usize, StoreError> {
        let deleted = self
            .lock()
            .execute("DELETE FROM subscriptions WHERE owner_id = ?", [owner_id])?;
        Ok(deleted)
    }

    /// The owner's subscriptions in insertion order.
    pub fn get_owner_subscriptions(&self, owner_id: OwnerId) -> Result<Vec<Subscription>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, x, y, label, sweep_days, sweep_schedule,
                   sweep_time, street_name, created_at
            FROM subscriptions
            WHERE owner_id = ?
            ORDER BY id
            "#,
        )?;
        let subs = stmt
            .query_map([owner_id], row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    /// Every subscription, in insertion order. Used by the notification run.
    pub fn get_all_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, x, y, label, sweep_days, sweep_schedule,
                   sweep_time, street_name, created_at
            FROM subscriptions
            ORDER BY id
            "#,
        )?;
        let subs = stmt
            .query_map([], row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    pub fn count_subscriptions(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Helper to convert a row to Subscription. A `sweep_days` column that is not
/// a JSON list of names fails the whole read instead of dropping the days.
fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    let days_json: String = row.get(5)?;
    let sweep_days = serde_json::from_str::<Vec<String>>(&days_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Subscription {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        location: Location {
            x: row.get(2)?,
            y: row.get(3)?,
        },
        label: row.get(4)?,
        sweep_days,
        sweep_schedule: ScheduleCode::new(row.get::<_, String>(6)?),
        sweep_time: row.get(7)?,
        street_name: row.get(8)?,
        created_at: row.get(9)?,
    })
}
