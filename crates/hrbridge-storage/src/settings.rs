//! Persisted bridge preferences.
//!
//! Two values survive a reboot: the last authoritative target address and
//! the identity key. Both live in the `st` namespace of the `preferences`
//! table as raw blobs (6 bytes and 1 byte respectively).

use crate::error::{StorageError, StorageResult};
use chrono::Utc;
use hrbridge_core::{
    Address, IdentityKey,
    constants::{ADDR_SIZE, PREF_ADDR_KEY, PREF_NAME_MAP_KEY, PREF_NAMESPACE},
};
use sqlx::SqlitePool;
use tracing::debug;

/// Repository for the bridge's persisted preferences.
///
/// Every call is self-contained: it borrows a pooled connection, acts and
/// returns it. No locking is needed across calls.
///
/// # Examples
///
/// ```no_run
/// use hrbridge_core::{Address, IdentityKey};
/// use hrbridge_storage::{Database, SettingsRepository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::in_memory().await?;
/// let settings = SettingsRepository::new(db.pool().clone());
///
/// settings.set_target_address(Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])).await?;
/// settings.set_identity_key(IdentityKey::new(3)).await?;
/// assert_eq!(settings.identity_key().await?, Some(IdentityKey::new(3)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Create a new settings repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Last persisted target address, if any.
    ///
    /// # Errors
    /// `StorageError::CorruptValue` if the stored blob is not 6 bytes.
    pub async fn target_address(&self) -> StorageResult<Option<Address>> {
        let Some(value) = self.get(PREF_ADDR_KEY).await? else {
            return Ok(None);
        };
        let address = Address::from_slice(&value).map_err(|_| {
            StorageError::CorruptValue {
                key: PREF_ADDR_KEY,
                reason: format!("{} bytes, expected {}", value.len(), ADDR_SIZE),
            }
        })?;
        Ok(Some(address))
    }

    /// Persist the target address.
    pub async fn set_target_address(&self, address: Address) -> StorageResult<()> {
        self.put(PREF_ADDR_KEY, address.as_bytes()).await?;
        debug!("Persisted target address {}", address);
        Ok(())
    }

    /// Remove the persisted target address. Returns whether one was stored.
    pub async fn clear_target_address(&self) -> StorageResult<bool> {
        let removed = self.remove(PREF_ADDR_KEY).await?;
        debug!("Cleared persisted target address (present: {})", removed);
        Ok(removed)
    }

    /// Persisted identity key, if any.
    ///
    /// # Errors
    /// `StorageError::CorruptValue` if the stored blob is not 1 byte.
    pub async fn identity_key(&self) -> StorageResult<Option<IdentityKey>> {
        let Some(value) = self.get(PREF_NAME_MAP_KEY).await? else {
            return Ok(None);
        };
        match value.as_slice() {
            [key] => Ok(Some(IdentityKey::new(*key))),
            other => Err(StorageError::CorruptValue {
                key: PREF_NAME_MAP_KEY,
                reason: format!("{} bytes, expected 1", other.len()),
            }),
        }
    }

    /// Persist the identity key.
    pub async fn set_identity_key(&self, key: IdentityKey) -> StorageResult<()> {
        self.put(PREF_NAME_MAP_KEY, &[key.as_u8()]).await?;
        debug!("Persisted identity key {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM preferences WHERE namespace = ? AND key = ?")
                .bind(PREF_NAMESPACE)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (namespace, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(PREF_NAMESPACE)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM preferences WHERE namespace = ? AND key = ?")
            .bind(PREF_NAMESPACE)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
