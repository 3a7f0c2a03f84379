//! Integration tests for the preferences database.
//!
//! Run with: cargo test --package hrbridge-storage --test integration_database

use hrbridge_core::{Address, IdentityKey};
use hrbridge_storage::{Database, DatabaseConfig, SettingsRepository};
use std::path::PathBuf;
use tempfile::TempDir;

const MONITOR: Address = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

fn database_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("hrbridge.db")
}

#[tokio::test]
async fn test_in_memory_database() {
    let db = Database::in_memory().await.unwrap();
    db.health_check().await.unwrap();
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db.migrate().await.unwrap();
    db.health_check().await.unwrap();
}

#[tokio::test]
async fn test_settings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = database_path(&dir);

    {
        let db = Database::new(DatabaseConfig::new(path.clone())).await.unwrap();
        let settings = SettingsRepository::new(db.pool().clone());
        settings.set_target_address(MONITOR).await.unwrap();
        settings.set_identity_key(IdentityKey::new(42)).await.unwrap();
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::new(path)).await.unwrap();
    let settings = SettingsRepository::new(db.pool().clone());
    assert_eq!(settings.target_address().await.unwrap(), Some(MONITOR));
    assert_eq!(
        settings.identity_key().await.unwrap(),
        Some(IdentityKey::new(42))
    );
    db.close().await;
}

#[tokio::test]
async fn test_missing_database_without_create() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig::new(database_path(&dir)).create_if_missing(false);
    assert!(Database::new(config).await.is_err());
}

#[tokio::test]
async fn test_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let db = Database::new(DatabaseConfig::new(database_path(&dir)))
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for key in 0..8u8 {
        let settings = SettingsRepository::new(db.pool().clone());
        tasks.spawn(async move { settings.set_identity_key(IdentityKey::new(key)).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let settings = SettingsRepository::new(db.pool().clone());
    let key = settings.identity_key().await.unwrap().unwrap();
    assert!(key.as_u8() < 8);
    db.close().await;
}
