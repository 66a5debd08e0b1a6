//! Redis-backed record store.
//!
//! Records survive restarts and are shared by every instance pointed at the
//! same Redis.
//!
//! ## Key layout
//!
//! - One set per subject: `{key_prefix}{subject}`
//! - Members are actor identifiers
//! - `SADD` returning 0 means the actor was already a member (conflict)
//! - `SCARD` is the count
//!
//! Both commands are atomic on the server, so uniqueness holds across
//! processes without client-side locking.
//!
//! ## Example
//!
//! ```rust,ignore
//! use escrow_gate::{RedisRecordStore, RedisRecordStoreConfig, UniqueActionGuard};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisRecordStoreConfig {
//!         key_prefix: "escrow:views:".to_string(),
//!     };
//!     let store = RedisRecordStore::connect_with_config("redis://127.0.0.1/", config).await?;
//!     let guard = UniqueActionGuard::new(store);
//!
//!     let outcome = guard.record_once("deal-17".into(), 42_i64.into()).await?;
//!     println!("views: {}", outcome.count);
//!     Ok(())
//! }
//! ```

use crate::application::ports::{StoreError, UniqueActionStore};
use crate::domain::record::{SubjectId, UniqueActionRecord};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;

/// Configuration for the Redis record store.
#[derive(Debug, Clone)]
pub struct RedisRecordStoreConfig {
    /// Key prefix for subject sets (default: "escrow-gate:records:")
    pub key_prefix: String,
}

impl Default for RedisRecordStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "escrow-gate:records:".to_string(),
        }
    }
}

/// Record store keeping one Redis set of actors per subject.
#[derive(Clone)]
pub struct RedisRecordStore {
    connection: ConnectionManager,
    config: RedisRecordStoreConfig,
}

impl fmt::Debug for RedisRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisRecordStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisRecordStore {
    /// Connect to Redis with default configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisRecordStoreConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect_with_config(
        url: &str,
        config: RedisRecordStoreConfig,
    ) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisRecordStoreConfig {
        &self.config
    }

    fn key(&self, subject: &SubjectId) -> String {
        format!("{}{}", self.config.key_prefix, subject)
    }
}

#[async_trait]
impl UniqueActionStore for RedisRecordStore {
    async fn insert(&self, record: UniqueActionRecord) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let added: i64 = conn
            .sadd(self.key(&record.subject_id), record.actor_id.as_str())
            .await
            .map_err(StoreError::backend)?;

        if added == 0 {
            Err(StoreError::Conflict)
        } else {
            Ok(())
        }
    }

    async fn count(&self, subject: &SubjectId) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        conn.scard(self.key(subject))
            .await
            .map_err(StoreError::backend)
    }
}
