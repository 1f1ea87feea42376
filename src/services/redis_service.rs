// src/services/redis_service.rs
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::errors::BoothError;
use crate::services::quota::QuotaStore;

const KEY_PREFIX: &str = "themebooth";

fn namespaced(key: &str) -> String {
    format!("{}:{}", KEY_PREFIX, key)
}

/// Quota counter kept in Redis, for installations sharing one allowance.
pub struct RedisQuotaStore {
    client: Client,
}

impl RedisQuotaStore {
    pub async fn new(redis_url: &str) -> Result<Self, BoothError> {
        let client = Client::open(redis_url).map_err(|e| BoothError::Redis(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| BoothError::Redis(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| BoothError::Redis(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoothError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BoothError::Redis(e.to_string()))?;

        conn.get(namespaced(key))
            .await
            .map_err(|e| BoothError::Redis(format!("Failed to read {}: {}", key, e)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoothError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BoothError::Redis(e.to_string()))?;

        conn.set::<_, _, ()>(namespaced(key), value)
            .await
            .map_err(|e| BoothError::Redis(format!("Failed to write {}: {}", key, e)))
    }

    async fn reset(&self, key: &str) -> Result<(), BoothError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BoothError::Redis(e.to_string()))?;

        conn.del::<_, ()>(namespaced(key))
            .await
            .map_err(|e| BoothError::Redis(format!("Failed to clear {}: {}", key, e)))
    }
}
