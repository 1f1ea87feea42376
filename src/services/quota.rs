// src/services/quota.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{debug, info, warn};

use crate::errors::BoothError;

pub const COUNT_KEY: &str = "generation_count";
pub const RESET_KEY: &str = "generation_reset_timestamp";
pub const QUOTA_EXHAUSTED: &str = "You've reached your generation limit for today.";

/// String key/value persistence for the daily counter.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BoothError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), BoothError>;
    async fn reset(&self, key: &str) -> Result<(), BoothError>;
}

/// Remaining batch starts for the current window, plus when the window ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub resets_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DailyQuota {
    store: Arc<dyn QuotaStore>,
    max: u32,
}

impl DailyQuota {
    pub fn new(store: Arc<dyn QuotaStore>, max: u32) -> Self {
        Self { store, max }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Reads the counter, clearing it first if its reset time has passed.
    pub async fn status(&self, now: DateTime<Utc>) -> Result<QuotaStatus, BoothError> {
        let resets_at = match self.store.get(RESET_KEY).await? {
            Some(raw) => parse_millis(&raw),
            None => None,
        };

        if let Some(at) = resets_at {
            if now >= at {
                info!("Daily quota window elapsed; restoring {} generations", self.max);
                self.store.reset(COUNT_KEY).await?;
                self.store.reset(RESET_KEY).await?;
                return Ok(QuotaStatus {
                    remaining: self.max,
                    resets_at: None,
                });
            }
        }

        let remaining = match self.store.get(COUNT_KEY).await? {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!("Ignoring unreadable quota count {:?}", raw);
                self.max
            }),
            None => self.max,
        };

        Ok(QuotaStatus {
            remaining,
            resets_at,
        })
    }

    pub async fn remaining(&self, now: DateTime<Utc>) -> Result<u32, BoothError> {
        Ok(self.status(now).await?.remaining)
    }

    /// Consumes one batch start. Starts the 24 h window if none is running.
    pub async fn debit(&self, now: DateTime<Utc>) -> Result<QuotaStatus, BoothError> {
        let status = self.status(now).await?;
        if status.remaining == 0 {
            return Err(BoothError::Validation(QUOTA_EXHAUSTED.to_string()));
        }

        let resets_at = match status.resets_at {
            Some(at) => at,
            None => {
                let at = now + Duration::hours(24);
                self.store
                    .set(RESET_KEY, &at.timestamp_millis().to_string())
                    .await?;
                at
            }
        };

        let remaining = status.remaining - 1;
        self.store.set(COUNT_KEY, &remaining.to_string()).await?;
        debug!("Quota debited; {} remaining until {}", remaining, resets_at);

        Ok(QuotaStatus {
            remaining,
            resets_at: Some(resets_at),
        })
    }
}

fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Debug, Default)]
pub struct MemoryQuotaStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, BoothError> {
        self.entries
            .lock()
            .map_err(|_| BoothError::Storage("Quota store lock poisoned".to_string()))
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoothError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoothError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<(), BoothError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Keeps the counter in a small JSON object on disk.
pub struct FileQuotaStore {
    path: PathBuf,
    guard: tokio::sync::Mutex<()>,
}

impl FileQuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, BoothError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(BoothError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), BoothError> {
        let json = serde_json::to_vec_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            BoothError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            BoothError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl QuotaStore for FileQuotaStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoothError> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoothError> {
        let _guard = self.guard.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn reset(&self, key: &str) -> Result<(), BoothError> {
        let _guard = self.guard.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.save(&entries).await?;
        }
        Ok(())
    }
}
