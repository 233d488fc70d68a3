//! Key-value backends the storage layer runs on
//!
//! Redis is the production backend. The in-memory backend mirrors the
//! subset of Redis semantics used here (string keys with optional TTL,
//! counters, sets) for local development and tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::info;

/// Minimal key-value operations needed by [`crate::storage::Storage`]
#[async_trait]
pub trait Backend: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>>;

    async fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Set a key that expires after `ttl_secs`
    async fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Set only if the key does not exist. Returns true if the key was set.
    async fn set_nx(&mut self, key: &str, value: &str) -> Result<bool>;

    /// Returns true if a key was removed
    async fn del(&mut self, key: &str) -> Result<bool>;

    /// Increment a counter, returning the new value
    async fn incr(&mut self, key: &str) -> Result<u64>;

    async fn sadd(&mut self, set: &str, member: &str) -> Result<()>;

    async fn srem(&mut self, set: &str, member: &str) -> Result<()>;

    async fn smembers(&mut self, set: &str) -> Result<Vec<String>>;
}

/// Redis-backed storage
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn.get(key).await?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let _: () = self.conn.set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn set_nx(&mut self, key: &str, value: &str) -> Result<bool> {
        let created: bool = self.conn.set_nx(key, value).await?;
        Ok(created)
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        let removed: u64 = self.conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn incr(&mut self, key: &str) -> Result<u64> {
        let value: u64 = self.conn.incr(key, 1u64).await?;
        Ok(value)
    }

    async fn sadd(&mut self, set: &str, member: &str) -> Result<()> {
        let _: () = self.conn.sadd(set, member).await?;
        Ok(())
    }

    async fn srem(&mut self, set: &str, member: &str) -> Result<()> {
        let _: () = self.conn.srem(set, member).await?;
        Ok(())
    }

    async fn smembers(&mut self, set: &str) -> Result<Vec<String>> {
        let members: Vec<String> = self.conn.smembers(set).await?;
        Ok(members)
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local backend
#[derive(Default)]
pub struct MemoryBackend {
    strings: HashMap<String, Entry>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.strings.get(key).is_some_and(|e| !e.is_live(now)) {
            self.strings.remove(key);
        }
        self.strings.get(key)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key).map(|e| e.value.clone()))
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&mut self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn set_nx(&mut self, key: &str, value: &str) -> Result<bool> {
        if self.live(key).is_some() {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        let had_string = self.live(key).is_some();
        self.strings.remove(key);
        let had_set = self.sets.remove(key).is_some();
        Ok(had_string || had_set)
    }

    async fn incr(&mut self, key: &str) -> Result<u64> {
        let current = match self.live(key) {
            Some(entry) => entry
                .value
                .parse::<u64>()
                .with_context(|| format!("Value at {} is not an integer", key))?,
            None => 0,
        };
        let next = current + 1;
        self.set(key, &next.to_string()).await?;
        Ok(next)
    }

    async fn sadd(&mut self, set: &str, member: &str) -> Result<()> {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&mut self, set: &str, member: &str) -> Result<()> {
        if let Some(members) = self.sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                self.sets.remove(set);
            }
        }
        Ok(())
    }

    async fn smembers(&mut self, set: &str) -> Result<Vec<String>> {
        Ok(self
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_nx_and_del() {
        let mut backend = MemoryBackend::new();

        assert!(backend.set_nx("pending:Gladfields", "1").await.unwrap());
        assert!(!backend.set_nx("pending:Gladfields", "2").await.unwrap());
        assert_eq!(
            backend.get("pending:Gladfields").await.unwrap().as_deref(),
            Some("1")
        );

        assert!(backend.del("pending:Gladfields").await.unwrap());
        assert!(!backend.del("pending:Gladfields").await.unwrap());
        assert!(backend.get("pending:Gladfields").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_ttl_expiry() {
        let mut backend = MemoryBackend::new();

        backend.set_with_ttl("cart:a", "{}", 0).await.unwrap();
        assert!(backend.get("cart:a").await.unwrap().is_none());

        backend.set_with_ttl("cart:b", "{}", 60).await.unwrap();
        assert!(backend.get("cart:b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_counters_and_sets() {
        let mut backend = MemoryBackend::new();

        assert_eq!(backend.incr("ids").await.unwrap(), 1);
        assert_eq!(backend.incr("ids").await.unwrap(), 2);

        backend.sadd("items", "2").await.unwrap();
        backend.sadd("items", "1").await.unwrap();
        backend.sadd("items", "1").await.unwrap();
        assert_eq!(backend.smembers("items").await.unwrap(), vec!["1", "2"]);

        backend.srem("items", "1").await.unwrap();
        backend.srem("items", "2").await.unwrap();
        assert!(backend.smembers("items").await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_set_nx() {
        let mut backend = RedisBackend::connect("redis://127.0.0.1:6379/15")
            .await
            .expect("Failed to connect to test Redis");

        backend.del("test:set_nx").await.unwrap();
        assert!(backend.set_nx("test:set_nx", "1").await.unwrap());
        assert!(!backend.set_nx("test:set_nx", "2").await.unwrap());
        backend.del("test:set_nx").await.unwrap();
    }
}
