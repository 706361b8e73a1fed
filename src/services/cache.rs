use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

const DEFAULT_TTL: u64 = 86400; // 24 hours in seconds

/// JSON cache over Redis. Constructed from an optional connection: when
/// no Redis is configured every read misses and every write is a no-op.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<ConnectionManager>,
}

impl CacheService {
    pub fn new(redis: Option<ConnectionManager>) -> Self {
        Self { redis }
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let mut conn = redis.clone();
        let data: Option<String> = conn.get(key).await?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Set a value in cache with TTL
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };

        let mut conn = redis.clone();
        let json = serde_json::to_string(value)?;
        let _: () = conn
            .set_ex(key, json, ttl_seconds.unwrap_or(DEFAULT_TTL))
            .await?;
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<()> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };

        let mut conn = redis.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Cache key builders for consistent naming
    pub fn lastfm_similar_key(artist: &str, title: &str) -> String {
        format!("lastfm:similar:{}:{}", artist, title)
    }

    pub fn youtube_search_key(query: &str) -> String {
        format!("yt:search:{}", query)
    }

    pub fn spotify_state_key(state: &str) -> String {
        format!("spotify:state:{}", state)
    }
}
