//! Cache layer
//!
//! Public read endpoints cache their JSON payloads in a process-local
//! [`MemoryCache`] (moka). Writes invalidate by key prefix pattern. Readers
//! capture the cache generation before querying and store the result with
//! `set_if_unchanged`, so a load that raced a write is never cached.
//!
//! ```rust,ignore
//! use tradepost::cache::MemoryCache;
//!
//! let cache = MemoryCache::from_config(&config.cache);
//! let generation = cache.generation();
//! let ads = load_ads().await?;
//! cache.set_if_unchanged("ads:sidebar", &ads, generation).await?;
//! cache.delete_pattern("ads:*").await;
//! ```

mod memory;

pub use memory::MemoryCache;

/// Cache key for the live ads of a placement
pub fn ads_key(placement: &str) -> String {
    format!("ads:{}", placement)
}

/// Pattern matching every ads key
pub const ADS_PATTERN: &str = "ads:*";
