pub mod quote_cache;

pub use quote_cache::{CacheStats, CacheTtl, CachedQuote, QuoteCache};
