//! Remote profile API
//!
//! # Components
//!
//! - `ProfileSource`: the seam the crawl coordinator fetches profiles through
//! - `WikiTreeClient`: the rate-limited, retrying HTTP implementation
//! - `RateLimiter`: minimum-interval limiter shared by all requests
//! - `Profile`: leniently decoded person record

mod client;
mod profile;
mod rate_limit;

use crate::ApiResult;

pub use client::{build_http_client, WikiTreeClient, DEFAULT_RETRY_AFTER};
pub use profile::{
    decode_profile_list_response, decode_profile_response, Profile, ANCESTOR_FIELDS,
    DESCENDANT_FIELDS, PROFILE_FIELDS,
};
pub use rate_limit::RateLimiter;

/// Source of WikiTree profiles
///
/// Implementations own rate limiting and retries; callers see one result
/// per logical request.
#[allow(async_fn_in_trait)]
pub trait ProfileSource {
    /// Fetches one profile with its relatives
    async fn get_profile(&self, wiki_id: &str) -> ApiResult<Profile>;

    /// Fetches the descendant tree below `wiki_id`, `depth` generations deep
    async fn get_descendants(&self, wiki_id: &str, depth: u32) -> ApiResult<Vec<Profile>>;

    /// Fetches the ancestor tree above `wiki_id`, `depth` generations deep
    async fn get_ancestors(&self, wiki_id: &str, depth: u32) -> ApiResult<Vec<Profile>>;

    /// Number of HTTP requests actually sent
    fn request_count(&self) -> u64;
}
