//! Web source plumbing: search provider and page-text fetcher.
//!
//! Both are enums over concrete backends, mirroring the LLM provider
//! abstraction — a real HTTP implementation plus a static fixture variant
//! for tests. Neither surface returns a `Result`: the search contract
//! signals failure through a sentinel list (see [`search`]) and a scrape
//! that yields nothing usable is an empty string, not an error.

pub mod scrape;
pub mod search;

pub use scrape::PageFetcher;
pub use search::{SearchProvider, is_error_sentinel};
