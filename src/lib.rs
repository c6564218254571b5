//! Client library for accounting APIs (estimates, invoices, receipts and
//! expenses) built around a keyed query cache.
//!
//! ```ignore
//! let cache = QueryCache::new();
//! let transport = Arc::new(HttpTransport::new(&config.api, token.as_deref())?);
//! let client = Client::new(cache, transport, Arc::new(LogNotifier));
//!
//! let mut estimates = client.estimates().list(&ListQuery::default());
//! println!("{} estimates", estimates.settled().await.pagination.total);
//!
//! client.estimates().approve(7).await?;
//! ```

pub mod cache;
pub mod config;
pub mod notify;
pub mod query;
pub mod resources;
pub mod transport;

pub use cache::{QueryCache, QueryKey};
pub use query::Query;
pub use resources::Client;
