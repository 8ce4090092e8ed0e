//! Courtside Seen-Key Store
//!
//! Append-only set of event keys that have already produced an alert.
//! Two backends share the [`SeenKeyStore`] trait:
//! - PostgreSQL wire protocol via a pooled `tokio-postgres` client
//! - In-memory `DashMap`, optionally bounded by a retention window

mod error;
mod memory;
mod pool;
mod postgres;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemorySeenKeyStore;
pub use pool::{PoolConfig, StorePool};
pub use postgres::PgSeenKeyStore;
pub use store::SeenKeyStore;
