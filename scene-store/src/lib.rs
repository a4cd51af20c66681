//! Durable persistence for Scene Studio.
//!
//! One SQLite database holds the jobs table (the crash-recovery source of
//! truth), the renders table, and the content-addressed assets cache. The
//! credits ledger shares the same pool but lives in its own crate.

pub mod assets;
pub mod error;
pub mod jobs;
pub mod pool;
pub mod renders;

pub use assets::AssetsCacheStore;
pub use error::{StoreError, StoreResult};
pub use jobs::{JobFilter, JobStore};
pub use pool::connect;
pub use renders::RenderStore;
