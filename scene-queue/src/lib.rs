//! Job orchestration for Scene Studio: the authoritative in-memory view of
//! live jobs, the FIFO work queue, and the bounded pool of cooperative
//! workers that drives each job through its handler.

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod queue;
pub mod registry;

pub use dispatcher::{annotate_payload, Dispatcher, DispatcherStats, StatsSnapshot};
pub use error::{DispatchError, DispatchResult, HandlerError};
pub use handler::{JobContext, JobHandler};
pub use queue::WorkQueue;
pub use registry::{JobRegistry, LiveJob};
