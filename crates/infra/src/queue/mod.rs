//! Asynchronous job execution

pub mod error;
pub mod tokio_queue;

pub use error::{QueueError, QueueResult};
pub use tokio_queue::{QueueConfig, TokioJobQueue};
