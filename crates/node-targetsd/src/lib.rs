//! node-targetsd - keeps a scrape target file in sync with cluster nodes
//!
//! This daemon provides:
//! - Initial snapshot of cluster node membership
//! - Incremental updates from the node watch stream
//! - Resynchronization with backoff when the stream ends
//! - Atomic rewrites of the target file after every change

pub mod backoff;
pub mod config;
pub mod supervisor;
pub mod writer;

pub use backoff::{BackoffPolicy, ResyncBackoff};
pub use config::{Config, LogFormat};
pub use supervisor::{Supervisor, SupervisorError, SupervisorState, SupervisorStats};
pub use writer::{TargetFileWriter, WriteError};
