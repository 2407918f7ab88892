//! Node daemon supervision
//!
//! Handles:
//! - Binary launch with `IPFS_PATH` and output capture
//! - The init → configure → daemon start sequence
//! - Stop, restart and exit requests from the host
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            LifecycleManager              │
//! ├──────────────────────────────────────────┤
//! │ Installer │ ConfigStore │ ProcessRunner  │
//! ├──────────────────────────────────────────┤
//! │   goipfs init   │   goipfs daemon        │
//! │   (awaited)     │   (tracked, streamed)  │
//! └──────────────────────────────────────────┘
//! ```

pub mod lifecycle;
pub mod log_buffer;
pub mod process;
pub mod state;

pub use lifecycle::LifecycleManager;
pub use log_buffer::LogBuffer;
pub use process::{BinaryRunner, LineConsumer, NodeProcess, ProcessHandle, ProcessRunner};
pub use state::{Dispatch, LifecycleCommand, NodeState, NodeStatus};
