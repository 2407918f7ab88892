pub mod clienv;
pub mod config_store;
pub mod daemon;
pub mod error;
pub mod installer;
pub mod settings;

pub use config_store::{ConfigStore, CorsPolicy, JsonObjectExt, NodeConfig};
pub use daemon::{Dispatch, LifecycleCommand, LifecycleManager, NodeState, NodeStatus};
pub use error::{Result, WardenError};
pub use installer::{BinaryInstaller, BinaryVariant, Installer};
pub use settings::{NodePaths, WardenSettings};
