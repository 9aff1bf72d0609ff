//! On-disk runtime state: options, per-VM directories, config and locks.

pub mod config;
pub mod layout;
pub mod lock;
pub mod options;

pub use config::{BackendCommand, VmConfig};
pub use layout::VmDir;
pub use lock::VmLock;
pub use options::{ShutdownOptions, VmliteOptions};
