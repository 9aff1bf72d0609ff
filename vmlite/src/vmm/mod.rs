//! Hypervisor backend abstraction.

pub mod backend;
pub mod process;

pub use backend::{VmBackend, VmHandle};
pub use process::ProcessBackend;
