//! vmlite shared - types used by both the controller library and the CLI.
//!
//! Holds the VM state machine definition, the error taxonomy and the
//! constants that form the process boundary contract (exit codes, paths).

pub mod constants;
pub mod errors;
pub mod state;

pub use errors::{BackendFatal, StartError, StopError, VmliteError, VmliteResult};
pub use state::VmState;
