//! vmlite - a minimal virtual machine lifecycle controller.
//!
//! The controller owns exactly one VM. It starts the VM through a
//! [`VmBackend`](vmm::VmBackend), stops it gracefully then forcibly,
//! reacts to asynchronous backend events and reports the final outcome
//! through a single-shot [`ProcessExitPolicy`](exit::ProcessExitPolicy).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vmlite::events::EventBus;
//! use vmlite::exit::{ExitSignal, ProcessExitPolicy};
//! use vmlite::lifecycle::LifecycleController;
//! use vmlite::runtime::{VmConfig, VmliteOptions};
//! use vmlite::vmm::{ProcessBackend, VmHandle};
//!
//! # async fn run() -> vmlite::VmliteResult<i32> {
//! let options = VmliteOptions::default();
//! let dir = options.vm_dir("debian");
//! let config = dir.load_config()?;
//!
//! let (events_tx, events) = EventBus::channel();
//! let backend = ProcessBackend::new("debian", &config, events_tx);
//! let (sink, exit_rx) = ExitSignal::new();
//!
//! let controller = Arc::new(LifecycleController::new(
//!     VmHandle::new("debian", Box::new(backend)),
//!     ProcessExitPolicy::new(Arc::new(sink)),
//!     config.shutdown.clone(),
//! ));
//! controller.listen(events);
//! controller.start().await?;
//! Ok(exit_rx.wait().await)
//! # }
//! ```

pub mod events;
pub mod exit;
pub mod lifecycle;
pub mod runtime;
pub mod util;
pub mod vmm;

pub use vmlite_shared::{
    BackendFatal, StartError, StopError, VmState, VmliteError, VmliteResult,
};
