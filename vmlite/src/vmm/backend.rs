//! VmBackend trait for hypervisor-specific VM implementations.

use vmlite_shared::errors::VmliteResult;

/// Operations the controller needs from a hypervisor.
///
/// Implementations report asynchronous conditions (guest shutdown, crashes,
/// device loss) through the `EventSender` they were constructed with, not
/// through these methods.
#[async_trait::async_trait]
pub trait VmBackend: Send + Sync {
    /// Boot the VM. Resolves once the hypervisor confirms the VM is running.
    async fn start(&self) -> VmliteResult<()>;

    /// Whether the guest can be asked to shut down politely right now.
    fn can_request_stop(&self) -> bool;

    /// Ask the guest to shut down. Returns once the request is delivered,
    /// not once the guest is down.
    fn request_stop(&self) -> VmliteResult<()>;

    /// Whether the VM can be forcibly stopped right now.
    fn can_stop(&self) -> bool;

    /// Tear the VM down. Resolves once the hypervisor confirms it is gone.
    async fn force_stop(&self) -> VmliteResult<()>;
}

/// Opaque reference to the one VM a controller manages.
pub struct VmHandle {
    name: String,
    backend: Box<dyn VmBackend>,
}

impl VmHandle {
    pub fn new(name: impl Into<String>, backend: Box<dyn VmBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn backend(&self) -> &dyn VmBackend {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for VmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmHandle").field("name", &self.name).finish()
    }
}
