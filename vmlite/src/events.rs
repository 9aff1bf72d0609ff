//! Event bus carrying asynchronous backend notifications to the controller.
//!
//! Many producers (the backend and whatever it spawns) hold an
//! [`EventSender`]; exactly one consumer owns the [`EventBus`]. Events from
//! a single sender are delivered once, in the order they were sent.

use tokio::sync::mpsc;
use vmlite_shared::errors::BackendFatal;

/// Notification emitted by the hypervisor backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmEvent {
    /// The guest shut itself down.
    GuestStopped,

    /// The backend hit an unrecoverable condition.
    Fatal(BackendFatal),
}

impl VmEvent {
    pub fn crashed(reason: impl Into<String>) -> Self {
        VmEvent::Fatal(BackendFatal::Crashed(reason.into()))
    }

    pub fn device_disconnected(device: impl Into<String>, reason: impl Into<String>) -> Self {
        VmEvent::Fatal(BackendFatal::DeviceDisconnected {
            device: device.into(),
            reason: reason.into(),
        })
    }
}

/// Producer half of the bus, handed to the backend.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<VmEvent>,
}

impl EventSender {
    /// Publish an event.
    ///
    /// Returns `false` once the consumer is gone; the event is dropped.
    pub fn send(&self, event: VmEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(?event, "event bus closed, dropping event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the bus. Single consumer by construction (not `Clone`).
#[derive(Debug)]
pub struct EventBus {
    rx: mpsc::UnboundedReceiver<VmEvent>,
}

impl EventBus {
    pub fn channel() -> (EventSender, EventBus) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender { tx }, EventBus { rx })
    }

    /// Wait for the next event. `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<VmEvent> {
        self.rx.recv().await
    }
}
