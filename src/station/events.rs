//! Occupancy notifications for external collaborators ("informants")

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Occupancy change delivered to informants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationEvent {
    LocalEntered,
    LocalExited,
    RemoteEntered,
    RemoteExited,
}

impl StationEvent {
    /// Event name as informants know it
    pub fn name(&self) -> &'static str {
        match self {
            StationEvent::LocalEntered => "LocalPlayerEntered",
            StationEvent::LocalExited => "LocalPlayerExited",
            StationEvent::RemoteEntered => "RemotePlayerEntered",
            StationEvent::RemoteExited => "RemotePlayerExited",
        }
    }
}

impl fmt::Display for StationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of occupancy notifications
pub trait StationInformant: Send {
    fn receive(&mut self, event: StationEvent) -> Result<(), InformantError>;
}

/// Any `FnMut(StationEvent)` is an infallible informant
impl<F> StationInformant for F
where
    F: FnMut(StationEvent) + Send,
{
    fn receive(&mut self, event: StationEvent) -> Result<(), InformantError> {
        self(event);
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InformantError {
    #[error("informant is not responding")]
    Unresponsive,
    #[error("informant rejected {event}: {reason}")]
    Rejected { event: StationEvent, reason: String },
}

/// Slot returned by [`EventNotifier::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InformantHandle(usize);

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub absent: usize,
}

/// Fans events out to informants in registration order.
///
/// Delivery is failure-isolated: an informant that errors or panics is
/// skipped and the remaining informants still receive the event.
#[derive(Default)]
pub struct EventNotifier {
    informants: Vec<Option<Box<dyn StationInformant>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, informant: impl StationInformant + 'static) -> InformantHandle {
        self.informants.push(Some(Box::new(informant)));
        InformantHandle(self.informants.len() - 1)
    }

    /// Remove an informant. Its slot stays empty so other handles remain valid.
    pub fn unregister(&mut self, handle: InformantHandle) -> bool {
        match self.informants.get_mut(handle.0) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Number of live informants
    pub fn len(&self) -> usize {
        self.informants.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&mut self, event: StationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for (index, slot) in self.informants.iter_mut().enumerate() {
            let Some(informant) = slot.as_mut() else {
                report.absent += 1;
                continue;
            };

            match panic::catch_unwind(AssertUnwindSafe(|| informant.receive(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Informant {} failed on {}: {}", index, event, e);
                    report.failed += 1;
                }
                Err(_) => {
                    warn!("Informant {} panicked on {}", index, event);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Broadcast {}: delivered={} failed={} absent={}",
            event, report.delivered, report.failed, report.absent
        );
        report
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("informants", &self.len())
            .finish()
    }
}
