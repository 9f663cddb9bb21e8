//! Seams to the host engine and network layer

use serde::{Deserialize, Serialize};

use crate::station::participant::ParticipantId;

/// How much the occupant's body may move while seated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mobility {
    /// Fully seated; desktop look-around is applied
    #[default]
    Immobile,
    /// Seated for vehicles; desktop look-around is applied
    ImmobilizeForVehicle,
    /// Occupant keeps full body mobility; the engine's own behavior is left alone
    Mobile,
}

/// Engine seat the station is bound to.
///
/// `occupy`/`release` ask the engine to seat or unseat someone; the engine
/// answers through the station's entry and exit callbacks, possibly later.
pub trait SeatPrimitive {
    fn occupy(&mut self, participant: ParticipantId);
    fn release(&mut self, participant: ParticipantId);
    fn mobility(&self) -> Mobility;
    /// Normal exit controls are disabled; the station offers jump-to-exit instead
    fn exit_disabled(&self) -> bool;
}

/// Owner-driven manual replication of the seat's synced state
pub trait SyncChannel {
    /// Serialize the synced state at the next opportunity
    fn request_serialization(&mut self);
    /// Hand ownership of the synced state to `participant`
    fn set_owner(&mut self, participant: ParticipantId);
    fn owner(&self) -> Option<ParticipantId>;
}
