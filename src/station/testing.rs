//! Recording engine doubles for unit tests

use crate::station::engine::{Mobility, SeatPrimitive, SyncChannel};
use crate::station::participant::ParticipantId;

#[derive(Debug, Default)]
pub struct RecordingSeat {
    pub occupied: Vec<ParticipantId>,
    pub released: Vec<ParticipantId>,
    pub mobility: Mobility,
    pub exit_disabled: bool,
}

impl SeatPrimitive for RecordingSeat {
    fn occupy(&mut self, participant: ParticipantId) {
        self.occupied.push(participant);
    }

    fn release(&mut self, participant: ParticipantId) {
        self.released.push(participant);
    }

    fn mobility(&self) -> Mobility {
        self.mobility
    }

    fn exit_disabled(&self) -> bool {
        self.exit_disabled
    }
}

#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub serialization_requests: usize,
    pub owner_requests: Vec<ParticipantId>,
    pub owner: Option<ParticipantId>,
}

impl SyncChannel for RecordingChannel {
    fn request_serialization(&mut self) {
        self.serialization_requests += 1;
    }

    fn set_owner(&mut self, participant: ParticipantId) {
        self.owner_requests.push(participant);
    }

    fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }
}
