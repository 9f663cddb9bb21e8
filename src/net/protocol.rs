use serde::{Deserialize, Serialize};

use crate::station::participant::ParticipantId;
use crate::util::vec3::Vec3;

/// Messages exchanged between clients about one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StationMessage {
    /// Authority's synced seat offset
    SeatSync { offset: Vec3 },
    /// Ownership of the synced state moved
    OwnershipTransferred { new_owner: ParticipantId },
    /// Engine seated a participant
    SeatEntered { participant: ParticipantId },
    /// Engine unseated a participant
    SeatExited { participant: ParticipantId },
}

/// A message tagged with its sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: ParticipantId,
    /// Per-sender sequence number, strictly increasing
    pub sequence: u64,
    pub message: StationMessage,
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}
