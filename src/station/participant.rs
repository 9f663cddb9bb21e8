use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Network-assigned participant id. Also the ordering key for seat conflicts:
/// the lower id wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A participant as seen from this client's simulation
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// True for the participant this client simulates
    pub is_local: bool,
    /// Using a head-mounted display
    pub in_vr: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, name: impl Into<String>, is_local: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_local,
            in_vr: false,
        }
    }

    pub fn with_vr(mut self, in_vr: bool) -> Self {
        self.in_vr = in_vr;
        self
    }
}

/// Participants currently present in the world.
///
/// The seat only stores ids; anything it needs about a participant is looked
/// up here, so a participant leaving the world never dangles.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
    local: Option<ParticipantId>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a participant. Registering a local participant makes it
    /// the local identity.
    pub fn join(&mut self, participant: Participant) {
        if participant.is_local {
            if let Some(previous) = self.local.filter(|id| *id != participant.id) {
                tracing::warn!("Replacing local participant {} with {}", previous, participant.id);
                if let Some(old) = self.participants.get_mut(&previous) {
                    old.is_local = false;
                }
            }
            self.local = Some(participant.id);
        }
        self.participants.insert(participant.id, participant);
    }

    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        if self.local == Some(id) {
            self.local = None;
        }
        self.participants.remove(&id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local
    }

    pub fn local(&self) -> Option<&Participant> {
        self.local.and_then(|id| self.participants.get(&id))
    }

    pub fn is_local(&self, id: ParticipantId) -> bool {
        self.local == Some(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
