//! In-process network for simulating several clients of one station
//!
//! Every client gets its own FIFO inbox, so delivery is in order per sender
//! but clients drain their inboxes whenever they like; there is no global
//! order across senders. Messages travel bincode-encoded, as they would on a
//! real wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::net::protocol::{decode, encode, Envelope, StationMessage};
use crate::station::engine::SyncChannel;
use crate::station::participant::ParticipantId;

#[derive(Default)]
struct HubInner {
    peers: RwLock<Vec<(ParticipantId, Sender<Vec<u8>>)>>,
    /// Network-wide owner of the station's synced state
    owner: Mutex<Option<ParticipantId>>,
}

/// Shared routing table for all simulated clients
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a client and return its endpoint
    pub fn connect(&self, id: ParticipantId) -> LoopbackEndpoint {
        let (sender, inbox) = unbounded();
        self.inner.peers.write().push((id, sender));
        debug!("Loopback peer {} connected", id);

        LoopbackEndpoint {
            link: LoopbackLink {
                id,
                hub: self.clone(),
                sequence: Arc::new(AtomicU64::new(0)),
            },
            inbox,
            serialization_pending: false,
        }
    }

    /// Detach a client; messages to it are dropped from now on
    pub fn disconnect(&self, id: ParticipantId) {
        self.inner.peers.write().retain(|(peer, _)| *peer != id);
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        *self.inner.owner.lock()
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().len()
    }
}

/// Sending half of a client's connection. Clones share the sequence counter.
#[derive(Clone)]
pub struct LoopbackLink {
    id: ParticipantId,
    hub: LoopbackHub,
    sequence: Arc<AtomicU64>,
}

impl LoopbackLink {
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Send to every connected client, optionally including the sender.
    /// Returns the number of inboxes reached.
    pub fn broadcast(&self, message: StationMessage, include_self: bool) -> usize {
        let envelope = Envelope {
            from: self.id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            message,
        };
        let bytes = match encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Peer {} failed to encode {:?}: {}", self.id, envelope.message, e);
                return 0;
            }
        };

        let peers = self.hub.inner.peers.read();
        let mut reached = 0;
        for (peer, sender) in peers.iter() {
            if *peer == self.id && !include_self {
                continue;
            }
            if sender.send(bytes.clone()).is_ok() {
                reached += 1;
            } else {
                debug!("Peer {} inbox closed, dropping message from {}", peer, self.id);
            }
        }
        reached
    }
}

/// A client's connection: sync channel for its station plus an inbox
pub struct LoopbackEndpoint {
    link: LoopbackLink,
    inbox: Receiver<Vec<u8>>,
    serialization_pending: bool,
}

impl LoopbackEndpoint {
    pub fn id(&self) -> ParticipantId {
        self.link.id
    }

    pub fn link(&self) -> LoopbackLink {
        self.link.clone()
    }

    /// Whether the station asked for serialization since the last call
    pub fn take_serialization_request(&mut self) -> bool {
        std::mem::take(&mut self.serialization_pending)
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Everything received so far, in arrival order. Undecodable payloads are skipped.
    pub fn drain(&self) -> Vec<Envelope> {
        self.inbox
            .try_iter()
            .filter_map(|bytes| match decode::<Envelope>(&bytes) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!("Peer {} dropped undecodable message: {}", self.link.id, e);
                    None
                }
            })
            .collect()
    }
}

impl SyncChannel for LoopbackEndpoint {
    fn request_serialization(&mut self) {
        self.serialization_pending = true;
    }

    /// The hub plays the ownership server: notifications are broadcast under
    /// the owner lock so every client sees transfers in the same order.
    fn set_owner(&mut self, participant: ParticipantId) {
        let mut owner = self.link.hub.inner.owner.lock();
        *owner = Some(participant);
        self.link
            .broadcast(StationMessage::OwnershipTransferred { new_owner: participant }, true);
    }

    fn owner(&self) -> Option<ParticipantId> {
        self.link.hub.owner()
    }
}
