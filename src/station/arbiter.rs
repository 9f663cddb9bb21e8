//! Seat occupancy arbitration
//!
//! Entry and exit callbacks from the engine are the only writers of the seat's
//! occupant. Two participants can claim the seat at nearly the same time on
//! different clients; every client resolves the conflict the same way, so the
//! participant with the lower id ends up seated everywhere.
//!
//! A losing remote occupant is not evicted at the primitive level here. Its
//! own client sees the same lower-id entry, evicts locally and releases the
//! primitive, so the engines converge without a second writer.

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::metrics::StationMetrics;
use crate::station::engine::{SeatPrimitive, SyncChannel};
use crate::station::events::{EventNotifier, StationEvent};
use crate::station::participant::ParticipantId;
use crate::station::seat::Seat;
use crate::util::vec3::Vec3;

/// Result of resolving an entry attempt against the current occupant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    /// Seat was vacant
    Accept,
    /// Current occupant has a higher id and gives way
    EvictThenAccept { loser: ParticipantId },
    /// Current occupant has a lower or equal id and keeps the seat
    Reject { holder: ParticipantId },
    /// Candidate is not a participant this client knows about
    UnknownCandidate,
}

/// Entry transition table
pub fn decide_entry(occupant: Option<ParticipantId>, candidate: ParticipantId) -> EntryDecision {
    match occupant {
        None => EntryDecision::Accept,
        Some(current) if current > candidate => EntryDecision::EvictThenAccept { loser: current },
        Some(current) => EntryDecision::Reject { holder: current },
    }
}

/// What one callback did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<D> {
    pub decision: D,
    /// Events broadcast to informants, in order
    pub events: SmallVec<[StationEvent; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Released,
    /// Candidate was not the occupant
    Ignored,
}

/// Borrowed view over the pieces of a station the arbiter touches
pub struct OccupancyArbiter<'a, P: SeatPrimitive, N: SyncChannel> {
    pub(super) seat: &'a mut Seat,
    pub(super) primitive: &'a mut P,
    pub(super) channel: &'a mut N,
    pub(super) notifier: &'a mut EventNotifier,
    pub(super) metrics: &'a StationMetrics,
    pub(super) local: Option<ParticipantId>,
    pub(super) default_offset: Vec3,
}

impl<'a, P: SeatPrimitive, N: SyncChannel> OccupancyArbiter<'a, P, N> {
    fn is_local(&self, id: ParticipantId) -> bool {
        self.local == Some(id)
    }

    fn emit(&mut self, event: StationEvent, events: &mut SmallVec<[StationEvent; 2]>) {
        let report = self.notifier.notify(event);
        StationMetrics::add(&self.metrics.events_delivered, report.delivered as u64);
        StationMetrics::add(&self.metrics.informant_failures, report.failed as u64);
        events.push(event);
    }

    pub fn on_entry_attempt(&mut self, candidate: ParticipantId) -> Transition<EntryDecision> {
        let decision = decide_entry(self.seat.occupant, candidate);
        let mut events = SmallVec::new();

        match decision {
            EntryDecision::Reject { holder } => {
                debug!("Entry by {} rejected, {} keeps the seat", candidate, holder);
                StationMetrics::incr(&self.metrics.entries_rejected);
                return Transition { decision, events };
            }
            EntryDecision::UnknownCandidate => return Transition { decision, events },
            EntryDecision::EvictThenAccept { loser } => {
                info!("{} displaces {} (lower id wins)", candidate, loser);
                StationMetrics::incr(&self.metrics.evictions);
                if self.is_local(loser) {
                    self.primitive.release(loser);
                    self.seat.collision_enabled = true;
                    self.seat.local_in_station = false;
                }
                // Remote losers are mirrored as a local exit; their own client evicts them
                self.emit(StationEvent::LocalExited, &mut events);
            }
            EntryDecision::Accept => {}
        }

        self.seat.occupant = Some(candidate);
        StationMetrics::incr(&self.metrics.entries_accepted);

        if self.is_local(candidate) {
            info!("Local participant {} entered the station", candidate);
            self.seat.collision_enabled = false;
            self.seat.local_in_station = true;
            self.channel.set_owner(candidate);
            self.emit(StationEvent::LocalEntered, &mut events);
        } else {
            info!("Remote participant {} entered the station", candidate);
            self.emit(StationEvent::RemoteEntered, &mut events);
        }

        Transition { decision, events }
    }

    pub fn on_exit_attempt(&mut self, candidate: ParticipantId) -> Transition<ExitDecision> {
        let mut events = SmallVec::new();

        if self.seat.occupant != Some(candidate) {
            debug!("Exit by non-occupant {} ignored", candidate);
            StationMetrics::incr(&self.metrics.exits_ignored);
            return Transition {
                decision: ExitDecision::Ignored,
                events,
            };
        }

        self.seat.occupant = None;
        StationMetrics::incr(&self.metrics.exits);

        if self.is_local(candidate) {
            info!("Local participant {} left the station", candidate);
            self.seat.collision_enabled = true;
            self.seat.local_in_station = false;
            self.emit(StationEvent::LocalExited, &mut events);
        } else {
            info!("Remote participant {} left the station", candidate);
            self.seat.rendered.offset = self.default_offset;
            self.emit(StationEvent::RemoteExited, &mut events);
        }

        Transition {
            decision: ExitDecision::Released,
            events,
        }
    }
}
