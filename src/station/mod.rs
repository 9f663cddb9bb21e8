//! Single-seat station
//!
//! A [`Station`] binds one engine seat to the occupancy arbiter, the replication
//! bridge, the desktop input mapper and the look-around blender. The engine
//! and network drive it through callbacks; the host calls [`Station::update`]
//! once per frame.

pub mod arbiter;
pub mod blend;
pub mod engine;
pub mod events;
pub mod input;
pub mod participant;
pub mod replication;
pub mod seat;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StationConfig;
use crate::metrics::StationMetrics;
use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

use arbiter::{EntryDecision, ExitDecision, OccupancyArbiter, Transition};
use blend::{SeatTransform, TransformBlender};
use engine::{Mobility, SeatPrimitive, SyncChannel};
use events::{EventNotifier, InformantHandle, StationInformant};
use input::{DesktopInputMapper, HeldDirections, InputSource};
use participant::{ParticipantId, ParticipantRegistry};
use replication::ReplicationBridge;
use seat::{Authority, Seat};

/// Per-frame inputs sampled by the host
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    pub elapsed_seconds: f32,
    pub held: HeldDirections,
    /// Occupant's head rotation in world space
    pub head_rotation: Quat,
    /// Seat mover's world rotation the heading is measured against
    pub reference_rotation: Quat,
}

impl FrameInput {
    pub fn new(elapsed_seconds: f32, head_rotation: Quat, reference_rotation: Quat) -> Self {
        Self {
            elapsed_seconds,
            held: HeldDirections::NONE,
            head_rotation,
            reference_rotation,
        }
    }

    pub fn with_held(mut self, held: HeldDirections) -> Self {
        self.held = held;
        self
    }
}

/// Why a frame had no seat effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Vacant,
    /// Occupant id is no longer in the registry
    UnknownOccupant,
    OccupantInVr,
    MobileSeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Composed {
        transform: SeatTransform,
        /// Desktop input changed the preferred offset and a sync was requested
        sync_requested: bool,
    },
}

pub struct Station<P: SeatPrimitive, N: SyncChannel> {
    instance_id: Uuid,
    config: StationConfig,
    seat: Seat,
    registry: ParticipantRegistry,
    primitive: P,
    channel: N,
    notifier: EventNotifier,
    mapper: DesktopInputMapper,
    blender: TransformBlender,
    metrics: Arc<StationMetrics>,
}

impl<P: SeatPrimitive, N: SyncChannel> Station<P, N> {
    /// Bind a station to its engine seat and sync channel.
    ///
    /// The seat starts at the configured default offset; initial authority is
    /// read from the channel's current owner.
    pub fn new(
        config: StationConfig,
        primitive: P,
        channel: N,
        registry: ParticipantRegistry,
        metrics: Arc<StationMetrics>,
    ) -> Self {
        let authority = match channel.owner() {
            Some(owner) if registry.is_local(owner) => Authority::Local,
            Some(owner) => Authority::Remote(owner),
            None => Authority::Unassigned,
        };
        let instance_id = Uuid::new_v4();

        info!(
            "Station {} initialized: authority={:?}, default_offset={:?}",
            instance_id, authority, config.default_offset
        );

        Self {
            instance_id,
            seat: Seat::new(config.default_offset, authority),
            mapper: DesktopInputMapper::new(config.transition_speed),
            blender: TransformBlender::new(config.desktop_head_x_offset),
            config,
            registry,
            primitive,
            channel,
            notifier: EventNotifier::new(),
            metrics,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn seat(&self) -> &Seat {
        &self.seat
    }

    pub fn occupant(&self) -> Option<ParticipantId> {
        self.seat.occupant()
    }

    pub fn local_in_station(&self) -> bool {
        self.seat.local_in_station()
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParticipantRegistry {
        &mut self.registry
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    pub fn primitive_mut(&mut self) -> &mut P {
        &mut self.primitive
    }

    pub fn channel(&self) -> &N {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut N {
        &mut self.channel
    }

    pub fn metrics(&self) -> &Arc<StationMetrics> {
        &self.metrics
    }

    pub fn register_informant(&mut self, informant: impl StationInformant + 'static) -> InformantHandle {
        self.notifier.register(informant)
    }

    pub fn unregister_informant(&mut self, handle: InformantHandle) -> bool {
        self.notifier.unregister(handle)
    }

    fn arbiter(&mut self) -> OccupancyArbiter<'_, P, N> {
        OccupancyArbiter {
            seat: &mut self.seat,
            primitive: &mut self.primitive,
            channel: &mut self.channel,
            notifier: &mut self.notifier,
            metrics: &self.metrics,
            local: self.registry.local_id(),
            default_offset: self.config.default_offset,
        }
    }

    fn bridge(&mut self) -> ReplicationBridge<'_, N> {
        ReplicationBridge {
            seat: &mut self.seat,
            channel: &mut self.channel,
            metrics: &self.metrics,
        }
    }

    /// Local participant asks to sit down
    pub fn interact(&mut self) {
        match self.registry.local_id() {
            Some(local) => {
                debug!("Local participant {} interacting with station {}", local, self.instance_id);
                self.primitive.occupy(local);
            }
            None => warn!("Interact on station {} with no local participant", self.instance_id),
        }
    }

    /// Engine callback: `participant` sat down
    pub fn on_entry_attempt(&mut self, participant: ParticipantId) -> Transition<EntryDecision> {
        if self.registry.get(participant).is_none() {
            warn!("Entry attempt by unknown participant {} ignored", participant);
            return Transition {
                decision: EntryDecision::UnknownCandidate,
                events: Default::default(),
            };
        }
        self.arbiter().on_entry_attempt(participant)
    }

    /// Engine callback: `participant` stood up
    pub fn on_exit_attempt(&mut self, participant: ParticipantId) -> Transition<ExitDecision> {
        self.arbiter().on_exit_attempt(participant)
    }

    /// Network callback: ownership of the synced state moved to `new_owner`.
    ///
    /// The seated local participant must stay the authority, so losing
    /// ownership while seated immediately requests it back.
    pub fn on_ownership_transferred(&mut self, new_owner: ParticipantId) {
        let is_local = self.registry.is_local(new_owner);
        self.bridge().on_ownership_transferred(new_owner, is_local);

        if is_local || !self.seat.local_in_station() {
            return;
        }
        if let Some(local) = self.registry.local_id() {
            info!("Reclaiming seat authority from {} for seated participant {}", new_owner, local);
            StationMetrics::incr(&self.metrics.ownership_reclaims);
            self.channel.set_owner(local);
        }
    }

    /// Network hook, right before the authority's state is serialized
    pub fn on_pre_serialization(&mut self) -> Vec3 {
        let mut bridge = self.bridge();
        bridge.capture_for_sync();
        self.seat.synced_offset()
    }

    /// Network hook, right after a replicated offset arrived
    pub fn on_deserialization(&mut self, synced_offset: Vec3) -> bool {
        self.bridge().receive(synced_offset)
    }

    /// Jump input. Exits the seat when the engine's own exit controls are disabled.
    pub fn on_jump(&mut self, pressed: bool) -> bool {
        if !pressed || !self.seat.local_in_station() || !self.primitive.exit_disabled() {
            return false;
        }
        let Some(local) = self.registry.local_id() else {
            return false;
        };

        debug!("Jump-to-exit for local participant {}", local);
        self.primitive.release(local);
        self.on_exit_attempt(local);
        true
    }

    /// Per-frame update with held keys sampled from `source` via configured bindings
    pub fn update_with_input(
        &mut self,
        elapsed_seconds: f32,
        head_rotation: Quat,
        reference_rotation: Quat,
        source: &impl InputSource,
    ) -> FrameOutcome {
        let held = HeldDirections::poll(&self.config.bindings, source);
        let frame = FrameInput::new(elapsed_seconds, head_rotation, reference_rotation).with_held(held);
        self.update(&frame)
    }

    /// Per-frame update: desktop adjustment, sync request and look-around.
    ///
    /// Has no effect while the seat is vacant, the occupant is in VR or the
    /// seat lets the occupant move freely.
    pub fn update(&mut self, frame: &FrameInput) -> FrameOutcome {
        let started = Instant::now();
        let outcome = self.compose_frame(frame);

        match outcome {
            FrameOutcome::Skipped(_) => StationMetrics::incr(&self.metrics.frames_skipped),
            FrameOutcome::Composed { .. } => StationMetrics::incr(&self.metrics.frames_composed),
        }
        self.metrics.record_frame_time(started.elapsed());

        outcome
    }

    fn compose_frame(&mut self, frame: &FrameInput) -> FrameOutcome {
        let Some(occupant_id) = self.seat.occupant() else {
            return FrameOutcome::Skipped(SkipReason::Vacant);
        };
        let Some(occupant) = self.registry.get(occupant_id) else {
            return FrameOutcome::Skipped(SkipReason::UnknownOccupant);
        };
        if occupant.in_vr {
            return FrameOutcome::Skipped(SkipReason::OccupantInVr);
        }
        if self.primitive.mobility() == Mobility::Mobile {
            return FrameOutcome::Skipped(SkipReason::MobileSeat);
        }

        let mut sync_requested = false;
        let base_offset = if self.seat.local_in_station() {
            let moved = self.mapper.update(
                &mut self.seat.preferred_offset,
                frame.elapsed_seconds,
                frame.held,
            );
            if moved {
                sync_requested = self.bridge().request_sync();
            }
            self.seat.preferred_offset()
        } else {
            self.seat.synced_offset()
        };

        let transform = self
            .blender
            .compose(frame.head_rotation, frame.reference_rotation, base_offset);
        self.seat.rendered = transform;

        FrameOutcome::Composed {
            transform,
            sync_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::events::StationEvent;
    use crate::station::input::Direction;
    use crate::station::participant::Participant;
    use crate::station::testing::{RecordingChannel, RecordingSeat};
    use parking_lot::Mutex;

    const EPSILON: f32 = 1e-5;
    const A: ParticipantId = ParticipantId(5);
    const B: ParticipantId = ParticipantId(2);

    fn station_for(local: ParticipantId) -> Station<RecordingSeat, RecordingChannel> {
        let mut registry = ParticipantRegistry::new();
        registry.join(Participant::new(A, "alice", local == A));
        registry.join(Participant::new(B, "bruno", local == B));
        Station::new(
            StationConfig::default(),
            RecordingSeat::default(),
            RecordingChannel::default(),
            registry,
            Arc::new(StationMetrics::new()),
        )
    }

    fn still_frame(elapsed: f32) -> FrameInput {
        FrameInput::new(elapsed, Quat::IDENTITY, Quat::IDENTITY)
    }

    fn record_events(station: &mut Station<RecordingSeat, RecordingChannel>) -> Arc<Mutex<Vec<StationEvent>>> {
        let log: Arc<Mutex<Vec<StationEvent>>> = Arc::default();
        let sink = log.clone();
        station.register_informant(move |event: StationEvent| sink.lock().push(event));
        log
    }

    #[test]
    fn test_init_resets_to_default_offset() {
        let station = station_for(A);
        let default = StationConfig::default().default_offset;

        assert_eq!(station.seat().rendered().offset, default);
        assert_eq!(station.seat().preferred_offset(), default);
        assert!(station.seat().collision_enabled());
        assert_eq!(station.seat().authority(), Authority::Unassigned);
    }

    #[test]
    fn test_init_reads_authority_from_channel() {
        let mut registry = ParticipantRegistry::new();
        registry.join(Participant::new(A, "alice", true));
        let channel = RecordingChannel {
            owner: Some(A),
            ..Default::default()
        };
        let station = Station::new(
            StationConfig::default(),
            RecordingSeat::default(),
            channel,
            registry,
            Arc::new(StationMetrics::new()),
        );
        assert!(station.seat().is_local_authority());
    }

    #[test]
    fn test_interact_occupies_primitive() {
        let mut station = station_for(A);
        station.interact();
        assert_eq!(station.primitive().occupied, vec![A]);
    }

    #[test]
    fn test_scenario_a_then_lower_b() {
        let mut station = station_for(A);
        let log = record_events(&mut station);

        station.on_entry_attempt(A);
        assert_eq!(station.occupant(), Some(A));
        assert_eq!(*log.lock(), vec![StationEvent::LocalEntered]);

        station.on_entry_attempt(B);
        assert_eq!(station.occupant(), Some(B));
        assert_eq!(station.primitive().released, vec![A]);
        assert_eq!(
            *log.lock(),
            vec![
                StationEvent::LocalEntered,
                StationEvent::LocalExited,
                StationEvent::RemoteEntered
            ]
        );
        assert_eq!(StationMetrics::get(&station.metrics().events_delivered), 3);
    }

    #[test]
    fn test_update_skips_vacant_seat() {
        let mut station = station_for(A);
        assert_eq!(station.update(&still_frame(0.016)), FrameOutcome::Skipped(SkipReason::Vacant));
    }

    #[test]
    fn test_update_skips_vr_occupant() {
        let mut station = station_for(A);
        if let Some(b) = station.registry_mut().get_mut(B) {
            b.in_vr = true;
        }
        station.on_entry_attempt(B);
        assert_eq!(
            station.update(&still_frame(0.016)),
            FrameOutcome::Skipped(SkipReason::OccupantInVr)
        );
    }

    #[test]
    fn test_update_skips_mobile_seat() {
        let mut station = station_for(A);
        station.primitive_mut().mobility = Mobility::Mobile;
        station.on_entry_attempt(A);
        assert_eq!(
            station.update(&still_frame(0.016)),
            FrameOutcome::Skipped(SkipReason::MobileSeat)
        );
    }

    #[test]
    fn test_update_skips_departed_occupant() {
        let mut station = station_for(A);
        station.on_entry_attempt(B);
        station.registry_mut().leave(B);
        assert_eq!(
            station.update(&still_frame(0.016)),
            FrameOutcome::Skipped(SkipReason::UnknownOccupant)
        );
    }

    #[test]
    fn test_move_up_one_second_requests_one_sync() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        station.on_ownership_transferred(A);
        let requests_before = station.channel().serialization_requests;
        let start = station.seat().preferred_offset();

        let frame = still_frame(1.0).with_held(HeldDirections::NONE.with(Direction::Up));
        let outcome = station.update(&frame);

        let FrameOutcome::Composed { sync_requested, .. } = outcome else {
            panic!("expected a composed frame, got {:?}", outcome);
        };
        assert!(sync_requested);
        assert_eq!(station.channel().serialization_requests, requests_before + 1);
        let moved = station.seat().preferred_offset();
        assert!((moved.y - start.y - 0.2).abs() < EPSILON);
    }

    #[test]
    fn test_no_sync_without_authority() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        // Ownership notification has not arrived yet

        let frame = still_frame(0.5).with_held(HeldDirections::NONE.with(Direction::Forward));
        let outcome = station.update(&frame);

        assert!(matches!(outcome, FrameOutcome::Composed { sync_requested: false, .. }));
        assert_eq!(station.channel().serialization_requests, 0);
        assert!((station.seat().preferred_offset().z - 0.1).abs() < EPSILON);
    }

    #[test]
    fn test_remote_occupant_renders_synced_offset_with_bias() {
        let mut station = station_for(A);
        station.on_entry_attempt(B);
        station.on_ownership_transferred(B);
        station.on_deserialization(Vec3::new(0.0, -0.5, 0.1));

        let frame = FrameInput::new(0.016, Quat::from_yaw_degrees(90.0), Quat::IDENTITY)
            .with_held(HeldDirections::NONE.with(Direction::Up));
        let outcome = station.update(&frame);

        let FrameOutcome::Composed { transform, sync_requested } = outcome else {
            panic!("expected a composed frame, got {:?}", outcome);
        };
        assert!(!sync_requested);
        assert!(transform.offset.approx_eq(Vec3::new(0.25, -0.5, 0.1), 1e-4));
        assert!(transform.rotation.approx_eq(Quat::from_yaw_degrees(90.0), 1e-6));
        // Remote occupant's seat is not driven by local keys
        assert_eq!(station.seat().preferred_offset(), StationConfig::default().default_offset);
    }

    #[test]
    fn test_pre_serialization_captures_preferred() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        station.on_ownership_transferred(A);
        station.update(&still_frame(1.0).with_held(HeldDirections::NONE.with(Direction::Right)));

        let published = station.on_pre_serialization();
        assert_eq!(published, station.seat().preferred_offset());
    }

    #[test]
    fn test_handoff_snapshots_rendered_pose() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        station.on_ownership_transferred(A);

        // Looking right shifts the rendered seat sideways
        station.update(&FrameInput::new(0.016, Quat::from_yaw_degrees(90.0), Quat::IDENTITY));
        let rendered = station.seat().rendered().offset;

        station.on_ownership_transferred(B);
        assert!(station.seat().preferred_offset().approx_eq(rendered, EPSILON));
        assert_eq!(station.seat().authority(), Authority::Remote(B));
    }

    #[test]
    fn test_seated_local_reclaims_authority() {
        let mut station = station_for(B);
        station.on_entry_attempt(B);
        station.on_ownership_transferred(B);
        assert_eq!(station.channel().owner_requests, vec![B]);

        // A late request from the displaced participant lands last
        station.on_ownership_transferred(A);

        assert_eq!(station.channel().owner_requests, vec![B, B]);
        assert_eq!(StationMetrics::get(&station.metrics().ownership_reclaims), 1);
    }

    #[test]
    fn test_observer_does_not_reclaim_authority() {
        let mut station = station_for(A);
        station.on_entry_attempt(B);
        station.on_ownership_transferred(A);
        station.on_ownership_transferred(B);

        assert!(station.channel().owner_requests.is_empty());
        assert_eq!(station.seat().authority(), Authority::Remote(B));
    }

    #[test]
    fn test_jump_exits_when_exit_disabled() {
        let mut station = station_for(A);
        station.primitive_mut().exit_disabled = true;
        let log = record_events(&mut station);
        station.on_entry_attempt(A);

        assert!(!station.on_jump(false));
        assert!(station.on_jump(true));

        assert!(station.seat().is_vacant());
        assert!(!station.local_in_station());
        assert_eq!(station.primitive().released, vec![A]);
        assert_eq!(*log.lock(), vec![StationEvent::LocalEntered, StationEvent::LocalExited]);

        // Engine's own exit callback arriving afterwards is a no-op
        assert_eq!(station.on_exit_attempt(A).decision, ExitDecision::Ignored);
    }

    #[test]
    fn test_jump_ignored_when_exit_allowed() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        assert!(!station.on_jump(true));
        assert_eq!(station.occupant(), Some(A));
    }

    #[test]
    fn test_unknown_candidate_ignored() {
        let mut station = station_for(A);
        let log = record_events(&mut station);

        let transition = station.on_entry_attempt(ParticipantId(1));

        assert_eq!(transition.decision, EntryDecision::UnknownCandidate);
        assert!(station.seat().is_vacant());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_stale_sync_after_gaining_authority() {
        let mut station = station_for(A);
        station.on_entry_attempt(A);
        station.on_ownership_transferred(A);

        assert!(!station.on_deserialization(Vec3::new(1.0, 1.0, 1.0)));
        assert_eq!(station.seat().rendered().offset, StationConfig::default().default_offset);
    }
}
