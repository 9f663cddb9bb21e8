//! Authority-to-replica sync of the occupant's seat offset
//!
//! Sync is manual: the authority asks for serialization when its offset
//! changes or when it has just become the authority. Replicas overwrite their
//! rendered offset on every update, so duplicated or late updates are harmless.

use tracing::{debug, info};

use crate::metrics::StationMetrics;
use crate::station::engine::SyncChannel;
use crate::station::participant::ParticipantId;
use crate::station::seat::{Authority, Seat};
use crate::util::vec3::Vec3;

pub struct ReplicationBridge<'a, N: SyncChannel> {
    pub(super) seat: &'a mut Seat,
    pub(super) channel: &'a mut N,
    pub(super) metrics: &'a StationMetrics,
}

impl<'a, N: SyncChannel> ReplicationBridge<'a, N> {
    /// Pre-serialization hook: publish the preferred offset
    pub fn capture_for_sync(&mut self) {
        self.seat.synced_offset = self.seat.preferred_offset;
        StationMetrics::incr(&self.metrics.sync_captures);
    }

    /// Post-deserialization hook: render the synced offset
    pub fn apply_from_sync(&mut self) {
        self.seat.rendered.offset = self.seat.synced_offset;
        StationMetrics::incr(&self.metrics.sync_applied);
    }

    /// Accept a replicated offset from the network.
    ///
    /// Returns false when this client is the authority; such an update is a
    /// leftover from before ownership moved here and is dropped.
    pub fn receive(&mut self, offset: Vec3) -> bool {
        if self.seat.authority.is_local() {
            debug!("Dropping stale seat sync while authoritative");
            StationMetrics::incr(&self.metrics.sync_stale_dropped);
            return false;
        }
        self.seat.synced_offset = offset;
        self.apply_from_sync();
        true
    }

    /// Ask the network to publish local state now. Only the authority may.
    pub fn request_sync(&mut self) -> bool {
        if !self.seat.authority.is_local() {
            debug!("Sync request ignored, not the authority ({:?})", self.seat.authority);
            return false;
        }
        self.channel.request_serialization();
        StationMetrics::incr(&self.metrics.sync_requests);
        true
    }

    /// Ownership-transfer handler, the only writer of the seat's authority
    pub fn on_ownership_transferred(&mut self, new_owner: ParticipantId, is_local: bool) {
        StationMetrics::incr(&self.metrics.ownership_transfers);

        if is_local {
            info!("Seat authority transferred to local participant {}", new_owner);
            self.seat.authority = Authority::Local;
            self.request_sync();
            return;
        }

        if self.seat.authority.is_local() {
            // Resume from the last pose on screen if authority comes back later
            self.seat.preferred_offset = self.seat.rendered.offset;
            debug!(
                "Snapshotted preferred offset {:?} before handing authority to {}",
                self.seat.preferred_offset, new_owner
            );
        }
        info!("Seat authority transferred to remote participant {}", new_owner);
        self.seat.authority = Authority::Remote(new_owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::testing::RecordingChannel;

    const EPSILON: f32 = 1e-6;

    fn seat(authority: Authority) -> Seat {
        Seat::new(Vec3::new(0.0, -0.6, 0.0), authority)
    }

    #[test]
    fn test_capture_then_apply_round_trip() {
        let mut seat = seat(Authority::Remote(ParticipantId(1)));
        let mut channel = RecordingChannel::default();
        let metrics = StationMetrics::new();
        seat.preferred_offset = Vec3::new(0.05, -0.4, 0.1);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        bridge.capture_for_sync();
        bridge.apply_from_sync();

        assert_eq!(seat.rendered().offset, Vec3::new(0.05, -0.4, 0.1));
        assert_eq!(seat.synced_offset(), seat.preferred_offset());
    }

    #[test]
    fn test_request_sync_requires_authority() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();

        let mut replica = seat(Authority::Remote(ParticipantId(1)));
        let mut bridge = ReplicationBridge { seat: &mut replica, channel: &mut channel, metrics: &metrics };
        assert!(!bridge.request_sync());
        assert_eq!(channel.serialization_requests, 0);

        let mut authority = seat(Authority::Local);
        let mut bridge = ReplicationBridge { seat: &mut authority, channel: &mut channel, metrics: &metrics };
        assert!(bridge.request_sync());
        assert_eq!(channel.serialization_requests, 1);
    }

    #[test]
    fn test_transfer_to_local_publishes_immediately() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();
        let mut seat = seat(Authority::Unassigned);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        bridge.on_ownership_transferred(ParticipantId(3), true);

        assert_eq!(seat.authority(), Authority::Local);
        assert_eq!(channel.serialization_requests, 1);
    }

    #[test]
    fn test_transfer_away_snapshots_rendered_offset() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();
        let mut seat = seat(Authority::Local);
        seat.preferred_offset = Vec3::new(0.1, 0.0, 0.0);
        seat.rendered.offset = Vec3::new(0.15, 0.0, 0.0);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        bridge.on_ownership_transferred(ParticipantId(8), false);

        assert!(seat.preferred_offset().approx_eq(Vec3::new(0.15, 0.0, 0.0), EPSILON));
        assert_eq!(seat.authority(), Authority::Remote(ParticipantId(8)));
        assert_eq!(channel.serialization_requests, 0);
    }

    #[test]
    fn test_transfer_between_remotes_keeps_preferred() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();
        let mut seat = seat(Authority::Remote(ParticipantId(4)));
        seat.rendered.offset = Vec3::new(0.3, 0.3, 0.3);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        bridge.on_ownership_transferred(ParticipantId(8), false);

        assert_eq!(seat.preferred_offset(), Vec3::new(0.0, -0.6, 0.0));
    }

    #[test]
    fn test_receive_is_idempotent() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();
        let mut seat = seat(Authority::Remote(ParticipantId(4)));
        let offset = Vec3::new(0.0, -0.5, 0.2);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        assert!(bridge.receive(offset));
        assert!(bridge.receive(offset));

        assert_eq!(seat.rendered().offset, offset);
        assert_eq!(seat.synced_offset(), offset);
    }

    #[test]
    fn test_receive_dropped_while_authoritative() {
        let metrics = StationMetrics::new();
        let mut channel = RecordingChannel::default();
        let mut seat = seat(Authority::Local);

        let mut bridge = ReplicationBridge { seat: &mut seat, channel: &mut channel, metrics: &metrics };
        assert!(!bridge.receive(Vec3::new(9.0, 9.0, 9.0)));

        assert_eq!(seat.rendered().offset, Vec3::new(0.0, -0.6, 0.0));
        assert_eq!(StationMetrics::get(&metrics.sync_stale_dropped), 1);
    }
}
