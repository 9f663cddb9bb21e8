use crate::station::blend::SeatTransform;
use crate::station::participant::ParticipantId;
use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

/// Who owns the seat's replicated state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// No ownership notification seen yet
    Unassigned,
    Local,
    Remote(ParticipantId),
}

impl Authority {
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, Authority::Local)
    }
}

/// Per-station seat state.
///
/// `occupant` is written only by the occupancy arbiter and `authority` only by
/// the ownership-transfer handler in the replication bridge.
#[derive(Debug, Clone)]
pub struct Seat {
    pub(super) occupant: Option<ParticipantId>,
    pub(super) authority: Authority,
    /// Offset the local participant wants while seated
    pub(super) preferred_offset: Vec3,
    /// Offset last published by (or received from) the authority
    pub(super) synced_offset: Vec3,
    /// Transform currently applied to the engine's seat mover
    pub(super) rendered: SeatTransform,
    pub(super) collision_enabled: bool,
    pub(super) local_in_station: bool,
}

impl Seat {
    pub fn new(default_offset: Vec3, authority: Authority) -> Self {
        Self {
            occupant: None,
            authority,
            preferred_offset: default_offset,
            synced_offset: default_offset,
            rendered: SeatTransform {
                rotation: Quat::IDENTITY,
                offset: default_offset,
            },
            collision_enabled: true,
            local_in_station: false,
        }
    }

    pub fn occupant(&self) -> Option<ParticipantId> {
        self.occupant
    }

    pub fn is_vacant(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn is_local_authority(&self) -> bool {
        self.authority.is_local()
    }

    pub fn preferred_offset(&self) -> Vec3 {
        self.preferred_offset
    }

    pub fn synced_offset(&self) -> Vec3 {
        self.synced_offset
    }

    pub fn rendered(&self) -> SeatTransform {
        self.rendered
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    pub fn local_in_station(&self) -> bool {
        self.local_in_station
    }
}
