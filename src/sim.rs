//! Multi-client station simulation over the loopback network
//!
//! Each [`SimulatedClient`] owns one station bound to a [`SimSeat`] and a
//! loopback endpoint. Seat changes are broadcast to every client, the sender
//! included, the way the engine fires seat callbacks on all clients.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::StationConfig;
use crate::metrics::StationMetrics;
use crate::net::loopback::{LoopbackEndpoint, LoopbackHub, LoopbackLink};
use crate::net::protocol::{Envelope, StationMessage};
use crate::station::engine::{Mobility, SeatPrimitive};
use crate::station::input::{Direction, InputSource, Key};
use crate::station::participant::{Participant, ParticipantId, ParticipantRegistry};
use crate::station::seat::Authority;
use crate::station::{FrameOutcome, Station};
use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

/// Rounds without progress after which a run is considered stuck
const MAX_SETTLE_ROUNDS: usize = 10_000;

/// Engine seat stand-in that announces occupancy changes on the network
pub struct SimSeat {
    link: LoopbackLink,
    pub mobility: Mobility,
    pub exit_disabled: bool,
}

impl SimSeat {
    pub fn new(link: LoopbackLink) -> Self {
        Self {
            link,
            mobility: Mobility::Immobile,
            exit_disabled: false,
        }
    }
}

impl SeatPrimitive for SimSeat {
    fn occupy(&mut self, participant: ParticipantId) {
        self.link.broadcast(StationMessage::SeatEntered { participant }, true);
    }

    fn release(&mut self, participant: ParticipantId) {
        self.link.broadcast(StationMessage::SeatExited { participant }, true);
    }

    fn mobility(&self) -> Mobility {
        self.mobility
    }

    fn exit_disabled(&self) -> bool {
        self.exit_disabled
    }
}

/// Keys a scripted participant is holding
#[derive(Debug, Clone, Default)]
pub struct HeldKeys(pub Vec<Key>);

impl InputSource for HeldKeys {
    fn is_held(&self, key: Key) -> bool {
        self.0.contains(&key)
    }
}

pub struct SimulatedClient {
    name: String,
    station: Station<SimSeat, LoopbackEndpoint>,
}

impl SimulatedClient {
    /// Connect a client simulating `local`, aware of everyone in `others`
    pub fn connect(
        hub: &LoopbackHub,
        config: StationConfig,
        local: Participant,
        others: impl IntoIterator<Item = Participant>,
    ) -> Self {
        let endpoint = hub.connect(local.id);
        let seat = SimSeat::new(endpoint.link());
        let name = local.name.clone();

        let mut registry = ParticipantRegistry::new();
        registry.join(local);
        for other in others {
            registry.join(Participant { is_local: false, ..other });
        }

        let station = Station::new(config, seat, endpoint, registry, Arc::new(StationMetrics::new()));
        debug!("{} bound to station {}", name, station.instance_id());
        Self { name, station }
    }

    pub fn id(&self) -> ParticipantId {
        self.station.channel().id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn station(&self) -> &Station<SimSeat, LoopbackEndpoint> {
        &self.station
    }

    pub fn station_mut(&mut self) -> &mut Station<SimSeat, LoopbackEndpoint> {
        &mut self.station
    }

    /// Messages waiting in this client's inbox
    pub fn backlog(&self) -> usize {
        self.station.channel().pending()
    }

    /// Dispatch everything received so far, then publish if asked to.
    /// Returns the number of messages handled.
    pub fn pump(&mut self) -> usize {
        let envelopes = self.station.channel().drain();
        for envelope in &envelopes {
            self.dispatch(envelope);
        }
        self.flush();
        envelopes.len()
    }

    fn dispatch(&mut self, envelope: &Envelope) {
        debug!("{} <- {} #{}: {:?}", self.name, envelope.from, envelope.sequence, envelope.message);
        match envelope.message {
            StationMessage::SeatSync { offset } => {
                self.station.on_deserialization(offset);
            }
            StationMessage::OwnershipTransferred { new_owner } => {
                self.station.on_ownership_transferred(new_owner);
            }
            StationMessage::SeatEntered { participant } => {
                self.station.on_entry_attempt(participant);
            }
            StationMessage::SeatExited { participant } => {
                self.station.on_exit_attempt(participant);
            }
        }
    }

    /// Serialize the synced offset if the station requested it and this
    /// client still holds authority
    pub fn flush(&mut self) -> bool {
        if !self.station.channel_mut().take_serialization_request() {
            return false;
        }
        if !self.station.seat().is_local_authority() {
            debug!("{} dropped a serialization request, no longer the authority", self.name);
            return false;
        }
        let offset = self.station.on_pre_serialization();
        self.station
            .channel()
            .link()
            .broadcast(StationMessage::SeatSync { offset }, false);
        true
    }

    /// One frame of local simulation: seat update, jump-to-exit, then any
    /// serialization the frame asked for
    pub fn tick(&mut self, elapsed_seconds: f32, head_rotation: Quat, input: &HeldKeys) -> FrameOutcome {
        let outcome = self
            .station
            .update_with_input(elapsed_seconds, head_rotation, Quat::IDENTITY, input);
        self.station.on_jump(input.is_held(Key::Space));
        self.flush();
        outcome
    }

    /// Who this client believes owns the synced state
    pub fn believed_owner(&self) -> Option<ParticipantId> {
        match self.station.seat().authority() {
            Authority::Unassigned => None,
            Authority::Local => Some(self.id()),
            Authority::Remote(owner) => Some(owner),
        }
    }

    pub fn summary(&self) -> ClientSummary {
        let seat = self.station.seat();
        ClientSummary {
            id: self.id(),
            name: self.name.clone(),
            occupant: seat.occupant(),
            believed_owner: self.believed_owner(),
            local_in_station: seat.local_in_station(),
            rendered_offset: seat.rendered().offset,
            preferred_offset: seat.preferred_offset(),
        }
    }
}

/// One client's view of the station at a point in the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub id: ParticipantId,
    pub name: String,
    pub occupant: Option<ParticipantId>,
    pub believed_owner: Option<ParticipantId>,
    pub local_in_station: bool,
    pub rendered_offset: Vec3,
    pub preferred_offset: Vec3,
}

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Seeds delivery order and dropped pump rounds
    pub seed: u64,
    /// Wall-clock pause between pump rounds; zero only yields
    pub tick: Duration,
    /// Frames the winner spends holding the up key
    pub adjust_frames: u32,
    pub frame_seconds: f32,
    /// Chance that a client pumps its inbox in a given round
    pub pump_probability: f64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            seed: 7,
            tick: Duration::from_millis(16),
            adjust_frames: 60,
            frame_seconds: 1.0 / 60.0,
            pump_probability: 0.7,
        }
    }
}

impl DemoOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.pump_probability > 0.0 && self.pump_probability <= 1.0) {
            bail!("pump_probability must be in (0, 1], got {}", self.pump_probability);
        }
        Ok(())
    }
}

/// Snapshots of every client after each phase of the demo
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub after_claim: Vec<ClientSummary>,
    pub after_adjust: Vec<ClientSummary>,
    pub after_exit: Vec<ClientSummary>,
    pub final_owner: Option<ParticipantId>,
    pub messages: usize,
}

impl DemoReport {
    /// Every client in `snapshot` agrees on the occupant
    pub fn occupants_agree(snapshot: &[ClientSummary]) -> bool {
        snapshot.windows(2).all(|pair| pair[0].occupant == pair[1].occupant)
    }

    pub fn owners_agree(snapshot: &[ClientSummary]) -> bool {
        snapshot
            .windows(2)
            .all(|pair| pair[0].believed_owner == pair[1].believed_owner)
    }
}

/// Pump clients in random order until no client has anything left to handle
pub async fn settle(clients: &mut [SimulatedClient], rng: &mut StdRng, options: &DemoOptions) -> anyhow::Result<usize> {
    options.validate()?;
    let mut handled = 0;
    let mut order: Vec<usize> = (0..clients.len()).collect();

    for _ in 0..MAX_SETTLE_ROUNDS {
        if clients.iter().all(|client| client.backlog() == 0) {
            return Ok(handled);
        }

        order.shuffle(rng);
        for &index in &order {
            if rng.gen_bool(options.pump_probability) {
                handled += clients[index].pump();
            }
        }

        if options.tick.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(options.tick).await;
        }
    }

    bail!("simulation did not settle within {} rounds", MAX_SETTLE_ROUNDS)
}

/// Two participants claim the seat at nearly the same time. The lower id
/// keeps it, nudges the seat upward from the desktop, then jumps out.
pub async fn run_demo(config: StationConfig, options: DemoOptions) -> anyhow::Result<DemoReport> {
    options.validate()?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let hub = LoopbackHub::new();

    let alice = Participant::new(ParticipantId(5), "alice", true);
    let bruno = Participant::new(ParticipantId(2), "bruno", true);

    let mut clients = vec![
        SimulatedClient::connect(&hub, config.clone(), alice.clone(), [bruno.clone()]),
        SimulatedClient::connect(&hub, config.clone(), bruno, [alice]),
    ];
    for client in clients.iter_mut() {
        client.station_mut().primitive_mut().exit_disabled = true;
    }

    info!("Demo seed {}: {} clients on hub", options.seed, hub.peer_count());

    // Near-simultaneous claims, issued in random order
    let mut order: Vec<usize> = (0..clients.len()).collect();
    order.shuffle(&mut rng);
    for &index in &order {
        clients[index].station_mut().interact();
    }
    let mut messages = settle(&mut clients, &mut rng, &options).await?;
    let after_claim: Vec<ClientSummary> = clients.iter().map(SimulatedClient::summary).collect();
    info!("Seat claimed: {:?}", after_claim.iter().map(|c| (c.id, c.occupant)).collect::<Vec<_>>());

    let up = HeldKeys(vec![config.bindings.key_for(Direction::Up)]);
    let idle = HeldKeys::default();
    for _ in 0..options.adjust_frames {
        for client in clients.iter_mut() {
            let input = if client.station().local_in_station() { &up } else { &idle };
            client.tick(options.frame_seconds, Quat::IDENTITY, input);
        }
        messages += settle(&mut clients, &mut rng, &options).await?;
    }
    let after_adjust: Vec<ClientSummary> = clients.iter().map(SimulatedClient::summary).collect();

    let jump = HeldKeys(vec![Key::Space]);
    for client in clients.iter_mut() {
        let input = if client.station().local_in_station() { &jump } else { &idle };
        client.tick(options.frame_seconds, Quat::IDENTITY, input);
    }
    messages += settle(&mut clients, &mut rng, &options).await?;
    let after_exit: Vec<ClientSummary> = clients.iter().map(SimulatedClient::summary).collect();

    for client in &clients {
        debug!("{} metrics: {}", client.name(), client.station().metrics().to_json());
        debug!("{} metrics (prometheus):\n{}", client.name(), client.station().metrics().to_prometheus());
    }

    Ok(DemoReport {
        after_claim,
        after_adjust,
        after_exit,
        final_owner: hub.owner(),
        messages,
    })
}
