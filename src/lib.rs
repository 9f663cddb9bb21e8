//! Station Seat Library
//!
//! Single-seat station for a shared, networked 3D world: arbitrates who sits
//! in the seat, replicates the occupant's seat offset from the authority to
//! every observer and notifies informants of occupancy changes.
//!
//! The engine and network are reached through the traits in
//! [`station::engine`]; [`sim`] wires stations to an in-process loopback
//! network for tests and the demo binary.

pub mod config;
pub mod metrics;
pub mod net;
pub mod sim;
pub mod station;
pub mod util;
