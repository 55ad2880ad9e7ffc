//! Flowstate Server Edge.
//!
//! Mediates between game clients and the simulation core (`flowstate-sim`):
//! owns the WebSocket transport, per-player input queues and rate
//! limiting, lag-compensation tick mapping, and the fixed-timestep
//! simulation driver. The simulation core itself stays pure — every piece
//! of ambient I/O (sockets, the wall clock, environment configuration)
//! lives in this crate.

#![deny(unsafe_code)]

pub mod config;
pub mod driver;
pub mod input_queue;
pub mod session;
pub mod telemetry;
pub mod tick_mapper;
pub mod transport;
pub mod validation;

pub use config::RoomConfig;
pub use session::Room;
