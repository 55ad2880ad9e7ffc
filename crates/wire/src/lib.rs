#![deny(unsafe_code)]
//! Shared wire protocol types for Flowstate.
//!
//! - **Control/realtime channel**: JSON messages tagged by `type`
//!   (`messages` module) — handshake, lobby, HUD, timing.
//! - **Snapshot channel**: a hand-rolled little-endian binary frame
//!   (`codec` module) with an exact byte layout; JSON/protobuf cannot
//!   serve this because the layout is a byte-offset contract.
//! - **Replay artifact**: Protobuf (`replay_proto` module), an internal
//!   disk format for `flowstate-replay`, not a network contract.

pub mod codec;
pub mod messages;
pub mod replay_proto;

pub use codec::{decode, encode, CodecError, WorldSnapshot};
pub use messages::{
    ClientMessage, GameConfig, HudMessage, NetworkInput, PlayerRosterEntry, ServerMessage,
};
