//! JSON control/realtime messages (SPEC_FULL §6 wire format decision).
//! Tagged by `type`, matching the Colyseus-flavored message names in
//! spec.md §6. Style (tagged enum, `serde_json::to_string`/`from_str`)
//! grounded in the pack's `astraweave-net` websocket server.

use std::collections::HashMap;

use flowstate_sim::{EntityId, PlayerId};
use serde::{Deserialize, Serialize};

/// The raw, not-yet-validated input object a client sends on the wire.
/// Every field must be a finite number for the command to be accepted
/// (SPEC_FULL §4.6); fields are left as `f64` here because JSON has no
/// separate integer type and validation happens downstream in
/// `flowstate-server::validation`. The three timing fields are optional
/// so an older/incompatible client that omits them can be told apart from
/// one that sent a malformed value (SPEC_FULL §4.6 `incompatible-protocol`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NetworkInput {
    pub seq: f64,
    #[serde(rename = "clientTick")]
    pub client_tick: f64,
    #[serde(rename = "clientTimeMs", default)]
    pub client_time_ms: Option<f64>,
    #[serde(rename = "estimatedServerTimeMs", default)]
    pub estimated_server_time_ms: Option<f64>,
    #[serde(rename = "viewInterpDelayMs", default)]
    pub view_interp_delay_ms: Option<f64>,
    #[serde(rename = "shootSeq")]
    pub shoot_seq: f64,
    pub buttons: f64,
    #[serde(rename = "aimAngle")]
    pub aim_angle: f64,
    #[serde(rename = "moveX")]
    pub move_x: f64,
    #[serde(rename = "moveY")]
    pub move_y: f64,
    #[serde(rename = "cursorWorldX")]
    pub cursor_world_x: f64,
    #[serde(rename = "cursorWorldY")]
    pub cursor_world_y: f64,
}

impl NetworkInput {
    /// The required (non-timing) fields must all be finite.
    pub fn core_fields_finite(&self) -> bool {
        [
            self.seq,
            self.client_tick,
            self.shoot_seq,
            self.buttons,
            self.aim_angle,
            self.move_x,
            self.move_y,
            self.cursor_world_x,
            self.cursor_world_y,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// `true` if every timing field is present (SPEC_FULL §4.6).
    pub fn has_timing_fields(&self) -> bool {
        self.client_time_ms.is_some()
            && self.estimated_server_time_ms.is_some()
            && self.view_interp_delay_ms.is_some()
    }

    /// `true` if every present timing field is finite.
    pub fn timing_fields_finite(&self) -> bool {
        [
            self.client_time_ms,
            self.estimated_server_time_ms,
            self.view_interp_delay_ms,
        ]
        .iter()
        .flatten()
        .all(|v| v.is_finite())
    }

    pub fn all_fields_finite(&self) -> bool {
        self.core_fields_finite() && self.timing_fields_finite()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Input(NetworkInput),
    Ping { #[serde(rename = "clientTime")] client_time: f64 },
    SetReady { ready: bool },
    SetCharacter { #[serde(rename = "characterId")] character_id: String },
    SetCampReady { ready: bool },
    RequestGameConfig,
    SelectNode { #[serde(rename = "nodeId")] node_id: String },
    /// Not named in spec.md's wire list, which is silent on how a
    /// reconnecting client re-identifies itself; added to satisfy
    /// SPEC_FULL §4.6's reconnection requirement (resume a held slot
    /// instead of spawning a fresh player).
    Reconnect {
        #[serde(rename = "sessionId")]
        session_id: u64,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRosterEntry {
    pub eid: EntityId,
    #[serde(rename = "characterId")]
    pub character_id_index: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub seed: u32,
    #[serde(rename = "sessionId")]
    pub session_id: u64,
    #[serde(rename = "playerEid")]
    pub player_eid: EntityId,
    #[serde(rename = "characterId")]
    pub character_id: String,
    pub roster: Vec<PlayerRosterEntry>,
    #[serde(rename = "nodesTaken", default, skip_serializing_if = "Option::is_none")]
    pub nodes_taken: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HudMessage {
    pub hp: i16,
    #[serde(rename = "maxHp")]
    pub max_hp: i16,
    pub ammo: u16,
    #[serde(rename = "abilityTimings")]
    pub ability_timings: HashMap<String, f32>,
    pub xp: u32,
    pub level: u32,
    pub wave: u32,
    pub stage: u32,
    /// Additive field (SPEC_FULL §9 open question: HUD schema is additive).
    #[serde(rename = "serverTimeMs")]
    pub server_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    GameConfig(GameConfig),
    PlayerRoster { roster: Vec<PlayerRosterEntry> },
    Hud(HudMessage),
    Pong {
        #[serde(rename = "clientTime")]
        client_time: f64,
        #[serde(rename = "serverTime")]
        server_time: f64,
    },
    IncompatibleProtocol { reason: String },
    SelectNodeResult { success: bool, #[serde(rename = "nodeId")] node_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> NetworkInput {
        NetworkInput {
            seq: 1.0,
            client_tick: 0.0,
            client_time_ms: Some(0.0),
            estimated_server_time_ms: Some(0.0),
            view_interp_delay_ms: Some(0.0),
            shoot_seq: 0.0,
            buttons: 0.0,
            aim_angle: 0.0,
            move_x: 0.0,
            move_y: 0.0,
            cursor_world_x: 0.0,
            cursor_world_y: 0.0,
        }
    }

    #[test]
    fn client_message_roundtrips_through_json() {
        let msg = ClientMessage::SetCharacter {
            character_id: "sheriff".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn input_message_tag_is_input() {
        let json = serde_json::to_value(ClientMessage::Input(sample_input())).unwrap();
        assert_eq!(json["type"], "input");
    }

    #[test]
    fn reconnect_message_roundtrips_through_json() {
        let msg = ClientMessage::Reconnect {
            session_id: 42,
            player_id: 3,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn nan_input_field_is_not_finite() {
        let mut input = sample_input();
        assert!(input.all_fields_finite());
        input.move_x = f64::NAN;
        assert!(!input.all_fields_finite());
    }

    #[test]
    fn missing_timing_fields_detected() {
        let mut input = sample_input();
        assert!(input.has_timing_fields());
        input.view_interp_delay_ms = None;
        assert!(!input.has_timing_fields());
    }

    #[test]
    fn missing_timing_fields_deserialize_as_none() {
        let json = r#"{"seq":1.0,"clientTick":0.0,"shootSeq":0.0,"buttons":0.0,
            "aimAngle":0.0,"moveX":0.0,"moveY":0.0,"cursorWorldX":0.0,"cursorWorldY":0.0}"#;
        let input: NetworkInput = serde_json::from_str(json).unwrap();
        assert!(!input.has_timing_fields());
        assert!(input.core_fields_finite());
    }

    #[test]
    fn server_message_roundtrips() {
        let msg = ServerMessage::IncompatibleProtocol {
            reason: "missing timing fields".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
