//! Player slot and room state (generalized from this crate's original
//! `Session`/`Server`: N player slots instead of a fixed pair, a full
//! arena `World` instead of a two-`Character` toy, and a 30s reconnect
//! grace window instead of unconditional disconnect).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flowstate_sim::{systems, EntityId, PlayerId, RewindHistory, SystemRegistry, World};
use flowstate_wire::{GameConfig, HudMessage, NetworkInput, PlayerRosterEntry, ServerMessage};

use crate::input_queue::InputQueue;
use crate::telemetry::TelemetryAccumulator;
use crate::tick_mapper::ClientTickMapper;
use crate::validation::{self, FieldCheck};

pub const RECONNECT_GRACE: Duration = Duration::from_secs(30);
pub const REWIND_CAPACITY: usize = 180;
pub const MAX_REWIND_TICKS: u32 = 90;

/// Fixed set standing in for the real skill-tree data the distillation
/// dropped (SPEC_FULL §9); spec.md is silent on valid node ids and
/// explicitly calls for rejecting unknown ones rather than guessing.
pub const NODE_ALLOWLIST: &[&str] = &[
    "vitality",
    "reload_speed",
    "move_speed",
    "bullet_damage",
    "crit_chance",
    "dash_cooldown",
];
const MAX_NODE_ID_LEN: usize = 64;

/// Per-connected-player bookkeeping: queue, rate limiter, tick mapper,
/// and the last-applied input used for held-input synthesis.
pub struct PlayerSlot {
    pub eid: EntityId,
    pub character_id: String,
    pub queue: InputQueue,
    pub tick_mapper: ClientTickMapper,
    pub last_applied: flowstate_sim::AppliedPlayerInput,
    pub held_input_ticks: u32,
    pub last_shoot_seq: u64,
    pub protocol_mismatch_notified: bool,
    pub disconnected_at: Option<Instant>,
}

impl PlayerSlot {
    fn new(eid: EntityId, character_id: String, now: Instant) -> Self {
        Self {
            eid,
            character_id,
            queue: InputQueue::new(now),
            tick_mapper: ClientTickMapper::new(),
            last_applied: flowstate_sim::AppliedPlayerInput::default(),
            held_input_ticks: 0,
            last_shoot_seq: 0,
            protocol_mismatch_notified: false,
            disconnected_at: None,
        }
    }
}

/// A running match: the simulation `World`, its rewind history, the
/// system registry, and every connected player's slot.
pub struct Room {
    pub world: World,
    pub rewind: Arc<Mutex<RewindHistory>>,
    pub registry: SystemRegistry,
    pub slots: HashMap<PlayerId, PlayerSlot>,
    pub session_id: u64,
    pub telemetry: TelemetryAccumulator,
    next_player_id: PlayerId,
}

impl Room {
    pub fn new(seed: u32, tick_rate_hz: u32, session_id: u64) -> Self {
        let rewind = Arc::new(Mutex::new(RewindHistory::new(REWIND_CAPACITY)));
        let registry = systems::default_registry(Arc::clone(&rewind));
        Self {
            world: World::new(seed, tick_rate_hz),
            rewind,
            registry,
            slots: HashMap::new(),
            session_id,
            telemetry: TelemetryAccumulator::default(),
            next_player_id: 0,
        }
    }

    pub fn join(&mut self, character_id: String, now: Instant) -> (PlayerId, GameConfig) {
        let player_id = self.next_player_id;
        self.next_player_id += 1;
        let eid = self.world.spawn_player(player_id);
        self.slots
            .insert(player_id, PlayerSlot::new(eid, character_id, now));
        let config = self.game_config_for(player_id).expect("slot just inserted");
        (player_id, config)
    }

    /// Builds the `game-config` payload for an already-joined player
    /// (sent on join, character change, reconnect, and on request per
    /// spec.md §6).
    pub fn game_config_for(&self, player_id: PlayerId) -> Option<GameConfig> {
        let slot = self.slots.get(&player_id)?;
        let roster = self
            .slots
            .values()
            .map(|slot| PlayerRosterEntry {
                eid: slot.eid,
                character_id_index: 0,
            })
            .collect();
        Some(GameConfig {
            seed: self.world.seed,
            session_id: self.session_id,
            player_eid: slot.eid,
            character_id: slot.character_id.clone(),
            roster,
            nodes_taken: None,
        })
    }

    pub fn mark_disconnected(&mut self, player_id: PlayerId, now: Instant) {
        if let Some(slot) = self.slots.get_mut(&player_id) {
            slot.disconnected_at = Some(now);
        }
    }

    /// Resumes a held slot (spec.md:143): requires the slot to currently
    /// be within its disconnect grace window, and resets the queue,
    /// token bucket, held-input counter, tick mapper and shoot-seq so a
    /// reconnecting client starts clean instead of replaying stale state.
    /// Rejects resuming a slot that isn't actually disconnected, so a
    /// client can't hijack another player's active slot by guessing its
    /// id.
    pub fn reconnect(&mut self, player_id: PlayerId, now: Instant) -> bool {
        let Some(slot) = self.slots.get_mut(&player_id) else {
            return false;
        };
        if slot.disconnected_at.is_none() {
            return false;
        }
        slot.disconnected_at = None;
        slot.queue = InputQueue::new(now);
        slot.tick_mapper = ClientTickMapper::new();
        slot.held_input_ticks = 0;
        slot.last_shoot_seq = 0;
        true
    }

    /// Validates a `select-node` request against the closed allowlist and
    /// reports the outcome (SPEC_FULL §9: fail closed on unknown ids).
    pub fn select_node(&self, player_id: PlayerId, node_id: &str) -> ServerMessage {
        let accepted = node_id.len() <= MAX_NODE_ID_LEN
            && NODE_ALLOWLIST.contains(&node_id)
            && self.slots.contains_key(&player_id);
        ServerMessage::SelectNodeResult {
            success: accepted,
            node_id: node_id.to_string(),
        }
    }

    /// Removes every slot whose reconnect grace window has elapsed.
    pub fn expire_disconnected(&mut self, now: Instant) -> Vec<PlayerId> {
        let expired: Vec<PlayerId> = self
            .slots
            .iter()
            .filter(|(_, slot)| {
                slot.disconnected_at
                    .is_some_and(|t| now.duration_since(t) >= RECONNECT_GRACE)
            })
            .map(|(&id, _)| id)
            .collect();
        for player_id in &expired {
            if let Some(slot) = self.slots.remove(player_id) {
                self.world.components.remove_entity(slot.eid);
            }
        }
        expired
    }

    /// Validates, clamps and enqueues a raw client input. Returns a
    /// message to send back (e.g. `incompatible-protocol`) when one is
    /// warranted.
    pub fn handle_input(
        &mut self,
        player_id: PlayerId,
        raw: &NetworkInput,
        now: Instant,
    ) -> Option<ServerMessage> {
        let slot = self.slots.get_mut(&player_id)?;
        match validation::check_fields(raw) {
            FieldCheck::DroppedNanInf => None,
            FieldCheck::DroppedMissingTiming => {
                if slot.protocol_mismatch_notified {
                    None
                } else {
                    slot.protocol_mismatch_notified = true;
                    Some(ServerMessage::IncompatibleProtocol {
                        reason: "missing timing fields".to_string(),
                    })
                }
            }
            FieldCheck::Ok => {
                let clamped = validation::clamp(raw);
                let _ = slot.queue.try_enqueue(clamped, now);
                None
            }
        }
    }

    pub fn hud_for(&self, player_id: PlayerId, server_time_ms: f64) -> Option<HudMessage> {
        let slot = self.slots.get(&player_id)?;
        let health = self.world.components.health.get(slot.eid)?;
        let ammo = self
            .world
            .components
            .cylinder
            .get(slot.eid)
            .map_or(0, |c| c.rounds_loaded as u16);
        Some(HudMessage {
            hp: health.current,
            max_hp: health.max,
            ammo,
            ability_timings: HashMap::new(),
            // No progression system is in scope (SPEC_FULL §1 Non-goals
            // name neither XP/leveling nor wave/stage); these fields are
            // wire-schema-mandatory placeholders, see DESIGN.md.
            xp: 0,
            level: 1,
            wave: 0,
            stage: 0,
            server_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_spawns_player_entity_and_returns_config() {
        let mut room = Room::new(1, 60, 42);
        let now = Instant::now();
        let (player_id, config) = room.join("sheriff".to_string(), now);
        assert_eq!(player_id, 0);
        assert_eq!(config.player_eid, room.slots[&player_id].eid);
        assert_eq!(config.roster.len(), 1);
    }

    #[test]
    fn expire_disconnected_removes_after_grace_window() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        let (player_id, _) = room.join("sheriff".to_string(), now);
        room.mark_disconnected(player_id, now);

        assert!(room.expire_disconnected(now).is_empty());
        let later = now + RECONNECT_GRACE + Duration::from_secs(1);
        let expired = room.expire_disconnected(later);
        assert_eq!(expired, vec![player_id]);
        assert!(!room.slots.contains_key(&player_id));
    }

    #[test]
    fn reconnect_resets_slot_state() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        let (player_id, _) = room.join("sheriff".to_string(), now);

        room.slots.get_mut(&player_id).unwrap().held_input_ticks = 2;
        room.slots.get_mut(&player_id).unwrap().last_shoot_seq = 7;
        room.slots
            .get_mut(&player_id)
            .unwrap()
            .tick_mapper
            .update_offset(100, 40);

        room.mark_disconnected(player_id, now);
        let later = now + Duration::from_secs(1);
        assert!(room.reconnect(player_id, later));

        let slot = &room.slots[&player_id];
        assert!(slot.disconnected_at.is_none());
        assert_eq!(slot.held_input_ticks, 0);
        assert_eq!(slot.last_shoot_seq, 0);
        assert_eq!(slot.tick_mapper.offset_ticks(), 0.0);

        let grace_expiry = later + RECONNECT_GRACE + Duration::from_secs(1);
        assert!(room.expire_disconnected(grace_expiry).is_empty());
    }

    #[test]
    fn reconnect_rejects_slot_that_is_not_disconnected() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        let (player_id, _) = room.join("sheriff".to_string(), now);
        assert!(!room.reconnect(player_id, now));
    }

    #[test]
    fn select_node_rejects_unknown_id() {
        let mut room = Room::new(1, 60, 1);
        let now = Instant::now();
        let (player_id, _) = room.join("sheriff".to_string(), now);

        let accepted = room.select_node(player_id, "vitality");
        assert_eq!(
            accepted,
            ServerMessage::SelectNodeResult {
                success: true,
                node_id: "vitality".to_string(),
            }
        );

        let rejected = room.select_node(player_id, "not_a_real_node");
        assert_eq!(
            rejected,
            ServerMessage::SelectNodeResult {
                success: false,
                node_id: "not_a_real_node".to_string(),
            }
        );
    }
}
