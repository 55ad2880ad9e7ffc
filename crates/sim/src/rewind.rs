//! Rewind history (C4): a bounded ring of per-tick lightweight hit-test
//! state, used for lag-compensated hit validation. Ring mechanics grounded
//! in the pack's `SnapshotBuffer` push/get-by-tick/eviction pattern.

use std::collections::HashMap;

use crate::{EntityId, Tick, World};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRewindState {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyRewindState {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub alive: bool,
}

#[derive(Debug, Clone)]
pub struct RewindFrame {
    pub tick: Tick,
    pub players: HashMap<EntityId, PlayerRewindState>,
    pub enemies: HashMap<EntityId, EnemyRewindState>,
}

/// Bounded ring of `RewindFrame`s. Capacity is fixed at construction
/// (SPEC_FULL §4.4: `ceil(maxRewindMs * tickHz / 1000) + slack`).
pub struct RewindHistory {
    frames: Vec<Option<RewindFrame>>,
    write_pos: usize,
    len: usize,
    history_misses: u64,
}

impl RewindHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rewind history capacity must be positive");
        Self {
            frames: vec![None; capacity],
            write_pos: 0,
            len: 0,
            history_misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Records a frame snapshotting the world's current hit-test state for
    /// `world.tick`, evicting the oldest frame if the ring is full.
    pub fn record(&mut self, world: &World) {
        let mut players = HashMap::new();
        for eid in world.components.player_ids() {
            if let Some(pos) = world.components.position.get(eid) {
                players.insert(
                    eid,
                    PlayerRewindState {
                        x: pos.x,
                        y: pos.y,
                    },
                );
            }
        }

        let mut enemies = HashMap::new();
        for eid in world.components.enemy.ids() {
            if let Some(pos) = world.components.position.get(eid) {
                let radius = world.components.collider.get(eid).map_or(0.0, |c| c.radius);
                let alive = !world.components.dead.has(eid);
                enemies.insert(
                    eid,
                    EnemyRewindState {
                        x: pos.x,
                        y: pos.y,
                        radius,
                        alive,
                    },
                );
            }
        }

        let frame = RewindFrame {
            tick: world.tick,
            players,
            enemies,
        };
        self.frames[self.write_pos] = Some(frame);
        self.write_pos = (self.write_pos + 1) % self.frames.len();
        self.len = (self.len + 1).min(self.frames.len());
    }

    fn frame_at_or_before(&self, tick: Tick) -> Option<&RewindFrame> {
        self.frames
            .iter()
            .flatten()
            .filter(|f| f.tick <= tick)
            .max_by_key(|f| f.tick)
    }

    /// Returns the player record from the latest frame whose tick is `<=
    /// requested`. Returns `None` if no such frame exists (history miss).
    pub fn get_player_at_tick(&mut self, eid: EntityId, tick: Tick) -> Option<PlayerRewindState> {
        match self.frame_at_or_before(tick).and_then(|f| f.players.get(&eid).copied()) {
            Some(v) => Some(v),
            None => {
                self.history_misses += 1;
                None
            }
        }
    }

    /// Same at-or-before semantics, includes the `alive` flag.
    pub fn get_enemy_state_at_tick(&mut self, eid: EntityId, tick: Tick) -> Option<EnemyRewindState> {
        match self.frame_at_or_before(tick).and_then(|f| f.enemies.get(&eid).copied()) {
            Some(v) => Some(v),
            None => {
                self.history_misses += 1;
                None
            }
        }
    }

    pub fn has_tick(&self, tick: Tick) -> bool {
        self.frames.iter().flatten().any(|f| f.tick == tick)
    }

    pub fn oldest_tick(&self) -> Option<Tick> {
        self.frames.iter().flatten().map(|f| f.tick).min()
    }

    pub fn newest_tick(&self) -> Option<Tick> {
        self.frames.iter().flatten().map(|f| f.tick).max()
    }

    pub fn history_misses(&self) -> u64 {
        self.history_misses
    }

    pub fn clear(&mut self) {
        for slot in self.frames.iter_mut() {
            *slot = None;
        }
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tick: Tick, eid: EntityId, x: f32, y: f32) -> RewindFrame {
        let mut players = HashMap::new();
        players.insert(eid, PlayerRewindState { x, y });
        RewindFrame {
            tick,
            players,
            enemies: HashMap::new(),
        }
    }

    #[test]
    fn at_or_before_lookup_scenario() {
        // concrete scenario from SPEC_FULL §8: tick 20 at (100,100), tick 21 at (120,100)
        let mut history = RewindHistory::new(8);
        history.frames[0] = Some(frame(20, 1, 100.0, 100.0));
        history.write_pos = 1;
        history.len = 1;
        history.frames[1] = Some(frame(21, 1, 120.0, 100.0));
        history.write_pos = 2;
        history.len = 2;

        assert_eq!(
            history.get_player_at_tick(1, 22),
            Some(PlayerRewindState { x: 120.0, y: 100.0 })
        );
        assert_eq!(history.get_player_at_tick(1, 19), None);
    }

    #[test]
    fn stable_for_older_tick_after_insert() {
        let mut history = RewindHistory::new(8);
        history.frames[0] = Some(frame(10, 1, 1.0, 1.0));
        history.write_pos = 1;
        history.len = 1;
        let before = history.get_player_at_tick(1, 10);
        history.frames[1] = Some(frame(11, 1, 2.0, 2.0));
        history.write_pos = 2;
        history.len = 2;
        let after = history.get_player_at_tick(1, 10);
        assert_eq!(before, after);
    }

    #[test]
    fn eviction_respects_capacity() {
        let mut history = RewindHistory::new(3);
        for t in 0..5u32 {
            history.frames[history.write_pos] = Some(RewindFrame {
                tick: t,
                players: HashMap::new(),
                enemies: HashMap::new(),
            });
            history.write_pos = (history.write_pos + 1) % history.frames.len();
            history.len = (history.len + 1).min(history.frames.len());
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.oldest_tick(), Some(2));
        assert_eq!(history.newest_tick(), Some(4));
    }
}
