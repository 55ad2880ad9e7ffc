#![deny(unsafe_code)]
//! Deterministic entity/component simulation core shared by server
//! authority and client prediction (C1, C2, C8, C9).
//!
//! Pure: no I/O, no wall clock, no ambient randomness. Everything that
//! makes a tick non-deterministic (wire parsing, timers, OS randomness)
//! lives in `flowstate-server`.

mod components;
mod digest;
mod hooks;
mod input;
mod rewind;
mod rng;
pub mod system;
pub mod systems;

pub use components::{
    Bullet, Collider, ComponentStore, Cylinder, Dead, Enemy, EnemyAI, Health, Invincible,
    MeleeWeapon, Player, PlayerMotionState, PlayerState, Position, Roll, Showdown, Velocity,
    ZPosition,
};
pub use digest::{canonicalize_f32, state_digest, Fnv1a64, STATE_DIGEST_ALGO_ID};
pub use hooks::{BulletHitResult, HealthChangedEvent, HookRegistry, KillEvent};
pub use input::{buttons, AppliedPlayerInput};
pub use rewind::{EnemyRewindState, PlayerRewindState, RewindFrame, RewindHistory};
pub use rng::Mulberry32;
pub use system::{step_world, SystemFn, SystemRegistry};

use std::collections::HashMap;

/// Entities are 16-bit ids (SPEC_FULL §3 / Open Question decision).
pub type EntityId = u16;
/// Ticks are `u32`: the snapshot header encodes `tick` as a 4-byte field
/// (SPEC_FULL §4.3), so the in-memory counter matches the wire width.
pub type Tick = u32;
pub type PlayerId = u8;

/// Per-tick ephemeral signalling channel between systems and presentation
/// (SPEC_FULL §4.1). Cleared by the owning system or the driver; never
/// read across ticks.
#[derive(Debug, Default)]
pub struct EphemeralFlags {
    pub showdown_kill_this_tick: bool,
    pub last_rites_pulse_this_tick: bool,
    pub dynamite_detonated_this_tick: bool,
    pub tremor_this_tick: bool,
    pub overkill_processed: std::collections::HashSet<EntityId>,
}

impl EphemeralFlags {
    pub fn clear(&mut self) {
        self.showdown_kill_this_tick = false;
        self.last_rites_pulse_this_tick = false;
        self.dynamite_detonated_this_tick = false;
        self.tremor_this_tick = false;
        self.overkill_processed.clear();
    }
}

/// Read-only scope gate (SPEC_FULL §9): lets the same step functions run
/// client-side against a subset of entities for prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    LocalPlayer(EntityId),
}

/// C1: typed column storage, tick counter, seeded PRNG, hook registry,
/// ephemeral per-tick flags.
pub struct World {
    pub tick: Tick,
    pub time: f64,
    pub tick_rate_hz: u32,
    pub dt_seconds: f32,
    pub seed: u32,
    pub components: ComponentStore,
    pub rng: Mulberry32,
    pub hooks: HookRegistry,
    pub ephemeral: EphemeralFlags,
    pub scope: Scope,
    /// Chosen input per player entity for the tick currently being
    /// stepped, written by the driver before `step_world` runs.
    pub player_inputs: HashMap<EntityId, AppliedPlayerInput>,
    /// Lag-comp shot tick per player entity, written by the driver when a
    /// fresh input carries `SHOOT` (SPEC_FULL §4.7 step 6).
    pub lag_comp_shot_tick_by_player: HashMap<EntityId, Tick>,
}

impl World {
    pub fn new(seed: u32, tick_rate_hz: u32) -> Self {
        assert!(tick_rate_hz > 0, "tick_rate_hz must be positive");
        Self {
            tick: 0,
            time: 0.0,
            tick_rate_hz,
            dt_seconds: 1.0 / tick_rate_hz as f32,
            seed,
            components: ComponentStore::new(),
            rng: Mulberry32::new(seed),
            hooks: HookRegistry::new(),
            ephemeral: EphemeralFlags::default(),
            scope: Scope::All,
            player_inputs: HashMap::new(),
            lag_comp_shot_tick_by_player: HashMap::new(),
        }
    }

    /// Spawns a player entity with `Player + Position + Velocity +
    /// PlayerState + Health + Collider` (the minimal set that satisfies
    /// invariant 1 and gives movement/health systems something to act on).
    pub fn spawn_player(&mut self, player_id: PlayerId) -> EntityId {
        let eid = self.components.add_entity();
        self.components.player.insert(
            eid,
            Player {
                id: player_id,
                aim_angle: 0.0,
                roll_button_was_down: false,
                jump_button_was_down: false,
            },
        );
        self.components.position.insert(eid, Position::default());
        self.components.velocity.insert(eid, Velocity::default());
        self.components.player_state.insert(eid, PlayerState::default());
        self.components.health.insert(
            eid,
            Health {
                current: 100,
                max: 100,
                iframes: 0.0,
                iframe_duration: 0.5,
            },
        );
        self.components
            .collider
            .insert(eid, Collider { radius: 0.5, layer: 0 });
        eid
    }

    pub fn spawn_enemy(&mut self, kind: u8, tier: u8, x: f32, y: f32, max_hp: i16) -> EntityId {
        let eid = self.components.add_entity();
        self.components.enemy.insert(eid, Enemy { kind, tier });
        self.components.position.insert(
            eid,
            Position {
                x,
                y,
                prev_x: x,
                prev_y: y,
            },
        );
        self.components.health.insert(
            eid,
            Health {
                current: max_hp,
                max: max_hp,
                iframes: 0.0,
                iframe_duration: 0.0,
            },
        );
        self.components.enemy_ai.insert(eid, EnemyAI::default());
        self.components
            .collider
            .insert(eid, Collider { radius: 0.5, layer: 1 });
        eid
    }

    pub fn spawn_bullet(
        &mut self,
        owner_id: EntityId,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        damage: u16,
        range: f32,
    ) -> EntityId {
        let eid = self.components.add_entity();
        self.components.position.insert(
            eid,
            Position {
                x,
                y,
                prev_x: x,
                prev_y: y,
            },
        );
        self.components.velocity.insert(eid, Velocity { x: vx, y: vy });
        self.components.bullet.insert(
            eid,
            Bullet {
                owner_id,
                damage,
                lifetime: 3.0,
                range,
                distance_traveled: 0.0,
            },
        );
        self.components
            .collider
            .insert(eid, Collider { radius: 0.1, layer: 2 });
        eid
    }

    pub fn state_digest(&self) -> u64 {
        digest::state_digest(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_and_time_advance_on_step() {
        let mut world = World::new(1, 60);
        let mut registry = SystemRegistry::new();
        registry.push(|_w: &mut World, _dt: f32| {});
        let dt = world.dt_seconds;
        step_world(&mut world, &mut registry, dt);
        assert_eq!(world.tick, 1);
        assert!((world.time - dt as f64).abs() < 1e-9);
    }

    #[test]
    fn tick_monotonic_over_many_steps() {
        let mut world = World::new(1, 60);
        let mut registry = SystemRegistry::new();
        for _ in 0..120 {
            let dt = world.dt_seconds;
            let before = world.tick;
            step_world(&mut world, &mut registry, dt);
            assert_eq!(world.tick, before + 1);
        }
        assert_eq!(world.tick, 120);
    }

    #[test]
    fn spawn_player_satisfies_invariant_one() {
        let mut world = World::new(1, 60);
        let eid = world.spawn_player(0);
        assert!(world.components.player_ids().contains(&eid));
    }

    #[test]
    fn dead_enemy_excluded_from_enemy_ids() {
        let mut world = World::new(1, 60);
        let eid = world.spawn_enemy(0, 0, 0.0, 0.0, 10);
        assert!(world.components.enemy_ids().contains(&eid));
        world.components.dead.insert(eid, Dead);
        assert!(!world.components.enemy_ids().contains(&eid));
    }

    #[test]
    fn state_digest_is_deterministic_for_same_trajectory() {
        let mut world_a = World::new(7, 60);
        let mut world_b = World::new(7, 60);
        let eid_a = world_a.spawn_player(0);
        let eid_b = world_b.spawn_player(0);
        assert_eq!(eid_a, eid_b);

        for world in [&mut world_a, &mut world_b] {
            world.components.position.get_mut(eid_a).unwrap().x = 3.0;
        }
        assert_eq!(world_a.state_digest(), world_b.state_digest());
    }

    #[test]
    fn state_digest_changes_with_position() {
        let mut world = World::new(7, 60);
        let eid = world.spawn_player(0);
        let before = world.state_digest();
        world.components.position.get_mut(eid).unwrap().x = 5.0;
        let after = world.state_digest();
        assert_ne!(before, after);
    }
}
