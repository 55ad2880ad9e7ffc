//! Column component storage. Each component type is a dense array indexed
//! directly by `EntityId`; this is what makes the snapshot codec a linear
//! pass over entity ids (SPEC_FULL §3/§9).

use crate::EntityId;

/// A single component column: a dense, entity-id-indexed array.
///
/// Holes (entities without the component) are `None`. Growing the backing
/// `Vec` on insert keeps indexing O(1) without a separate sparse map.
#[derive(Debug, Default, Clone)]
pub struct Column<T> {
    slots: Vec<Option<T>>,
}

impl<T> Column<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn insert(&mut self, entity: EntityId, value: T) {
        let idx = entity as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(value);
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        self.slots.get_mut(entity as usize).and_then(Option::take)
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slots.get(entity as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slots.get_mut(entity as usize).and_then(Option::as_mut)
    }

    pub fn has(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    /// Ids that carry this component, in ascending order. Callers must
    /// treat the returned vec as a read-only per-call snapshot (SPEC_FULL
    /// §4.1 query contract): it is not cached or invalidated across ticks.
    pub fn ids(&self) -> Vec<EntityId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|_| i as EntityId))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Player {
    pub id: u8,
    pub aim_angle: f32,
    pub roll_button_was_down: bool,
    pub jump_button_was_down: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerMotionState {
    #[default]
    Idle = 0,
    Moving = 1,
    Rolling = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub state: PlayerMotionState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Health {
    pub current: i16,
    pub max: i16,
    pub iframes: f32,
    pub iframe_duration: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Collider {
    pub radius: f32,
    pub layer: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bullet {
    pub owner_id: EntityId,
    pub damage: u16,
    pub lifetime: f32,
    pub range: f32,
    pub distance_traveled: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enemy {
    pub kind: u8,
    pub tier: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnemyAI {
    pub state: u8,
    pub state_timer: f32,
    pub target_eid: Option<EntityId>,
    pub initial_delay: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Roll {
    pub elapsed: f32,
    pub duration: f32,
    pub direction_x: f32,
    pub direction_y: f32,
    pub start_x: f32,
    pub start_y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZPosition {
    pub z: f32,
    pub z_velocity: f32,
}

/// Opaque to the core: carried only so membership queries and the snapshot
/// codec's ability-zone sections have something to read. Concrete ability
/// tuning lives outside this crate's scope (SPEC_FULL §1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Showdown {
    pub active: bool,
    pub timer: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cylinder {
    pub rounds_loaded: u8,
    pub capacity: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeleeWeapon {
    pub windup: f32,
    pub active: bool,
}

/// Tag components: zero-sized, presence is the whole signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dead;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invincible;

/// All component columns plus entity id allocation. Entities are 16-bit
/// ids (SPEC_FULL §3); there is no recycling of freed ids within a match.
#[derive(Debug, Default)]
pub struct ComponentStore {
    next_entity_id: u32,
    alive: Column<()>,
    pub position: Column<Position>,
    pub velocity: Column<Velocity>,
    pub player: Column<Player>,
    pub player_state: Column<PlayerState>,
    pub health: Column<Health>,
    pub collider: Column<Collider>,
    pub bullet: Column<Bullet>,
    pub enemy: Column<Enemy>,
    pub enemy_ai: Column<EnemyAI>,
    pub roll: Column<Roll>,
    pub z_position: Column<ZPosition>,
    pub showdown: Column<Showdown>,
    pub cylinder: Column<Cylinder>,
    pub melee_weapon: Column<MeleeWeapon>,
    pub dead: Column<Dead>,
    pub invincible: Column<Invincible>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self) -> EntityId {
        assert!(
            self.next_entity_id <= EntityId::MAX as u32,
            "entity id space exhausted"
        );
        let id = self.next_entity_id as EntityId;
        self.next_entity_id += 1;
        self.alive.insert(id, ());
        id
    }

    pub fn remove_entity(&mut self, id: EntityId) {
        self.alive.remove(id);
        self.position.remove(id);
        self.velocity.remove(id);
        self.player.remove(id);
        self.player_state.remove(id);
        self.health.remove(id);
        self.collider.remove(id);
        self.bullet.remove(id);
        self.enemy.remove(id);
        self.enemy_ai.remove(id);
        self.roll.remove(id);
        self.z_position.remove(id);
        self.showdown.remove(id);
        self.cylinder.remove(id);
        self.melee_weapon.remove(id);
        self.dead.remove(id);
        self.invincible.remove(id);
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.alive.has(id)
    }

    /// Entities snapshotted as players: `Player + Position` (invariant 1).
    pub fn player_ids(&self) -> Vec<EntityId> {
        self.player
            .ids()
            .into_iter()
            .filter(|&id| self.position.has(id))
            .collect()
    }

    /// Entities snapshotted as bullets: `Bullet + Position + Velocity + Collider`.
    pub fn bullet_ids(&self) -> Vec<EntityId> {
        self.bullet
            .ids()
            .into_iter()
            .filter(|&id| self.position.has(id) && self.velocity.has(id) && self.collider.has(id))
            .collect()
    }

    /// Entities snapshotted as enemies: `Enemy + Position + Health + EnemyAI`,
    /// excluding dead ones (invariant 2).
    pub fn enemy_ids(&self) -> Vec<EntityId> {
        self.enemy
            .ids()
            .into_iter()
            .filter(|&id| {
                self.position.has(id)
                    && self.health.has(id)
                    && self.enemy_ai.has(id)
                    && !self.dead.has(id)
            })
            .collect()
    }
}
