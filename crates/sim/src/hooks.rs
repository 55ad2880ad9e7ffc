//! Hook registry (C8): a registered multi-handler event bus keyed by event
//! kind, not virtual dispatch (SPEC_FULL §9). Each hook kind is its own
//! priority-sorted handler list; `World` temporarily takes a list out of
//! itself to invoke handlers with `&mut World` and puts it back afterward.

use crate::{EntityId, World};

/// Result of an `onBulletHit` transform hook chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletHitResult {
    pub damage: u16,
    pub pierce: bool,
}

pub struct KillEvent {
    pub killer_eid: Option<EntityId>,
    pub victim_eid: EntityId,
}

pub struct HealthChangedEvent {
    pub eid: EntityId,
    pub previous: i16,
    pub current: i16,
}

type TransformHandler<A, R> = Box<dyn FnMut(&mut World, A) -> R + Send>;
type NotifyHandler<A> = Box<dyn FnMut(&mut World, &A) + Send>;

struct Entry<H> {
    id: String,
    priority: i32,
    handler: H,
}

fn register<H>(list: &mut Vec<Entry<H>>, id: &str, priority: i32, handler: H) {
    list.push(Entry {
        id: id.to_string(),
        priority,
        handler,
    });
    list.sort_by_key(|e| e.priority);
}

fn unregister<H>(list: &mut Vec<Entry<H>>, id: &str) {
    list.retain(|e| e.id != id);
}

/// Registered handlers for every behavioral hook a gameplay system may fire.
#[derive(Default)]
pub struct HookRegistry {
    bullet_hit: Vec<Entry<TransformHandler<(EntityId, EntityId, u16), BulletHitResult>>>,
    kill: Vec<Entry<NotifyHandler<KillEvent>>>,
    roll_dodge: Vec<Entry<NotifyHandler<EntityId>>>,
    cylinder_empty: Vec<Entry<NotifyHandler<EntityId>>>,
    health_changed: Vec<Entry<NotifyHandler<HealthChangedEvent>>>,
    showdown_activate: Vec<Entry<NotifyHandler<EntityId>>>,
    roll_end: Vec<Entry<NotifyHandler<EntityId>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_on_bullet_hit<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, (EntityId, EntityId, u16)) -> BulletHitResult + Send + 'static,
    {
        register(&mut self.bullet_hit, id, priority, Box::new(handler));
    }

    pub fn register_on_kill<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &KillEvent) + Send + 'static,
    {
        register(&mut self.kill, id, priority, Box::new(handler));
    }

    pub fn register_on_roll_dodge<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &EntityId) + Send + 'static,
    {
        register(&mut self.roll_dodge, id, priority, Box::new(handler));
    }

    pub fn register_on_cylinder_empty<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &EntityId) + Send + 'static,
    {
        register(&mut self.cylinder_empty, id, priority, Box::new(handler));
    }

    pub fn register_on_health_changed<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &HealthChangedEvent) + Send + 'static,
    {
        register(&mut self.health_changed, id, priority, Box::new(handler));
    }

    pub fn register_on_showdown_activate<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &EntityId) + Send + 'static,
    {
        register(&mut self.showdown_activate, id, priority, Box::new(handler));
    }

    pub fn register_on_roll_end<F>(&mut self, id: &str, priority: i32, handler: F)
    where
        F: FnMut(&mut World, &EntityId) + Send + 'static,
    {
        register(&mut self.roll_end, id, priority, Box::new(handler));
    }

    /// Removes every handler registered under `id`, across all hook kinds.
    pub fn unregister(&mut self, id: &str) {
        unregister(&mut self.bullet_hit, id);
        unregister(&mut self.kill, id);
        unregister(&mut self.roll_dodge, id);
        unregister(&mut self.cylinder_empty, id);
        unregister(&mut self.health_changed, id);
        unregister(&mut self.showdown_activate, id);
        unregister(&mut self.roll_end, id);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl World {
    /// Fires the `onBulletHit` transform chain. Default (no handlers):
    /// `{ damage, pierce: false }`.
    pub fn fire_on_bullet_hit(
        &mut self,
        bullet_eid: EntityId,
        target_eid: EntityId,
        damage: u16,
    ) -> BulletHitResult {
        let mut handlers = std::mem::take(&mut self.hooks.bullet_hit);
        let mut result = BulletHitResult {
            damage,
            pierce: false,
        };
        for entry in handlers.iter_mut() {
            let r = (entry.handler)(self, (bullet_eid, target_eid, result.damage));
            result.damage = r.damage;
            result.pierce |= r.pierce;
        }
        self.hooks.bullet_hit = handlers;
        result
    }

    pub fn fire_on_kill(&mut self, event: KillEvent) {
        let mut handlers = std::mem::take(&mut self.hooks.kill);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &event);
        }
        self.hooks.kill = handlers;
    }

    pub fn fire_on_roll_dodge(&mut self, eid: EntityId) {
        let mut handlers = std::mem::take(&mut self.hooks.roll_dodge);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &eid);
        }
        self.hooks.roll_dodge = handlers;
    }

    pub fn fire_on_cylinder_empty(&mut self, eid: EntityId) {
        let mut handlers = std::mem::take(&mut self.hooks.cylinder_empty);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &eid);
        }
        self.hooks.cylinder_empty = handlers;
    }

    pub fn fire_on_health_changed(&mut self, event: HealthChangedEvent) {
        let mut handlers = std::mem::take(&mut self.hooks.health_changed);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &event);
        }
        self.hooks.health_changed = handlers;
    }

    pub fn fire_on_showdown_activate(&mut self, eid: EntityId) {
        let mut handlers = std::mem::take(&mut self.hooks.showdown_activate);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &eid);
        }
        self.hooks.showdown_activate = handlers;
    }

    pub fn fire_on_roll_end(&mut self, eid: EntityId) {
        let mut handlers = std::mem::take(&mut self.hooks.roll_end);
        for entry in handlers.iter_mut() {
            (entry.handler)(self, &eid);
        }
        self.hooks.roll_end = handlers;
    }
}
