//! System registry (C2): an ordered list of deterministic step functions
//! `(World, dt) -> ()`, invoked in fixed insertion order every tick.

use crate::World;

pub type SystemFn = Box<dyn FnMut(&mut World, f32) + Send>;

/// Ordered, insertion-order list of systems. Order is a correctness
/// contract (SPEC_FULL §4.2): callers build this once at room setup with
/// the recommended tick order and never reorder it at runtime.
#[derive(Default)]
pub struct SystemRegistry {
    systems: Vec<SystemFn>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, system: F)
    where
        F: FnMut(&mut World, f32) + Send + 'static,
    {
        self.systems.push(Box::new(system));
    }

    /// Appends a system that is already boxed, e.g. one returned by a
    /// factory function that closes over external state (SPEC_FULL §4.4
    /// rewind history, consulted from the collision system).
    pub fn push_boxed(&mut self, system: SystemFn) {
        self.systems.push(system);
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

/// Runs every system in insertion order, then advances `world.tick` by one
/// and `world.time` by `dt`.
pub fn step_world(world: &mut World, registry: &mut SystemRegistry, dt: f32) {
    let mut systems = std::mem::take(&mut registry.systems);
    for system in systems.iter_mut() {
        system(world, dt);
    }
    registry.systems = systems;
    world.tick += 1;
    world.time += dt as f64;
}
