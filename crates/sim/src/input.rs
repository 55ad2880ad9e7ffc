//! Per-tick input applied to a player entity by the simulation driver.
//! This is distinct from the wire-level `NetworkInput` (owned by
//! `flowstate-server`/`flowstate-wire`): the driver resolves queued wire
//! inputs, held-input synthesis, and neutral fallback into exactly one of
//! these per player per tick before systems run (SPEC_FULL §4.7 steps 3-7).

/// Transient, edge-sensitive action bits. These must survive queue
/// trimming via OR-merge (SPEC_FULL glossary: "transient action bits").
pub mod buttons {
    pub const SHOOT: u16 = 1 << 0;
    pub const ROLL: u16 = 1 << 1;
    pub const JUMP: u16 = 1 << 2;
    pub const RELOAD: u16 = 1 << 3;
    pub const ABILITY: u16 = 1 << 4;

    pub const TRANSIENT_MASK: u16 = SHOOT | ROLL | JUMP | RELOAD | ABILITY;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AppliedPlayerInput {
    pub move_x: f32,
    pub move_y: f32,
    pub aim_angle: f32,
    pub buttons: u16,
    pub cursor_world_x: f32,
    pub cursor_world_y: f32,
    /// True if this tick's input was synthesized from `heldInputTicks`
    /// rather than popped fresh from the queue (SPEC_FULL §4.7 step 4).
    pub is_held: bool,
}

impl AppliedPlayerInput {
    pub fn has_button(&self, mask: u16) -> bool {
        self.buttons & mask != 0
    }

    /// A held/synthesized copy of this input: transient bits cleared, as
    /// SPEC_FULL §4.7 step 4 requires for held inputs.
    pub fn as_held(&self) -> Self {
        Self {
            buttons: self.buttons & !buttons::TRANSIENT_MASK,
            is_held: true,
            ..*self
        }
    }
}
