//! Version-stamped little-endian binary snapshot codec (C3). Exact byte
//! layout per SPEC_FULL §4.3. Hand-rolled with safe `to_le_bytes`/
//! `from_le_bytes` — no `unsafe`, no transmute tricks (`unsafe_code` is
//! denied crate-wide; the `d77cc064_belst-revtc` pack example's
//! `mem::transmute`-based parser was rejected as a model for this reason).

use std::collections::HashMap;

use flowstate_sim::{EntityId, Tick, World};
use thiserror::Error;

pub const SNAPSHOT_VERSION: u8 = 3;
const HEADER_LEN: usize = 14;
const PLAYER_RECORD_LEN: usize = 21;
const BULLET_RECORD_LEN: usize = 19;
const ENEMY_RECORD_LEN: usize = 13;
const ZONE_RECORD_LEN: usize = 18;

pub mod flags {
    pub const DEAD: u8 = 1 << 0;
    pub const INVINCIBLE: u8 = 1 << 1;
    pub const ROLL_BUTTON_WAS_DOWN: u8 = 1 << 2;
    pub const JUMP_BUTTON_WAS_DOWN: u8 = 1 << 3;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("snapshot frame truncated: need at least {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneRecord {
    pub owner_eid: EntityId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub time_remaining: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRecord {
    pub eid: EntityId,
    pub x: f32,
    pub y: f32,
    pub aim_angle: f32,
    pub state: u8,
    pub hp_clamped: u8,
    pub flags: u8,
    pub last_processed_seq: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletRecord {
    pub eid: EntityId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub layer: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyRecord {
    pub eid: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: u8,
    pub hp_clamped: u8,
    pub ai_state: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub version: u8,
    pub tick: Tick,
    pub server_time: f32,
    pub players: Vec<PlayerRecord>,
    pub bullets: Vec<BulletRecord>,
    pub enemies: Vec<EnemyRecord>,
    pub last_rites_zones: Vec<ZoneRecord>,
    pub dynamite: Vec<ZoneRecord>,
}

/// Clamps a signed health value into `[0, 255]` for one-byte encoding
/// (SPEC_FULL invariant 4 / boundary behavior).
pub fn clamp_health_byte(current: i16) -> u8 {
    current.clamp(0, 255) as u8
}

/// Encodes a world snapshot. `player_seqs` supplies each player's
/// `lastProcessedSeq` for prediction reconciliation; `last_rites_zones`/
/// `dynamite` are opaque ability state the core only needs to pass
/// through byte-for-byte (SPEC_FULL §1).
pub fn encode(
    world: &World,
    server_time: f32,
    player_seqs: &HashMap<EntityId, u32>,
    last_rites_zones: &[ZoneRecord],
    dynamite: &[ZoneRecord],
) -> Vec<u8> {
    let mut player_ids = world.components.player_ids();
    player_ids.sort_unstable();
    let mut bullet_ids = world.components.bullet_ids();
    bullet_ids.sort_unstable();
    let mut enemy_ids = world.components.enemy_ids();
    enemy_ids.sort_unstable();

    let total_len = HEADER_LEN
        + player_ids.len() * PLAYER_RECORD_LEN
        + bullet_ids.len() * BULLET_RECORD_LEN
        + enemy_ids.len() * ENEMY_RECORD_LEN
        + 2
        + last_rites_zones.len() * ZONE_RECORD_LEN
        + dynamite.len() * ZONE_RECORD_LEN;
    let mut buf = Vec::with_capacity(total_len);

    buf.push(SNAPSHOT_VERSION);
    buf.extend_from_slice(&world.tick.to_le_bytes());
    buf.extend_from_slice(&server_time.to_le_bytes());
    buf.push(player_ids.len().min(u8::MAX as usize) as u8);
    buf.extend_from_slice(&(bullet_ids.len().min(u16::MAX as usize) as u16).to_le_bytes());
    buf.extend_from_slice(&(enemy_ids.len().min(u16::MAX as usize) as u16).to_le_bytes());

    for eid in player_ids {
        let pos = world.components.position.get(eid).copied().unwrap_or_default();
        let player = world.components.player.get(eid).copied().unwrap_or_default();
        let state = world
            .components
            .player_state
            .get(eid)
            .map(|s| s.state as u8)
            .unwrap_or(0);
        let hp = world
            .components
            .health
            .get(eid)
            .map(|h| clamp_health_byte(h.current))
            .unwrap_or(0);
        let mut flag_byte = 0u8;
        if world.components.dead.has(eid) {
            flag_byte |= flags::DEAD;
        }
        if world.components.invincible.has(eid) {
            flag_byte |= flags::INVINCIBLE;
        }
        if player.roll_button_was_down {
            flag_byte |= flags::ROLL_BUTTON_WAS_DOWN;
        }
        if player.jump_button_was_down {
            flag_byte |= flags::JUMP_BUTTON_WAS_DOWN;
        }
        let seq = player_seqs.get(&eid).copied().unwrap_or(0);

        buf.extend_from_slice(&eid.to_le_bytes());
        buf.extend_from_slice(&pos.x.to_le_bytes());
        buf.extend_from_slice(&pos.y.to_le_bytes());
        buf.extend_from_slice(&player.aim_angle.to_le_bytes());
        buf.push(state);
        buf.push(hp);
        buf.push(flag_byte);
        buf.extend_from_slice(&seq.to_le_bytes());
    }

    for eid in bullet_ids {
        let pos = world.components.position.get(eid).copied().unwrap_or_default();
        let vel = world.components.velocity.get(eid).copied().unwrap_or_default();
        let layer = world.components.collider.get(eid).map_or(0, |c| c.layer);

        buf.extend_from_slice(&eid.to_le_bytes());
        buf.extend_from_slice(&pos.x.to_le_bytes());
        buf.extend_from_slice(&pos.y.to_le_bytes());
        buf.extend_from_slice(&vel.x.to_le_bytes());
        buf.extend_from_slice(&vel.y.to_le_bytes());
        buf.push(layer);
    }

    for eid in enemy_ids {
        let pos = world.components.position.get(eid).copied().unwrap_or_default();
        let enemy = world.components.enemy.get(eid).copied().unwrap_or_default();
        let hp = world
            .components
            .health
            .get(eid)
            .map(|h| clamp_health_byte(h.current))
            .unwrap_or(0);
        let ai_state = world.components.enemy_ai.get(eid).map_or(0, |a| a.state);

        buf.extend_from_slice(&eid.to_le_bytes());
        buf.extend_from_slice(&pos.x.to_le_bytes());
        buf.extend_from_slice(&pos.y.to_le_bytes());
        buf.push(enemy.kind);
        buf.push(hp);
        buf.push(ai_state);
    }

    buf.push(last_rites_zones.len().min(u8::MAX as usize) as u8);
    for zone in last_rites_zones {
        encode_zone(&mut buf, zone);
    }
    buf.push(dynamite.len().min(u8::MAX as usize) as u8);
    for zone in dynamite {
        encode_zone(&mut buf, zone);
    }

    buf
}

fn encode_zone(buf: &mut Vec<u8>, zone: &ZoneRecord) {
    buf.extend_from_slice(&zone.owner_eid.to_le_bytes());
    buf.extend_from_slice(&zone.x.to_le_bytes());
    buf.extend_from_slice(&zone.y.to_le_bytes());
    buf.extend_from_slice(&zone.radius.to_le_bytes());
    buf.extend_from_slice(&zone.time_remaining.to_le_bytes());
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn need(&self, len: usize) -> Result<(), CodecError> {
        if self.pos + len > self.bytes.len() {
            Err(CodecError::Truncated {
                needed: self.pos + len,
                have: self.bytes.len(),
            })
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.bytes[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        self.need(4)?;
        let v = f32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }
}

fn decode_zone(cursor: &mut Cursor) -> Result<ZoneRecord, CodecError> {
    Ok(ZoneRecord {
        owner_eid: cursor.u16()?,
        x: cursor.f32()?,
        y: cursor.f32()?,
        radius: cursor.f32()?,
        time_remaining: cursor.f32()?,
    })
}

/// Decodes a snapshot frame. A version byte that doesn't match
/// [`SNAPSHOT_VERSION`] is a fatal error (SPEC_FULL invariant 3) — the
/// frame must be treated as unusable, never partially interpreted.
pub fn decode(bytes: &[u8]) -> Result<WorldSnapshot, CodecError> {
    let mut cursor = Cursor::new(bytes);
    let version = cursor.u8()?;
    if version != SNAPSHOT_VERSION {
        return Err(CodecError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: version,
        });
    }

    let tick = cursor.u32()?;
    let server_time = cursor.f32()?;
    let player_count = cursor.u8()? as usize;
    let bullet_count = cursor.u16()? as usize;
    let enemy_count = cursor.u16()? as usize;

    let mut players = Vec::with_capacity(player_count);
    for _ in 0..player_count {
        players.push(PlayerRecord {
            eid: cursor.u16()?,
            x: cursor.f32()?,
            y: cursor.f32()?,
            aim_angle: cursor.f32()?,
            state: cursor.u8()?,
            hp_clamped: cursor.u8()?,
            flags: cursor.u8()?,
            last_processed_seq: cursor.u32()?,
        });
    }

    let mut bullets = Vec::with_capacity(bullet_count);
    for _ in 0..bullet_count {
        bullets.push(BulletRecord {
            eid: cursor.u16()?,
            x: cursor.f32()?,
            y: cursor.f32()?,
            vx: cursor.f32()?,
            vy: cursor.f32()?,
            layer: cursor.u8()?,
        });
    }

    let mut enemies = Vec::with_capacity(enemy_count);
    for _ in 0..enemy_count {
        enemies.push(EnemyRecord {
            eid: cursor.u16()?,
            x: cursor.f32()?,
            y: cursor.f32()?,
            kind: cursor.u8()?,
            hp_clamped: cursor.u8()?,
            ai_state: cursor.u8()?,
        });
    }

    let zone_count = cursor.u8()? as usize;
    let mut last_rites_zones = Vec::with_capacity(zone_count);
    for _ in 0..zone_count {
        last_rites_zones.push(decode_zone(&mut cursor)?);
    }

    let dynamite_count = cursor.u8()? as usize;
    let mut dynamite = Vec::with_capacity(dynamite_count);
    for _ in 0..dynamite_count {
        dynamite.push(decode_zone(&mut cursor)?);
    }

    Ok(WorldSnapshot {
        version,
        tick,
        server_time,
        players,
        bullets,
        enemies,
        last_rites_zones,
        dynamite,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_sim::World;

    #[test]
    fn empty_world_is_sixteen_bytes() {
        let world = World::new(1, 60);
        let bytes = encode(&world, 0.0, &HashMap::new(), &[], &[]);
        assert_eq!(bytes.len(), HEADER_LEN + 2);
    }

    #[test]
    fn byte_count_matches_formula() {
        let mut world = World::new(1, 60);
        for i in 0..2 {
            world.spawn_player(i);
        }
        for _ in 0..20 {
            let owner = world.components.player_ids()[0];
            world.spawn_bullet(owner, 0.0, 0.0, 1.0, 0.0, 5, 10.0);
        }
        for _ in 0..30 {
            world.spawn_enemy(0, 0, 0.0, 0.0, 5);
        }
        let bytes = encode(&world, 0.0, &HashMap::new(), &[], &[]);
        assert_eq!(bytes.len(), 902);
    }

    #[test]
    fn decode_inverts_encode() {
        let mut world = World::new(1, 60);
        let eid = world.spawn_player(3);
        world.components.position.get_mut(eid).unwrap().x = 12.5;
        world.components.position.get_mut(eid).unwrap().y = -4.0;

        let mut seqs = HashMap::new();
        seqs.insert(eid, 77u32);
        let bytes = encode(&world, 1.5, &seqs, &[], &[]);
        let snap = decode(&bytes).unwrap();

        assert_eq!(snap.tick, world.tick);
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].eid, eid);
        assert_eq!(snap.players[0].x, 12.5);
        assert_eq!(snap.players[0].y, -4.0);
        assert_eq!(snap.players[0].last_processed_seq, 77);
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let world = World::new(1, 60);
        let mut bytes = encode(&world, 0.0, &HashMap::new(), &[], &[]);
        bytes[0] = SNAPSHOT_VERSION + 1;
        assert_eq!(
            decode(&bytes),
            Err(CodecError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: SNAPSHOT_VERSION + 1,
            })
        );
    }

    #[test]
    fn hp_clamps_to_byte_range() {
        assert_eq!(clamp_health_byte(500), 255);
        assert_eq!(clamp_health_byte(-10), 0);
        assert_eq!(clamp_health_byte(40), 40);
    }

    #[test]
    fn dead_enemy_omitted_dead_player_included() {
        let mut world = World::new(1, 60);
        let player = world.spawn_player(0);
        world.components.dead.insert(player, flowstate_sim::Dead);
        let enemy = world.spawn_enemy(0, 0, 0.0, 0.0, 5);
        world.components.dead.insert(enemy, flowstate_sim::Dead);

        let bytes = encode(&world, 0.0, &HashMap::new(), &[], &[]);
        let snap = decode(&bytes).unwrap();

        assert_eq!(snap.enemies.len(), 0);
        assert_eq!(snap.players.len(), 1);
        assert_ne!(snap.players[0].flags & flags::DEAD, 0);
    }
}
