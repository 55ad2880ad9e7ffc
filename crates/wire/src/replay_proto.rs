//! Protobuf messages for the internal replay artifact only. This is the
//! one place `prost` survives the transformation from the teacher
//! (`flowstate-wire::ReplayArtifact`/`AppliedInputProto`): it is a
//! disk-format for `flowstate-replay`, not a wire contract with an
//! external byte-layout requirement, so protobuf framing is fine here
//! even though it cannot serve the live `snapshot` message (§4.3).

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppliedInputProto {
    #[prost(uint32, tag = "1")]
    pub tick: u32,
    #[prost(uint32, tag = "2")]
    pub player_id: u32,
    #[prost(float, tag = "3")]
    pub move_x: f32,
    #[prost(float, tag = "4")]
    pub move_y: f32,
    #[prost(float, tag = "5")]
    pub aim_angle: f32,
    #[prost(uint32, tag = "6")]
    pub buttons: u32,
    #[prost(bool, tag = "7")]
    pub is_fallback: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlayerEntityMapping {
    #[prost(uint32, tag = "1")]
    pub player_id: u32,
    #[prost(uint32, tag = "2")]
    pub entity_id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BuildFingerprint {
    #[prost(string, tag = "1")]
    pub binary_sha256: String,
    #[prost(string, tag = "2")]
    pub target_triple: String,
    #[prost(string, tag = "3")]
    pub profile: String,
    #[prost(string, tag = "4")]
    pub git_commit: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReplayArtifact {
    #[prost(uint32, tag = "1")]
    pub seed: u32,
    #[prost(uint32, tag = "2")]
    pub tick_rate_hz: u32,
    #[prost(uint32, tag = "3")]
    pub initial_tick: u32,
    #[prost(uint32, tag = "4")]
    pub checkpoint_tick: u32,
    #[prost(uint64, tag = "5")]
    pub final_digest: u64,
    #[prost(uint64, tag = "6")]
    pub baseline_digest: u64,
    #[prost(string, tag = "7")]
    pub end_reason: String,
    #[prost(uint32, repeated, tag = "8")]
    pub entity_spawn_order: Vec<u32>,
    #[prost(message, repeated, tag = "9")]
    pub player_entity_mapping: Vec<PlayerEntityMapping>,
    #[prost(message, repeated, tag = "10")]
    pub inputs: Vec<AppliedInputProto>,
    #[prost(message, optional, tag = "11")]
    pub build_fingerprint: Option<BuildFingerprint>,
}
