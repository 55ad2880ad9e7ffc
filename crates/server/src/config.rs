//! Room configuration (SPEC_FULL ambient "Configuration" section):
//! everything that varies per deployment is read once at startup from the
//! environment, the way the teacher's crates read their own runtime
//! knobs rather than hardcoding them.

use std::env;

pub const DEFAULT_PORT: u16 = 2567;
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

#[derive(Debug, Clone, Copy)]
pub struct RoomConfig {
    pub port: u16,
    pub tick_rate_hz: u32,
    pub seed: u32,
}

impl RoomConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let tick_rate_hz = env::var("TICK_RATE_HZ")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TICK_RATE_HZ);
        let seed = env::var("ROOM_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| {
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.subsec_nanos())
                    .unwrap_or(1)
            });
        Self {
            port,
            tick_rate_hz,
            seed,
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            seed: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = RoomConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.tick_rate_hz, 60);
    }
}
