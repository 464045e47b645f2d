//! Layered runtime settings: defaults, then `photo-battle.toml`, then
//! `PHOTO_BATTLE__*` environment variables (e.g. `PHOTO_BATTLE__SERVER__PORT`).

use config::{Config, Environment, File};
use pb_core::BattleConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub battle: BattleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    /// Recompute every photo counter from the vote log before serving.
    pub rebuild_tallies_on_start: bool,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let settings = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:photo_battle.db")?
            .set_default("database.max_connections", 5)?
            .set_default("database.rebuild_tallies_on_start", false)?
            .add_source(File::with_name("photo-battle").required(false))
            .add_source(
                Environment::with_prefix("PHOTO_BATTLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_file_or_env() {
        let settings = Settings::load().unwrap();
        assert!(!settings.database.url.is_empty());
        assert!(!settings.database.rebuild_tallies_on_start);
        assert_eq!(settings.battle.pool_limit, pb_core::DEFAULT_POOL_LIMIT);
        assert_eq!(settings.battle.session_idle_secs, pb_core::DEFAULT_SESSION_IDLE_SECS);
    }
}
