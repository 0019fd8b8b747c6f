use serde::Deserialize;

const CONFIG_FILE: &str = "config/server";
const ENV_PREFIX: &str = "TRAILMAP";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub tracks: TrackSettings,
    #[serde(default)]
    pub relay: RelaySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminSettings {
    /// Shared admin key. When unset no admin key is accepted.
    pub key: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackSettings {
    /// Users shown to anonymous viewers who do not pass `clients`. Empty shows everyone.
    #[serde(default)]
    pub default_clients: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelaySettings {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_channel_capacity() -> usize {
    256
}

/// Loads `config/server.*` (optional) overlaid with `TRAILMAP__*` environment variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(CONFIG_FILE).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("tracks.default_clients")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn from_toml(raw: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = from_toml("");
        assert_eq!(settings.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(settings.admin.key, None);
        assert!(settings.tracks.default_clients.is_empty());
        assert_eq!(settings.relay.channel_capacity, 256);
    }

    #[test]
    fn test_file_values() {
        let settings = from_toml(
            r#"
            [server]
            port = 9000

            [admin]
            key = "s3cret"

            [tracks]
            default_clients = ["abc123", "def456"]
            "#,
        );
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.admin.key.as_deref(), Some("s3cret"));
        assert_eq!(settings.tracks.default_clients, vec!["abc123", "def456"]);
    }
}
