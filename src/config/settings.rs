use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Liveness sweep interval in seconds (server sends heartbeat events)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Outbound event buffer depth per connection
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

/// External sender credentials. A sender is configured iff its credential is
/// present; an unconfigured sender skips messages rather than retrying them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub sms: SmsSettings,
    #[serde(default)]
    pub push: PushSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailSettings {
    pub smtp_url: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsSettings {
    pub api_key: Option<String>,
    pub from_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushSettings {
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_channel_buffer() -> usize {
    64
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8090)?
            .set_default("hub.heartbeat_interval", 30)?
            .set_default("hub.channel_buffer", 64)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables. Sections split on "__" so
            // field names may themselves contain underscores:
            // SERVER__HOST, HUB__HEARTBEAT_INTERVAL, NOTIFIER__EMAIL__SMTP_URL, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8090);

        let hub = HubConfig::default();
        assert_eq!(hub.heartbeat_interval, 30);
        assert_eq!(hub.channel_buffer, 64);
    }

    #[test]
    fn test_notifier_defaults_have_no_credentials() {
        let notifier = NotifierConfig::default();
        assert!(notifier.email.smtp_url.is_none());
        assert!(notifier.sms.api_key.is_none());
        assert!(notifier.push.api_key.is_none());
    }

    #[test]
    fn test_env_overrides_reach_underscored_fields() {
        // Fields with underscores in their own names must survive the
        // section separator; sender toggling depends on these landing.
        env::set_var("HUB__HEARTBEAT_INTERVAL", "5");
        env::set_var("NOTIFIER__EMAIL__SMTP_URL", "smtp://relay:25");
        env::set_var("NOTIFIER__SMS__FROM_NUMBER", "+15550100");

        let settings = Settings::new().unwrap();

        env::remove_var("HUB__HEARTBEAT_INTERVAL");
        env::remove_var("NOTIFIER__EMAIL__SMTP_URL");
        env::remove_var("NOTIFIER__SMS__FROM_NUMBER");

        assert_eq!(settings.hub.heartbeat_interval, 5);
        assert_eq!(
            settings.notifier.email.smtp_url.as_deref(),
            Some("smtp://relay:25")
        );
        assert_eq!(
            settings.notifier.sms.from_number.as_deref(),
            Some("+15550100")
        );
    }
}
