mod settings;

pub use settings::{
    EmailSettings, HubConfig, NotifierConfig, PushSettings, ServerConfig, Settings, SmsSettings,
};
