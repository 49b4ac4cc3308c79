use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub scroll: ScrollSettings,
    pub pagination: PaginationSettings,
    pub openai: OpenaiSettings,
    pub email: EmailSettings,
    pub mission: MissionSettings,
    #[serde(default)]
    pub proxies: Vec<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_load_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_load_wait_ms: u64,
    pub user_agent: Option<String>,
}

impl BrowserSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn page_load_wait(&self) -> Duration {
        Duration::from_millis(self.page_load_wait_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScrollSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub increment_px: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub settle_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub check_every: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_iterations: u32,
}

impl ScrollSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct PaginationSettings {
    pub next_link_text: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub wait_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub settle_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_size: u32,
}

impl PaginationSettings {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct OpenaiSettings {
    pub api_key: Option<String>,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_input_chars: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MissionSettings {
    pub model_fallback: bool,
    pub output_dir: String,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No working directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename)).required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("proxies")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
