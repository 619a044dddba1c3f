//! Settings / Configuration.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// The port the application server is published on.
pub const DEFAULT_PORT: u16 = 4004;

/// Names of environments for hackrx-server.
/// Overrides serialization to force lower case in settings and
/// environment variables
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    /// Local environment (local testing).
    Local,
    /// Official Develop environment.
    Dev,
    /// Official environment.
    Staging,
    /// Official Production environment.
    Prod,
}

/// Implement display to force environment to lower case
impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

/// Server settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    /// Server [AppEnvironment].
    pub environment: AppEnvironment,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Server metrics port.
    pub metrics_port: u16,
    /// Server timeout in milliseconds.
    pub timeout_ms: u64,
    /// Prefix for the API routes, e.g. `/api/v1`. Empty for none.
    #[serde(default)]
    pub root_endpoint: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Server {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Local,
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_PORT + 1,
            timeout_ms: 120_000,
            root_endpoint: "/api/v1".to_string(),
        }
    }
}

impl Server {
    /// The route prefix, normalized to either `""` or `/segment[/segment..]`.
    pub fn route_prefix(&self) -> String {
        let trimmed = self.root_endpoint.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Document storage settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
    /// Where downloaded documents and `meta.json` live.
    /// Relative paths are relative to the settings file.
    pub downloads_dir: PathBuf,
}

/// Question answering pipeline settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Pipeline {
    /// How many questions are answered concurrently.
    pub max_workers: usize,
    /// Time budget per question in milliseconds.
    pub question_timeout_ms: u64,
    /// Words per retrieval chunk.
    pub chunk_words: usize,
    /// Words shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// How many chunks are handed to the generator.
    pub top_k: usize,
}

impl Pipeline {
    /// Convert `question_timeout_ms` to [Duration].
    pub fn question_timeout(&self) -> Duration {
        Duration::from_millis(self.question_timeout_ms)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            max_workers: 5,
            question_timeout_ms: 30_000,
            chunk_words: 120,
            chunk_overlap: 30,
            top_k: 3,
        }
    }
}

/// Which answer generator to run.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    /// Answer with sentences taken from the document.
    Extractive,
    /// Ask an OpenAI-compatible chat completions endpoint.
    Chat,
}

/// Answer generator settings.
#[derive(Clone, Deserialize)]
pub struct Generator {
    /// Generator implementation.
    pub kind: GeneratorKind,
    /// Base URL of the chat completions API, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub endpoint: String,
    /// Model name sent with chat requests.
    #[serde(default)]
    pub model: String,
    /// Bearer token for the chat API.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Generator")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Result notification settings.
#[derive(Clone, Default, Deserialize)]
pub struct Notifier {
    /// Discord webhook the answers get posted to. Empty disables notifications.
    #[serde(default)]
    pub discord_webhook_url: String,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Notifier")
            .field("discord_webhook_configured", &!self.discord_webhook_url.is_empty())
            .finish()
    }
}

/// Event channel settings.
#[derive(Clone, Debug, Deserialize)]
pub struct Events {
    /// Whether events get published to redis at all.
    #[serde(rename = "enabled")]
    pub is_enabled: bool,
    /// Redis connection URL.
    pub redis_url: String,
    /// Pub/sub channel name.
    pub channel: String,
}

/// Request authorization settings.
#[derive(Clone, Default, Deserialize)]
pub struct Auth {
    /// When set, requests to the run endpoint need `Authorization: Bearer <token>`.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Auth")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Background healthcheck settings
#[derive(Clone, Debug, Deserialize)]
pub struct Healthcheck {
    /// Is background healthcheck enabled?
    #[serde(rename = "enabled")]
    pub is_enabled: bool,
    /// Healthcheck interval in milliseconds.
    pub interval_ms: u64,
    /// Healthcheck max retries.
    pub max_retries: u32,
}

#[derive(Clone, Debug, Deserialize)]
/// Application settings.
pub struct Settings {
    /// Server settings
    pub server: Server,
    /// Document storage settings
    pub storage: Storage,
    /// Outbound http client settings
    #[serde(default)]
    pub http_client: HttpClient,
    /// Pipeline settings
    #[serde(default)]
    pub pipeline: Pipeline,
    /// Generator settings
    pub generator: Generator,
    /// Notification settings
    #[serde(default)]
    pub notifier: Notifier,
    /// Event channel settings
    pub events: Events,
    /// Authorization settings
    #[serde(default)]
    pub auth: Auth,
    /// Healthcheck settings
    pub healthcheck: Healthcheck,
    /// The path where the settings file resides.
    /// This can't actually be configured in the settings file itself, for obvious reasons.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Load settings.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path
            .unwrap_or(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/settings.toml"));
        // inject environment variables naming them properly on the settings
        // e.g. [server] port=4004
        // would be injected with environment variable HACKRX_SERVER_SERVER__PORT=4004
        let s = Config::builder()
            .add_source(File::with_name(&path.as_path().display().to_string()))
            .add_source(environment())
            .build()?;
        let mut settings: Self = s.try_deserialize()?;
        settings.path = Some(path);
        Ok(settings)
    }

    /// Return the downloads directory relative to the current working directory
    /// (as opposed to `self.storage.downloads_dir`, which is relative to the
    /// settings file)
    pub fn relative_downloads_dir(&self) -> PathBuf {
        if self.storage.downloads_dir.is_absolute() {
            return self.storage.downloads_dir.clone();
        }

        if let Some(settings_dir) = self.path.as_ref().and_then(|p| p.parent()) {
            settings_dir.join(&self.storage.downloads_dir)
        } else {
            self.storage.downloads_dir.clone()
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("HACKRX_SERVER")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Http-client retry options.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpClientRetryOptions {
    /// Retry count.
    pub count: u8,
    /// Retry lower bounds for [reqwest_retry::policies::ExponentialBackoff].
    pub bounds_low_ms: u64,
    /// Retry upper bounds for [reqwest_retry::policies::ExponentialBackoff].
    pub bounds_high_ms: u64,
}

impl Default for HttpClientRetryOptions {
    fn default() -> Self {
        Self {
            bounds_high_ms: 5_000,
            bounds_low_ms: 100,
            count: 3,
        }
    }
}

/// Settings for Http clients.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpClient {
    /// Optional timeout for idle sockets being kept-alive.
    /// Using `None` to disable timeout.
    pub pool_idle_timeout_ms: Option<u64>,
    #[serde(default)]
    /// Http-client retry options.
    pub retry_options: HttpClientRetryOptions,
    /// Client timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            pool_idle_timeout_ms: Some(5_000),
            retry_options: HttpClientRetryOptions::default(),
            timeout_ms: 30_000,
        }
    }
}

impl HttpClient {
    /// Convert `pool_idle_timeout_ms` to [Duration].
    pub fn pool_idle_timeout(&self) -> Option<Duration> {
        self.pool_idle_timeout_ms.and_then(|timeout| {
            if timeout != 0 {
                Some(Duration::from_millis(timeout))
            } else {
                None
            }
        })
    }

    /// Convert `timeout_ms` to [Duration].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use config::{FileFormat, Map};

    #[derive(Debug, Deserialize)]
    struct Client {
        #[serde(default)]
        http_client: HttpClient,
    }

    fn load_client(toml: &str, env: &[(&str, &str)]) -> Result<Client, ConfigError> {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Map<_, _>>();

        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(environment().source(Some(env)))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_missing_http_client_section_uses_defaults() -> Result<(), ConfigError> {
        let settings = load_client("", &[])?;

        assert_eq!(
            settings.http_client.pool_idle_timeout(),
            Some(Duration::from_millis(5_000))
        );
        assert_eq!(settings.http_client.retry_options.bounds_high_ms, 5_000);
        assert_eq!(settings.http_client.retry_options.bounds_low_ms, 100);
        assert_eq!(settings.http_client.retry_options.count, 3);
        assert_eq!(settings.http_client.timeout(), Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn test_http_client_section_without_retries() -> Result<(), ConfigError> {
        let settings = load_client(
            r#"
            [http_client]
            pool_idle_timeout_ms = 0
            timeout_ms = 100
            "#,
            &[],
        )?;

        assert_eq!(settings.http_client.pool_idle_timeout(), None);
        assert_eq!(settings.http_client.timeout(), Duration::from_millis(100));
        assert_eq!(settings.http_client.retry_options.count, 3);
        Ok(())
    }

    #[test]
    fn test_http_client_section_requires_timeout() {
        let result = load_client(
            r#"
            [http_client]
            pool_idle_timeout_ms = 1000
            "#,
            &[],
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_environment_overrides_file() -> Result<(), ConfigError> {
        let settings = load_client(
            r#"
            [http_client]
            timeout_ms = 100

            [http_client.retry_options]
            count = 10
            bounds_low_ms = 10
            bounds_high_ms = 100
            "#,
            &[
                ("HACKRX_SERVER_HTTP_CLIENT__TIMEOUT_MS", "250"),
                ("HACKRX_SERVER_HTTP_CLIENT__RETRY_OPTIONS__COUNT", "1"),
            ],
        )?;

        assert_eq!(settings.http_client.timeout(), Duration::from_millis(250));
        assert_eq!(settings.http_client.retry_options.count, 1);
        assert_eq!(settings.http_client.retry_options.bounds_high_ms, 100);
        assert_eq!(settings.http_client.pool_idle_timeout(), None);
        Ok(())
    }

    #[test]
    fn test_bundled_settings_load() {
        let settings = Settings::load(None).unwrap();

        // The published port and the bind port have to agree.
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.server.port, 4004);
        assert_eq!(settings.pipeline.max_workers, 5);
        assert_eq!(settings.pipeline.question_timeout(), Duration::from_secs(30));
        assert_eq!(settings.generator.kind, GeneratorKind::Extractive);
        assert_eq!(settings.events.channel, hackrx_core::events::DEFAULT_CHANNEL);
        assert!(settings
            .relative_downloads_dir()
            .ends_with("config/../downloads"));
    }

    #[test]
    fn test_route_prefix_normalization() {
        let mut server = Server {
            environment: AppEnvironment::Local,
            port: DEFAULT_PORT,
            metrics_port: 4005,
            timeout_ms: 1_000,
            root_endpoint: String::new(),
        };
        assert_eq!(server.route_prefix(), "");

        server.root_endpoint = "api/v1/".to_string();
        assert_eq!(server.route_prefix(), "/api/v1");

        server.root_endpoint = "/".to_string();
        assert_eq!(server.route_prefix(), "");
    }

    #[test]
    fn test_secrets_are_not_debug_printed() {
        let auth = Auth {
            bearer_token: Some("hunter2".to_string()),
        };
        assert!(!format!("{auth:?}").contains("hunter2"));

        let notifier = Notifier {
            discord_webhook_url: "https://discord.test/api/webhooks/secret".to_string(),
        };
        assert!(!format!("{notifier:?}").contains("secret"));
    }
}
