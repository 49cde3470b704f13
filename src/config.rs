use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid driver URI '{uri}': {reason}")]
    DriverUri { uri: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Gateway configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Bolt endpoint of the database; the scheme decides whether
    /// server-side routing is even considered (`neo4j://` yes, `bolt://` no)
    #[validate(length(min = 1, message = "Driver URI cannot be empty"))]
    pub driver_uri: String,

    /// Service identity the gateway authenticates to the database with
    #[validate(length(min = 1, message = "Driver username cannot be empty"))]
    pub driver_username: String,

    /// Service identity password
    pub driver_password: String,

    /// Record prefetch watermark per PULL
    #[validate(range(
        min = 1,
        max = 1_000_000,
        message = "Fetch size must be between 1 and 1000000"
    ))]
    pub fetch_size: i64,

    /// Fail startup when the database is unreachable
    pub verify_connectivity: bool,

    /// Fallback for the server-side-routing probe when the database cannot
    /// be reached at startup
    pub default_to_ssr: bool,

    /// Force server-side routing, skipping the probe
    pub profile_ssr: bool,

    /// Upper bound on pooled Bolt connections
    #[validate(range(
        min = 1,
        max = 1024,
        message = "Max connections must be between 1 and 1024"
    ))]
    pub max_connections: usize,

    /// Whether to run the server in daemon mode
    pub daemon: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            driver_uri: "bolt://localhost:7687".to_string(),
            driver_username: "neo4j".to_string(),
            driver_password: String::new(),
            fetch_size: 2000,
            verify_connectivity: false,
            default_to_ssr: false,
            profile_ssr: false,
            max_connections: 16,
            daemon: false,
        }
    }
}

impl GatewayConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            http_host: env::var("BOLTGATE_HTTP_HOST").unwrap_or(defaults.http_host),
            http_port: env_parsed("BOLTGATE_HTTP_PORT", defaults.http_port)?,
            driver_uri: env::var("BOLTGATE_DRIVER_URI").unwrap_or(defaults.driver_uri),
            driver_username: env::var("BOLTGATE_DRIVER_USERNAME")
                .unwrap_or(defaults.driver_username),
            driver_password: env::var("BOLTGATE_DRIVER_PASSWORD").unwrap_or_default(),
            fetch_size: env_parsed("BOLTGATE_FETCH_SIZE", defaults.fetch_size)?,
            verify_connectivity: env_parsed(
                "BOLTGATE_VERIFY_CONNECTIVITY",
                defaults.verify_connectivity,
            )?,
            default_to_ssr: env_parsed("BOLTGATE_DEFAULT_TO_SSR", defaults.default_to_ssr)?,
            profile_ssr: env_parsed("BOLTGATE_PROFILE_SSR", defaults.profile_ssr)?,
            max_connections: env_parsed("BOLTGATE_MAX_CONNECTIONS", defaults.max_connections)?,
            daemon: false, // Environment-based config always runs in foreground
        };

        config.validate()?;
        config.parse_driver_uri()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments layered over the environment
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = match &cli.config_file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::from_env()?,
        };
        if let Some(host) = cli.http_host {
            config.http_host = host;
        }
        if let Some(port) = cli.http_port {
            config.http_port = port;
        }
        if let Some(uri) = cli.driver_uri {
            config.driver_uri = uri;
        }
        config.daemon = cli.daemon;

        config.validate()?;
        config.parse_driver_uri()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        config.parse_driver_uri()?;
        Ok(config)
    }

    /// The `host:port` the connection pool dials.
    pub fn bolt_address(&self) -> String {
        match self.parse_driver_uri() {
            Ok(uri) => format!("{}:{}", uri.host, uri.port),
            Err(_) => self.driver_uri.clone(),
        }
    }

    /// Whether the URI scheme allows server-side routing at all.
    pub fn uses_routing_scheme(&self) -> bool {
        matches!(
            self.parse_driver_uri(),
            Ok(BoltUri {
                scheme: BoltScheme::Neo4j,
                ..
            })
        )
    }

    pub fn parse_driver_uri(&self) -> Result<BoltUri, ConfigError> {
        BoltUri::parse(&self.driver_uri)
    }
}

/// Recognised Bolt URI schemes. Encrypted variants are out of scope: TLS
/// terminates in front of the database, not in the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoltScheme {
    Bolt,
    Neo4j,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoltUri {
    pub scheme: BoltScheme,
    pub host: String,
    pub port: u16,
}

impl BoltUri {
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::DriverUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = match scheme.to_lowercase().as_str() {
            "bolt" => BoltScheme::Bolt,
            "neo4j" => BoltScheme::Neo4j,
            _ => return Err(invalid("scheme must be bolt:// or neo4j://")),
        };

        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(invalid("missing host"));
        }
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| invalid("port must be a number between 1 and 65535"))?;
                (host, port)
            }
            None => (rest, 7687),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(BoltUri {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
    pub driver_uri: Option<String>,
    pub config_file: Option<std::path::PathBuf>,
    pub daemon: bool,
}

/// Looks up an environment variable and parses it, falling back to a typed
/// default when the variable is unset. Only a present-but-unparsable value
/// is an error.
fn env_parsed<T>(key: &str, fallback: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Ok(raw) = env::var(key) else {
        return Ok(fallback);
    };
    match raw.parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Parse {
            field: key.to_string(),
            value: raw,
            source: Box::new(e),
        }),
    }
}
