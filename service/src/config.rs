use clap::builder::TypedValueParser as _;
use clap::Parser;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default PayPal certificate hosts (live and sandbox).
pub const DEFAULT_PAYPAL_CERT_DOMAINS: &str = "api.paypal.com,api.sandbox.paypal.com";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The webhook ID PayPal assigned to this application's webhook subscription.
    #[arg(long, env, default_value = "")]
    paypal_webhook_id: String,

    /// Hosts (and their subdomains) that signing certificates may be fetched from.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = DEFAULT_PAYPAL_CERT_DOMAINS
    )]
    pub paypal_cert_domains: Vec<String>,

    /// Timeout in seconds for a single certificate download
    #[arg(long, env, default_value_t = 5)]
    pub cert_fetch_timeout_secs: u64,

    /// Upper bound in seconds on how long a fetched certificate is reused
    #[arg(long, env, default_value_t = 86400)]
    pub cert_cache_max_age_secs: u64,

    /// Allow plain-http certificate URLs. Only meant for local mock servers.
    #[arg(long, env, default_value_t = false)]
    pub allow_insecure_cert_urls: bool,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Config {
    pub fn paypal_webhook_id(&self) -> &str {
        &self.paypal_webhook_id
    }

    pub fn cert_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.cert_fetch_timeout_secs)
    }

    pub fn cert_cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cert_cache_max_age_secs)
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}
