use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{self, ConfigBuilder};

/// Dependency modules whose logs are dropped unless the level is Trace.
/// The certificate fetch pulls in the whole HTTP/TLS stack, which is chatty at Debug.
const FILTERED_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2", "mio"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger for the verifier process.
    ///
    /// Verification events are emitted through `tracing` by `webhook-auth` and arrive here via
    /// tracing's `log` bridge. Outside Trace, only our own modules get through below Warn.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let apply_filters = Self::should_filter_dependencies(config.log_level_filter);
        let log_config = Self::build_log_config(apply_filters, &config.runtime_env);

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    /// Source locations are only printed in development; deployed log aggregation adds its own.
    fn location_level(runtime_env: &RustEnv) -> LevelFilter {
        match runtime_env {
            RustEnv::Development => LevelFilter::Debug,
            RustEnv::Staging | RustEnv::Production => LevelFilter::Off,
        }
    }

    fn build_log_config(apply_filters: bool, runtime_env: &RustEnv) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        builder.set_location_level(Self::location_level(runtime_env));

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
