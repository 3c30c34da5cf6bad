use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Dependency modules whose internal logging drowns out the platform's own
/// output at normal verbosity.
const NOISY_DEPENDENCIES: &[&str] = &["sqlx", "sea_orm", "tower", "tracing", "hyper", "axum"];

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger at the configured level.
    pub fn init_logger(config: &Config) {
        simplelog::TermLogger::init(
            config.log_level_filter,
            Self::log_config(config.log_level_filter),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    /// Trace shows everything, including dependency internals; every other
    /// level suppresses the noisy dependency modules.
    fn log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if level != LevelFilter::Trace {
            for module in NOISY_DEPENDENCIES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
