use clap::Parser;
use emulated_roku::cli::Args;
use emulated_roku::config::{self, RokuConfig};
use emulated_roku::EmulatedRoku;
use std::process::ExitCode;
use std::time::Instant;

fn load(args: &Args) -> Result<RokuConfig, config::ConfigError> {
    let mut config = match config::find_config_file(args.config.as_deref()) {
        Some(path) => {
            let config = RokuConfig::load(&path)?;
            tracing::debug!("Loaded config from {}", path.display());
            config
        }
        None => RokuConfig::default(),
    };
    config.apply_args(args);
    config.validate()?;
    Ok(config)
}

fn run(config: &RokuConfig) -> Result<(), emulated_roku::Error> {
    let mut roku = EmulatedRoku::new(config);
    for binding in config.on_key_press.iter().cloned() {
        roku.on_key_press(move |event_type, key| {
            if binding.matches(event_type, key) {
                tracing::info!(event_type, key, "{}", binding.message);
            }
        })?;
    }
    roku.setup(Instant::now())?;

    let interval = config.loop_interval();
    loop {
        roku.wait(interval)?;
        roku.tick(Instant::now())?;
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
