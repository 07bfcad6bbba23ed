pub mod config;
pub mod day;
pub mod watch;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use pomoday_core::{
    AcceleratedClock, AcceleratedConfig, Clock, Config, DayEngine, EngineOptions, Namespace,
    RealClock, SqliteDayStore,
};
use tracing::{info, warn};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const CLOCK_ANCHOR_KEY: &str = "accelerated_clock";

/// Open the store and start the engine for the selected namespace.
pub fn open_engine(test_mode: bool) -> CliResult<(Arc<DayEngine>, Config)> {
    let config = Config::load()?;
    let store = Arc::new(SqliteDayStore::open()?);
    let (namespace, clock): (Namespace, Arc<dyn Clock>) = if test_mode {
        (Namespace::Test, Arc::new(test_clock(&store, &config)?))
    } else {
        (Namespace::Live, Arc::new(RealClock))
    };
    let engine = DayEngine::start(clock, store, EngineOptions::from_config(namespace, &config))?;
    Ok((Arc::new(engine), config))
}

/// The accelerated clock shared by every test-mode invocation.
///
/// The first run anchors simulated time at today's day start; later runs
/// reuse the stored anchor so the simulated day keeps moving between
/// commands.
fn test_clock(store: &SqliteDayStore, config: &Config) -> CliResult<AcceleratedClock> {
    if let Some(json) = store.kv_get(Namespace::Test, CLOCK_ANCHOR_KEY)? {
        match serde_json::from_str::<AcceleratedConfig>(&json) {
            Ok(saved) => return Ok(AcceleratedClock::new(saved)),
            Err(e) => warn!(error = %e, "discarding unreadable test clock anchor"),
        }
    }

    let rules = &config.schedule;
    let (epoch, _) = rules.day_bounds(rules.logical_date(Utc::now()));
    let clock = AcceleratedClock::starting_now(config.test_mode.scale_factor, epoch);
    store.kv_set(
        Namespace::Test,
        CLOCK_ANCHOR_KEY,
        &serde_json::to_string(&clock.config())?,
    )?;
    info!(%epoch, scale = config.test_mode.scale_factor, "anchored accelerated clock");
    Ok(clock)
}

pub fn hhmm(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%H:%M").to_string()
}
