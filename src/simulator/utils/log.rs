use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the global logger
///
/// Defaults to `info`, or `warn` when `quiet`; `RUST_LOG` overrides both.
/// Calling it again is a no-op, so tests may call it freely.
pub fn init_log(quiet: bool) {
  let default = if quiet { "warn" } else { "info" };
  let _ = Builder::from_env(Env::default().default_filter_or(default))
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}

/// Lower the level after a config file asked for quiet output
pub fn set_quiet() {
  if log::max_level() > LevelFilter::Warn {
    log::set_max_level(LevelFilter::Warn);
  }
}
