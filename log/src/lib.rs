use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Discard, Logger};

pub fn initialize_logger() -> slog::Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);

    #[cfg(feature = "env_logging")]
    let drain = slog_envlogger::new(drain).fuse();

    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// A logger that throws everything away, for tests and one-shot tools.
pub fn discard_logger() -> slog::Logger {
    Logger::root(Discard, o!())
}
