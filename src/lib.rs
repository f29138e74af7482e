pub mod catalog;
pub mod cli;
mod driver;
mod locks;
mod logging;
pub mod provisioning;

pub use driver::Driver;
pub use locks::{PoolGuard, PoolLocks};
pub use logging::{background_log::BackgroundLog, multilog::MultiLogger, LogEntry};

/// Driver version as provided by environment variables at build time
pub const FILESHARE_VERSION: &str = match option_env!("FILESHARE_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
