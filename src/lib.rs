pub mod chores;
pub mod config;
pub mod db;
pub mod error;
pub mod exercisers;
pub mod fixture;
pub mod suite;

pub use config::HarnessConfig;
pub use db::{Connection, ConnectionString, Cursor, Row, Session, SqlValue};
pub use error::{HarnessError, Result};

/// Install the `env_logger` backend, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
