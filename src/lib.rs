mod application;
mod domain;
mod infrastructure;
mod interfaces;

pub use crate::domain::error::{AppError, Result};
pub use crate::infrastructure::config::AppConfig;

use tracing_subscriber::EnvFilter;

/// Start the pagewise backend and block until the HTTP server stops.
pub fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = AppConfig::load()?;
    actix_web::rt::System::new().block_on(infrastructure::bootstrap::serve(config))
}
