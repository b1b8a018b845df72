//! Binary entry point: load configuration, start file logging, open the
//! catalog, and hand control to the TUI until the operator quits.
use std::fs;

use anyhow::{Context, Result};
use library_manager::config::{self, LOG_FILE_NAME};
use library_manager::logging::init_logging;
use library_manager::{open_database, run_app, App, Config, GoogleBooksClient};

fn main() -> Result<()> {
    let config = Config::load()?;
    let data_dir = config::data_dir()?;
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    init_logging(&data_dir.join(LOG_FILE_NAME), &config.log_level)?;

    let db_path = config.database_path(&data_dir);
    log::info!("opening catalog at {}", db_path.display());
    let conn = open_database(&db_path)?;
    let lookup = GoogleBooksClient::new(&config.lookup)?;

    let mut app = App::new(conn, Box::new(lookup))?;
    let result = run_app(&mut app);
    if let Err(err) = &result {
        log::error!("session aborted: {err:#}");
    }
    result
}
