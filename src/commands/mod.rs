// ABOUTME: Command module aggregator for the skipper CLI.
// ABOUTME: Re-exports command handlers and shared config/backend setup.

mod backends;
mod history;
mod release;
mod report;
mod rollback;
mod status;
mod suggest;

pub use backends::connect_backends;
pub use history::history;
pub use release::release;
pub use rollback::rollback;
pub use status::status;
pub use suggest::suggest;

use skipper::config::Config;
use skipper::error::Result;
use std::path::Path;

/// Load the config from an explicit path or discover it in the working directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(&std::env::current_dir()?),
    }
}
