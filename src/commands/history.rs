// ABOUTME: History command implementation.
// ABOUTME: Lists committed snapshots, marking the active one.

use skipper::config::Config;
use skipper::error::Result;
use skipper::output::{Output, OutputMode};
use skipper::store::EnvStore;

use super::report::print_snapshot;

pub fn history(config: Config, output: Output) -> Result<i32> {
    let store = EnvStore::open(&config)?;
    let active = store.active()?.revision;
    let history = store.history()?;

    if output.mode() == OutputMode::Json {
        for snapshot in &history {
            output.record("snapshot", snapshot);
        }
        return Ok(0);
    }

    for snapshot in history.iter().rev() {
        print_snapshot(snapshot, snapshot.revision == active, &output);
    }
    Ok(0)
}
