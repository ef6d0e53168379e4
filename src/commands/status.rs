// ABOUTME: Status command implementation.
// ABOUTME: Shows a journaled batch, the active snapshot, and any deploy lock holder.

use skipper::config::Config;
use skipper::deploy::LockInfo;
use skipper::error::Result;
use skipper::output::{Output, OutputMode};
use skipper::release::BatchJournal;
use skipper::store::EnvStore;

use super::report::{print_report, print_snapshot};

pub fn status(config: Config, batch: Option<String>, output: Output) -> Result<i32> {
    let state_dir = config.state_dir_path();
    let journal = BatchJournal::new(&state_dir);

    let report = match batch {
        Some(prefix) => Some(journal.find(&prefix)?),
        None => journal.latest()?,
    };

    match &report {
        Some(report) => print_report(report, &output),
        None => output.progress("No batches recorded"),
    }

    let store = EnvStore::open(&config)?;
    let active = store.active()?;
    if output.mode() == OutputMode::Json {
        output.record("active", &active);
    } else {
        output.progress("Active snapshot:");
        print_snapshot(&active, true, &output);
    }

    if let Some(lock) = LockInfo::read(&state_dir) {
        output.warning(&format!(
            "deploy lock held by {} (pid {}, batch {}) since {}",
            lock.holder, lock.pid, lock.batch, lock.started_at
        ));
    }

    Ok(0)
}
