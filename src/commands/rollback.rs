// ABOUTME: Rollback command implementation.
// ABOUTME: Redeploys a committed snapshot under the deploy lock and re-activates it.

use skipper::config::Config;
use skipper::deploy::{DeployLock, DeployOutcome, restore};
use skipper::diagnostics::{Diagnostics, Warning};
use skipper::error::{Error, Result};
use skipper::output::Output;
use skipper::release::BatchFailureKind;
use skipper::store::{EnvStore, Revision};
use skipper::types::{BatchId, ServiceName};

use super::backends::connect_backends;
use super::report::print_attempt;

pub async fn rollback(config: Config, revision: &str, force: bool, mut output: Output) -> Result<i32> {
    let revision: Revision = revision
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("invalid revision: {revision}")))?;

    output.start_timer();
    let store = EnvStore::open(&config)?;
    // Fail on unknown revisions before touching the runtime
    store.get(revision)?;

    let backends = connect_backends(&config, &output)?;
    let mut diag = Diagnostics::default();

    output.progress("  → Acquiring deploy lock...");
    let operation = BatchId::generate();
    let lock = DeployLock::acquire(&config.state_dir_path(), &operation, force)?;

    output.progress(&format!("  → Restoring revision {}...", revision));
    let services: Vec<_> = config.services.iter().cloned().collect();
    let attempt = restore(
        revision,
        &store,
        backends.compose.as_ref(),
        backends.probe.as_ref(),
        &services,
    )
    .await;

    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(e.to_string()));
    }
    let attempt = attempt?;

    print_attempt(&attempt, &output);
    output.record("attempt", &attempt);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    match attempt.outcome {
        DeployOutcome::Succeeded => {
            let restarted: Vec<&str> = attempt.restarted.iter().map(ServiceName::as_str).collect();
            if restarted.is_empty() {
                output.success(&format!("Revision {} is active", revision));
            } else {
                output.success(&format!(
                    "Revision {} is active ({} redeployed)",
                    revision,
                    restarted.join(", ")
                ));
            }
            Ok(0)
        }
        DeployOutcome::RolledBack => {
            output.error(&format!(
                "Restoring revision {} failed, revision {} kept: {}",
                revision,
                attempt.previous,
                attempt.error.as_deref().unwrap_or("unknown error")
            ));
            Ok(BatchFailureKind::RolledBack.exit_code())
        }
        DeployOutcome::Failed => {
            output.error(&format!(
                "Restoring revision {} failed and the stack could not be recovered: {}",
                revision,
                attempt
                    .rollback_error
                    .as_deref()
                    .or(attempt.error.as_deref())
                    .unwrap_or("unknown error")
            ));
            Ok(BatchFailureKind::RollbackFailed.exit_code())
        }
    }
}
