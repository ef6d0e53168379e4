// ABOUTME: Drives one snapshot through pull, restart, health check, and commit.
// ABOUTME: Any failure re-activates the previous snapshot and redeploys it.

use chrono::Utc;

use crate::compose::ComposeOps;
use crate::config::ServiceConfig;
use crate::health::HealthProbe;
use crate::store::{EnvStore, EnvironmentSnapshot, Revision, StoreError};

use super::attempt::{DeployOutcome, DeploymentAttempt, ServiceHealth};
use super::deployment::Deployment;
use super::error::DeployError;
use super::state::{Initialized, Restarted};

/// Deploy a staged snapshot and commit it if every health check passes.
///
/// The env file is only rewritten by the commit; until then compose receives
/// the staged images as environment overrides.
pub async fn deploy(
    staged: &EnvironmentSnapshot,
    store: &EnvStore,
    compose: &dyn ComposeOps,
    probe: &dyn HealthProbe,
    services: &[ServiceConfig],
) -> DeploymentAttempt {
    let mut attempt = new_attempt(staged.revision, staged.base.unwrap_or(staged.revision));

    let previous = match store.active() {
        Ok(previous) => previous,
        Err(e) => {
            attempt.error = Some(format!("failed to read active snapshot: {e}"));
            attempt.finished_at = Utc::now();
            return attempt;
        }
    };
    attempt.previous = previous.revision;

    tracing::info!(
        target = %staged.revision,
        previous = %previous.revision,
        "deploying snapshot"
    );
    let deployment = Deployment::new(services.to_vec(), previous, staged.clone());
    run(deployment, attempt, store, compose, probe).await
}

/// Redeploy a previously committed snapshot and re-activate it once healthy.
pub async fn restore(
    to: Revision,
    store: &EnvStore,
    compose: &dyn ComposeOps,
    probe: &dyn HealthProbe,
    services: &[ServiceConfig],
) -> Result<DeploymentAttempt, StoreError> {
    let target = store.get(to)?;
    let previous = store.active()?;
    let attempt = new_attempt(to, previous.revision);

    tracing::info!(target = %to, previous = %previous.revision, "restoring snapshot");
    let deployment = Deployment::restore(services.to_vec(), previous, target);
    Ok(run(deployment, attempt, store, compose, probe).await)
}

fn new_attempt(target: Revision, previous: Revision) -> DeploymentAttempt {
    let started_at = Utc::now();
    DeploymentAttempt {
        target,
        previous,
        started_at,
        finished_at: started_at,
        outcome: DeployOutcome::Failed,
        restarted: Vec::new(),
        health: Vec::new(),
        error: None,
        rollback_error: None,
    }
}

async fn run(
    deployment: Deployment<Initialized>,
    mut attempt: DeploymentAttempt,
    store: &EnvStore,
    compose: &dyn ComposeOps,
    probe: &dyn HealthProbe,
) -> DeploymentAttempt {
    let pulled = match deployment.pull(compose).await {
        Ok(d) => d,
        Err((d, e)) => {
            // Nothing restarted; only the store needs restoring
            let revision = d.previous().revision;
            return finish_rollback(attempt, e, restore_store(store, revision), Vec::new());
        }
    };

    let restarted = match pulled.restart(compose).await {
        Ok(d) => d,
        Err((d, e)) => return rollback(attempt, store, compose, d, e).await,
    };
    attempt.restarted = restarted.restarted().to_vec();

    let checked = match restarted.health_check(compose, probe).await {
        Ok(d) => d,
        Err((d, e)) => return rollback(attempt, store, compose, d, e).await,
    };

    match checked.activate(store) {
        Ok((restarted, health)) => {
            tracing::info!(revision = %attempt.target, "deployment succeeded");
            attempt.restarted = restarted;
            attempt.health = health;
            attempt.outcome = DeployOutcome::Succeeded;
            attempt.finished_at = Utc::now();
            attempt
        }
        Err((d, e)) => rollback(attempt, store, compose, d, e).await,
    }
}

async fn rollback(
    mut attempt: DeploymentAttempt,
    store: &EnvStore,
    compose: &dyn ComposeOps,
    deployment: Deployment<Restarted>,
    error: DeployError,
) -> DeploymentAttempt {
    tracing::warn!(error = %error, "deployment failed, rolling back");
    attempt.restarted = deployment.restarted().to_vec();
    let health: Vec<ServiceHealth> = deployment.health().to_vec();

    let revision = deployment.previous().revision;
    let store_result = restore_store(store, revision);
    let redeploy = deployment.rollback(compose).await.map(|_| ());

    let combined = match (store_result, redeploy) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(a), Err(b)) => Err(DeployError::RollbackFailed(format!("{a}; {b}"))),
    };
    finish_rollback(attempt, error, combined, health)
}

fn restore_store(store: &EnvStore, revision: Revision) -> Result<(), DeployError> {
    store
        .rollback(revision)
        .map(|_| ())
        .map_err(|e| DeployError::RollbackFailed(format!("store: {e}")))
}

fn finish_rollback(
    mut attempt: DeploymentAttempt,
    error: DeployError,
    rollback: Result<(), DeployError>,
    health: Vec<ServiceHealth>,
) -> DeploymentAttempt {
    attempt.error = Some(error.to_string());
    attempt.health = health;
    match rollback {
        Ok(()) => {
            tracing::info!(revision = %attempt.previous, "previous snapshot restored");
            attempt.outcome = DeployOutcome::RolledBack;
        }
        Err(e) => {
            tracing::error!(error = %e, "rollback failed");
            attempt.rollback_error = Some(e.to_string());
            attempt.outcome = DeployOutcome::Failed;
        }
    }
    attempt.finished_at = Utc::now();
    attempt
}
