// ABOUTME: Release controller: runs a batch through tag, verify, stage, and deploy.
// ABOUTME: Journals every transition and reports the active snapshot at the end.

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::batch::{BatchFailure, BatchFailureKind, BatchReport, BatchRequest, BatchState};
use super::cancel::CancelToken;
use super::journal::BatchJournal;
use super::model::{Release, ReleaseStatus};
use crate::compose::ComposeOps;
use crate::config::{Config, ServiceConfig};
use crate::deploy::{DeployError, DeployLock, DeployOutcome, deploy};
use crate::diagnostics::{Diagnostics, Warning};
use crate::health::HealthProbe;
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::registry::{ArtifactVerifier, PollPolicy, Registry};
use crate::store::{EnvStore, EnvironmentSnapshot};
use crate::tag::{TagError, TagManager};
use crate::types::{ImageRef, ServiceName, VersionLabel};
use crate::vcs::SourceControl;

/// External systems a batch talks to.
#[derive(Clone)]
pub struct Backends {
    pub vcs: Arc<dyn SourceControl>,
    pub registry: Arc<dyn Registry>,
    pub compose: Arc<dyn ComposeOps>,
    pub probe: Arc<dyn HealthProbe>,
}

/// Outcome of a step that may end the batch early.
type Step<T> = Result<T, BatchFailure>;

fn failure(kind: BatchFailureKind, message: impl Into<String>) -> BatchFailure {
    BatchFailure {
        kind,
        message: message.into(),
    }
}

pub struct ReleaseController {
    config: Config,
    backends: Backends,
    store: Arc<EnvStore>,
    hooks: HookRunner,
    journal: BatchJournal,
}

impl ReleaseController {
    pub fn new(config: Config, store: Arc<EnvStore>, backends: Backends) -> Self {
        let state_dir = config.state_dir_path();
        Self {
            hooks: HookRunner::new(&state_dir),
            journal: BatchJournal::new(&state_dir),
            config,
            backends,
            store,
        }
    }

    pub fn journal(&self) -> &BatchJournal {
        &self.journal
    }

    /// Run one batch to a terminal state. Never panics on backend failures;
    /// every failure is reported through the returned report.
    pub async fn run(
        &self,
        request: BatchRequest,
        cancel: &CancelToken,
        diagnostics: &mut Diagnostics,
    ) -> BatchReport {
        let releases = request
            .items
            .iter()
            .map(|item| Release::pending(item.service.clone(), item.version.clone()))
            .collect();
        let mut report = BatchReport::new(request.id.clone(), releases);
        tracing::info!(batch = %report.id, releases = request.items.len(), "batch requested");
        self.journal_save(&mut report, diagnostics);

        let result = self.drive(&request, &mut report, cancel, diagnostics).await;
        if let Err(failure) = result {
            let state = match failure.kind {
                BatchFailureKind::Cancelled => BatchState::Cancelled,
                BatchFailureKind::RolledBack => BatchState::RolledBack,
                _ => BatchState::Failed,
            };
            let release_status = match failure.kind {
                BatchFailureKind::RolledBack => ReleaseStatus::RolledBack,
                _ => ReleaseStatus::Failed,
            };
            for release in &mut report.releases {
                release.finish(release_status);
            }
            tracing::warn!(batch = %report.id, state = %state, reason = %failure.message, "batch did not commit");
            report.failure = Some(failure);
            report.state = state;
        }

        report.active = self.store.active().ok();
        report.warnings = diagnostics.warnings().to_vec();
        self.journal_save(&mut report, diagnostics);
        report
    }

    async fn drive(
        &self,
        request: &BatchRequest,
        report: &mut BatchReport,
        cancel: &CancelToken,
        diagnostics: &mut Diagnostics,
    ) -> Step<()> {
        let services = self.validate(request)?;
        check_cancel(cancel)?;

        self.advance(report, BatchState::Tagging, diagnostics);
        self.tag_all(request, &services, &mut report.releases, cancel)
            .await?;

        let active = self
            .store
            .active()
            .map_err(|e| failure(BatchFailureKind::ConfigIo, e.to_string()))?;
        if is_noop(&report.releases, &services, &active) {
            tracing::info!(batch = %report.id, "releases already deployed; nothing to do");
            for release in &mut report.releases {
                if let Some(image) = active.image(&release.service) {
                    release.mark_verified(image.clone());
                }
                release.finish(ReleaseStatus::Deployed);
            }
            self.advance(report, BatchState::Committed, diagnostics);
            return Ok(());
        }

        check_cancel(cancel)?;
        self.advance(report, BatchState::Verifying, diagnostics);
        for release in &mut report.releases {
            release.mark_verifying();
        }
        let images = self
            .verify_all(request, &report.releases, &services, cancel)
            .await?;
        for (release, image) in report.releases.iter_mut().zip(images) {
            release.mark_verified(image);
        }

        check_cancel(cancel)?;
        let lock = self.acquire_lock(request, cancel).await?;

        let outcome = self
            .stage_and_deploy(report, cancel, diagnostics)
            .await;

        if let Err(e) = lock.release() {
            diagnostics.warn(Warning::lock_release(e.to_string()));
        }
        outcome
    }

    /// Everything after the lock is held.
    async fn stage_and_deploy(
        &self,
        report: &mut BatchReport,
        cancel: &CancelToken,
        diagnostics: &mut Diagnostics,
    ) -> Step<()> {
        let active = self
            .store
            .active()
            .map_err(|e| failure(BatchFailureKind::ConfigIo, e.to_string()))?;
        let changes: BTreeMap<ServiceName, ImageRef> = report
            .releases
            .iter()
            .filter_map(|r| r.image.clone().map(|image| (r.service.clone(), image)))
            .collect();
        let staged = self
            .store
            .stage(active.revision, &changes)
            .map_err(|e| failure(BatchFailureKind::ConfigIo, e.to_string()))?;
        report.staged = Some(staged.revision);
        self.advance(report, BatchState::Staged, diagnostics);

        check_cancel(cancel)?;

        let mut context = HookContext {
            batch: report.id.clone(),
            revision: staged.revision,
            previous_revision: Some(active.revision),
            images: changes,
            error: None,
        };
        self.run_hook(HookPoint::PreDeploy, &context, diagnostics).await?;

        // Cancellation is no longer honored from here on
        self.advance(report, BatchState::Deploying, diagnostics);
        let services: Vec<ServiceConfig> = self.config.services.iter().cloned().collect();
        let attempt = deploy(
            &staged,
            &self.store,
            self.backends.compose.as_ref(),
            self.backends.probe.as_ref(),
            &services,
        )
        .await;

        let outcome = attempt.outcome;
        let message = attempt.error.clone();
        let rollback_error = attempt.rollback_error.clone();
        report.attempt = Some(attempt);

        match outcome {
            DeployOutcome::Succeeded => {
                for release in &mut report.releases {
                    release.finish(ReleaseStatus::Deployed);
                }
                self.advance(report, BatchState::Committed, diagnostics);
                self.run_hook(HookPoint::PostDeploy, &context, diagnostics).await
            }
            DeployOutcome::RolledBack => {
                let message = message.unwrap_or_else(|| "deployment failed".to_string());
                context.error = Some(message.clone());
                self.run_hook(HookPoint::OnError, &context, diagnostics).await?;
                Err(failure(BatchFailureKind::RolledBack, message))
            }
            DeployOutcome::Failed => {
                let message = match (message, rollback_error) {
                    (Some(e), Some(r)) => format!("{e}; {r}"),
                    (Some(e), None) => e,
                    (None, Some(r)) => r,
                    (None, None) => "deployment failed".to_string(),
                };
                context.error = Some(message.clone());
                self.run_hook(HookPoint::OnError, &context, diagnostics).await?;
                Err(failure(BatchFailureKind::RollbackFailed, message))
            }
        }
    }

    /// Resolve every requested service, rejecting unknown and duplicate names.
    fn validate(&self, request: &BatchRequest) -> Step<Vec<ServiceConfig>> {
        if request.items.is_empty() {
            return Err(failure(BatchFailureKind::Invalid, "batch has no releases"));
        }

        let mut seen = BTreeSet::new();
        let mut services = Vec::with_capacity(request.items.len());
        for item in &request.items {
            if !seen.insert(&item.service) {
                return Err(failure(
                    BatchFailureKind::Invalid,
                    format!("service {} appears more than once", item.service),
                ));
            }
            let service = self.config.service(&item.service).ok_or_else(|| {
                failure(
                    BatchFailureKind::Invalid,
                    format!("unknown service {}", item.service),
                )
            })?;
            services.push(service.clone());
        }
        Ok(services)
    }

    async fn tag_all(
        &self,
        request: &BatchRequest,
        services: &[ServiceConfig],
        releases: &mut [Release],
        cancel: &CancelToken,
    ) -> Step<()> {
        let tagger = TagManager::new(self.backends.vcs.as_ref(), &self.config);
        let auto_bump = request.auto_bump || self.config.release.auto_bump;

        let tagging = join_all(
            request
                .items
                .iter()
                .zip(services)
                .map(|(item, service)| tag_one(&tagger, service, &item.version, auto_bump)),
        );

        let results = tokio::select! {
            results = tagging => results,
            _ = cancel.cancelled() => return Err(cancelled()),
        };

        // Tags that were pushed stay recorded even when another service fails.
        let mut conflicts = Vec::new();
        let mut errors = Vec::new();
        for (slot, result) in releases.iter_mut().zip(results) {
            match result {
                Ok(release) => *slot = release,
                Err(TagError::Conflict(conflict)) => conflicts.push(conflict.to_string()),
                Err(e) => errors.push(e.to_string()),
            }
        }

        if !conflicts.is_empty() {
            return Err(failure(BatchFailureKind::TagConflict, conflicts.join("; ")));
        }
        if !errors.is_empty() {
            return Err(failure(BatchFailureKind::Git, errors.join("; ")));
        }
        Ok(())
    }

    async fn verify_all(
        &self,
        request: &BatchRequest,
        releases: &[Release],
        services: &[ServiceConfig],
        cancel: &CancelToken,
    ) -> Step<Vec<ImageRef>> {
        let verifier = ArtifactVerifier::new(self.backends.registry.as_ref());
        let timeout = request.verify_timeout.unwrap_or(self.config.verify.timeout);
        let policy = PollPolicy::from(&self.config.verify);

        let verifying = try_join_all(releases.iter().zip(services).map(|(release, service)| {
            let image = service.image.with_tag(&release.tag_name());
            let verifier = &verifier;
            async move { verifier.await_artifact(&image, timeout, policy).await }
        }));

        tokio::select! {
            result = verifying => result.map_err(|e| failure(BatchFailureKind::ArtifactTimeout, e.to_string())),
            _ = cancel.cancelled() => Err(cancelled()),
        }
    }

    async fn acquire_lock(
        &self,
        request: &BatchRequest,
        cancel: &CancelToken,
    ) -> Step<DeployLock> {
        let state_dir = self.config.state_dir_path();
        let acquire = DeployLock::acquire_with_wait(
            &state_dir,
            &request.id,
            request.force_lock,
            self.config.release.lock_wait,
        );

        let result = tokio::select! {
            result = acquire => result,
            _ = cancel.cancelled() => return Err(cancelled()),
        };

        result.map_err(|e| match e {
            DeployError::LockHeld { .. } => failure(BatchFailureKind::LockHeld, e.to_string()),
            other => failure(BatchFailureKind::ConfigIo, other.to_string()),
        })
    }

    /// Run a hook if present. Only a failing fatal hook ends the batch; other
    /// failures become warnings.
    async fn run_hook(
        &self,
        point: HookPoint,
        context: &HookContext,
        diagnostics: &mut Diagnostics,
    ) -> Step<()> {
        let Some(result) = self.hooks.run(point, context).await else {
            return Ok(());
        };
        if result.success {
            return Ok(());
        }

        let message = format!(
            "{} hook failed: {}",
            point.filename(),
            result.describe_failure()
        );
        if point.is_fatal() {
            return Err(failure(BatchFailureKind::Hook, message));
        }
        diagnostics.warn(Warning::hook(message));
        Ok(())
    }

    fn advance(&self, report: &mut BatchReport, state: BatchState, diagnostics: &mut Diagnostics) {
        tracing::info!(batch = %report.id, from = %report.state, to = %state, "batch transition");
        report.state = state;
        self.journal_save(report, diagnostics);
    }

    fn journal_save(&self, report: &mut BatchReport, diagnostics: &mut Diagnostics) {
        report.updated_at = Utc::now();
        if let Err(e) = self.journal.save(report) {
            diagnostics.warn(Warning::journal(e.to_string()));
        }
    }
}

/// Tag one service, retrying a conflict once with the next free version when
/// auto-bump is on.
async fn tag_one(
    tagger: &TagManager<'_>,
    service: &ServiceConfig,
    version: &VersionLabel,
    auto_bump: bool,
) -> Result<Release, TagError> {
    match tagger.create_tag(service, version).await {
        Err(TagError::Conflict(conflict)) if auto_bump => {
            let next = tagger.suggest_next_version(service).await?;
            tracing::info!(
                service = %service.name,
                conflicting = %conflict.tag,
                bumped = %next.tag_name(),
                "tag taken, bumping version"
            );
            let mut release = tagger.create_tag(service, &next).await?;
            release.requested = version.clone();
            Ok(release)
        }
        other => other,
    }
}

/// True when every release re-tags an existing commit and the active snapshot
/// already runs exactly those tags.
fn is_noop(releases: &[Release], services: &[ServiceConfig], active: &EnvironmentSnapshot) -> bool {
    releases.iter().zip(services).all(|(release, service)| {
        release.tag_existed
            && active.image(&release.service).is_some_and(|image| {
                image.repository() == service.image.repository()
                    && image.tag() == Some(release.tag_name().as_str())
            })
    })
}

fn check_cancel(cancel: &CancelToken) -> Step<()> {
    if cancel.is_cancelled() {
        Err(cancelled())
    } else {
        Ok(())
    }
}

fn cancelled() -> BatchFailure {
    failure(BatchFailureKind::Cancelled, "cancelled before deployment")
}
