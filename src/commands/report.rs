// ABOUTME: Human-readable rendering of batch reports, attempts, and snapshots.
// ABOUTME: JSON mode emits the same structures as records instead.

use skipper::deploy::DeploymentAttempt;
use skipper::output::{Output, OutputMode};
use skipper::release::{BatchReport, BatchState};
use skipper::store::EnvironmentSnapshot;

pub fn print_report(report: &BatchReport, output: &Output) {
    if output.mode() == OutputMode::Json {
        output.record("batch", report);
        return;
    }

    output.progress(&format!("Batch {} ({})", report.id, report.state));
    for release in &report.releases {
        let mut line = format!(
            "  {} {} -> {}",
            release.service,
            release.tag_name(),
            release.status
        );
        if release.version != release.requested {
            line.push_str(&format!(" (requested {})", release.requested.tag_name()));
        }
        if let Some(image) = &release.image {
            line.push_str(&format!("\n      {}", image));
        }
        output.progress(&line);
    }

    if let Some(attempt) = &report.attempt {
        print_attempt(attempt, output);
    }

    for warning in &report.warnings {
        output.warning(&warning.message);
    }

    match (&report.state, &report.failure) {
        (BatchState::Committed, _) => {
            let revision = report
                .active
                .as_ref()
                .map(|s| s.revision.to_string())
                .unwrap_or_else(|| "?".to_string());
            output.success(&format!(
                "Batch {} committed (revision {})",
                report.id, revision
            ));
        }
        (state, Some(failure)) => {
            output.error(&format!("Batch {} {}: {}", report.id, state, failure.message));
        }
        (state, None) => output.progress(&format!("Batch {} is {}", report.id, state)),
    }
}

pub fn print_attempt(attempt: &DeploymentAttempt, output: &Output) {
    output.progress(&format!(
        "  Deploy {} -> {}: {}",
        attempt.previous, attempt.target, attempt.outcome
    ));
    if !attempt.restarted.is_empty() {
        let restarted: Vec<&str> = attempt.restarted.iter().map(|s| s.as_str()).collect();
        output.progress(&format!("    restarted: {}", restarted.join(", ")));
    }
    for health in &attempt.health {
        let status = if health.passed { "healthy" } else { "unhealthy" };
        let mut line = format!(
            "    {} {} after {} probe(s)",
            health.service, status, health.attempts
        );
        if let Some(err) = &health.last_error {
            line.push_str(&format!(": {}", err));
        }
        output.progress(&line);
    }
    if let Some(err) = &attempt.rollback_error {
        output.progress(&format!("    rollback error: {}", err));
    }
}

pub fn print_snapshot(snapshot: &EnvironmentSnapshot, active: bool, output: &Output) {
    let marker = if active { "*" } else { " " };
    output.progress(&format!(
        "{} revision {} ({})",
        marker,
        snapshot.revision,
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for (service, image) in &snapshot.images {
        output.progress(&format!("    {} = {}", service, image));
    }
}
