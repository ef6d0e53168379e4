// ABOUTME: Release and release-batch command implementation.
// ABOUTME: Runs a batch through the release controller with Ctrl-C cancellation.

use skipper::config::Config;
use skipper::diagnostics::Diagnostics;
use skipper::error::Result;
use skipper::output::Output;
use skipper::release::{BatchRequest, CancelToken, ReleaseController};
use skipper::store::EnvStore;
use std::sync::Arc;

use super::backends::connect_backends;
use super::report::print_report;

/// Run a batch and return the process exit code.
pub async fn release(config: Config, request: BatchRequest, mut output: Output) -> Result<i32> {
    output.start_timer();

    let summary: Vec<String> = request
        .items
        .iter()
        .map(|item| format!("{} {}", item.service, item.version.tag_name()))
        .collect();
    output.progress(&format!(
        "Releasing {} (batch {})",
        summary.join(", "),
        request.id
    ));

    let backends = connect_backends(&config, &output)?;
    let store = Arc::new(EnvStore::open(&config)?);
    let controller = ReleaseController::new(config, store, backends);

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling batch");
                cancel.cancel();
            }
        })
    };

    let mut diag = Diagnostics::default();
    let report = controller.run(request, &cancel, &mut diag).await;
    ctrl_c.abort();

    print_report(&report, &output);
    Ok(report.exit_code())
}
