// ABOUTME: Suggest command implementation.
// ABOUTME: Prints the next free version tag for a service.

use skipper::config::Config;
use skipper::error::Result;
use skipper::output::Output;
use skipper::tag::TagManager;
use skipper::vcs::SystemGit;

pub async fn suggest(config: Config, service: &str, output: Output) -> Result<i32> {
    let service = config.service_named(service)?;
    let git = SystemGit::new();
    let next = TagManager::new(&git, &config)
        .suggest_next_version(service)
        .await?;

    output.success(&next.tag_name());
    Ok(0)
}
