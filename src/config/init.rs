// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a skipper.yml template for the langgraph + mcpserver stack.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::template());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let mut yaml = format!(
        r#"# Environment file rewritten on every commit (KEY=image reference)
env_file: {}
# Snapshot history, batch journal, and deploy lock
state_dir: {}

compose:
  file: {}

verify:
  timeout: 30m
  initial_delay: 5s
  max_interval: 60s

release:
  auto_bump: false

services:
"#,
        config.env_file.display(),
        config.state_dir.display(),
        config.compose.file.display(),
    );

    for service in config.services.iter() {
        let _ = write!(
            yaml,
            r#"  - name: {}
    image: {}
    repo:
      path: {}
    env_key: {}
"#,
            service.name,
            service.image,
            service.repo.path.display(),
            service.env_key(),
        );
        if let Some(hc) = &service.healthcheck {
            let _ = write!(
                yaml,
                r#"    healthcheck:
      url: {}
      attempts: {}
"#,
                hc.url, hc.attempts
            );
        }
    }

    yaml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_yaml_parses_back() {
        let yaml = generate_template_yaml(&Config::template());
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services.head.env_key(), "LANGGRAPH_IMAGE");
        assert_eq!(config.services.tail[0].env_key(), "MCPSERVER_IMAGE");
    }
}
