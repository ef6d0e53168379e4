// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, defaults, path resolution, discovery, and init.

use skipper::config::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MINIMAL: &str = r#"
services:
  - name: langgraph
    image: ghcr.io/acme/langgraph
    repo:
      path: ../langgraph
"#;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.services.len(), 1);

        let service = &config.services.head;
        assert_eq!(service.name.as_str(), "langgraph");
        assert_eq!(service.image.repository(), "ghcr.io/acme/langgraph");
        assert_eq!(service.repo.remote, "origin");
        assert_eq!(service.repo.git_ref, "HEAD");
        assert_eq!(service.env_key(), "LANGGRAPH_IMAGE");
        assert_eq!(service.compose_service(), "langgraph");
        assert!(service.healthcheck.is_none());
    }

    #[test]
    fn defaults_are_applied() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.env_file, PathBuf::from(".env"));
        assert_eq!(config.state_dir, PathBuf::from(".skipper"));
        assert_eq!(config.compose.file, PathBuf::from("docker-compose.yml"));
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.verify.timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.verify.initial_delay, Duration::from_secs(5));
        assert_eq!(config.verify.max_interval, Duration::from_secs(60));
        assert!(!config.release.auto_bump);
        assert_eq!(config.release.lock_wait, Duration::from_secs(600));
        assert!(config.registry.is_none());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
env_file: deploy/.env
state_dir: /var/lib/skipper
history_limit: 10

compose:
  file: deploy/docker-compose.yml
  project: stack
  runtime: podman

verify:
  timeout: 45m
  initial_delay: 2s
  max_interval: 30s

release:
  auto_bump: true
  lock_wait: 90s

registry:
  username: ci-bot
  token_env: GHCR_TOKEN
  server: ghcr.io

services:
  - name: langgraph
    image: ghcr.io/acme/langgraph
    repo:
      path: ../langgraph
      remote: upstream
      ref: main
    env_key: LG_IMAGE
    compose_service: langgraph-api
    healthcheck:
      url: http://localhost:8123/ok
      attempts: 5
      interval: 2s
      timeout: 1s
      start_period: 10s
  - name: mcpserver
    image: ghcr.io/acme/mcpserver
    repo:
      path: ../mcpserver
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.compose.project.as_deref(), Some("stack"));
        assert_eq!(config.verify.timeout, Duration::from_secs(45 * 60));
        assert!(config.release.auto_bump);
        assert_eq!(config.release.lock_wait, Duration::from_secs(90));

        let registry = config.registry.as_ref().unwrap();
        assert_eq!(registry.username, "ci-bot");
        assert_eq!(registry.token_env, "GHCR_TOKEN");

        let lg = &config.services.head;
        assert_eq!(lg.repo.remote, "upstream");
        assert_eq!(lg.repo.git_ref, "main");
        assert_eq!(lg.env_key(), "LG_IMAGE");
        assert_eq!(lg.compose_service(), "langgraph-api");
        let hc = lg.healthcheck.as_ref().unwrap();
        assert_eq!(hc.url, "http://localhost:8123/ok");
        assert_eq!(hc.attempts, 5);
        assert_eq!(hc.start_period, Duration::from_secs(10));
    }

    #[test]
    fn healthcheck_defaults() {
        let yaml = r#"
services:
  - name: mcpserver
    image: ghcr.io/acme/mcpserver
    repo:
      path: ../mcpserver
    healthcheck:
      url: http://localhost:8000/health
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let hc = config.services.head.healthcheck.as_ref().unwrap();
        assert_eq!(hc.attempts, 10);
        assert_eq!(hc.interval, Duration::from_secs(3));
        assert_eq!(hc.timeout, Duration::from_secs(5));
    }
}

mod validation {
    use super::*;

    #[test]
    fn empty_service_list_is_rejected() {
        let err = Config::from_yaml("services: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one service"));
    }

    #[test]
    fn duplicate_service_is_rejected() {
        let yaml = r#"
services:
  - name: langgraph
    image: ghcr.io/acme/langgraph
    repo: { path: a }
  - name: langgraph
    image: ghcr.io/acme/other
    repo: { path: b }
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate service"));
    }

    #[test]
    fn shared_env_key_is_rejected() {
        let yaml = r#"
services:
  - name: langgraph
    image: ghcr.io/acme/langgraph
    repo: { path: a }
  - name: mcpserver
    image: ghcr.io/acme/mcpserver
    repo: { path: b }
    env_key: LANGGRAPH_IMAGE
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate env key"));
    }

    #[test]
    fn tagged_image_prefix_is_rejected() {
        let yaml = r#"
services:
  - name: langgraph
    image: ghcr.io/acme/langgraph:latest
    repo: { path: a }
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("without tag"));
    }

    #[test]
    fn invalid_service_name_is_rejected() {
        let yaml = r#"
services:
  - name: LangGraph
    image: ghcr.io/acme/langgraph
    repo: { path: a }
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_service_lookup_fails() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert!(config.service_named("langgraph").is_ok());
        assert!(config.service_named("postgres").is_err());
    }
}

mod paths {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();

        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.env_file_path(), dir.path().join(".env"));
        assert_eq!(config.state_dir_path(), dir.path().join(".skipper"));
        assert_eq!(
            config.repo_path(&config.services.head),
            dir.path().join("../langgraph")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let yaml = MINIMAL.replace("services:", "state_dir: /var/lib/skipper\nservices:");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.state_dir_path(), Path::new("/var/lib/skipper"));
    }

    #[test]
    fn dot_dir_config_resolves_against_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".skipper")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.env_file_path(), dir.path().join(".env"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn discover_prefers_primary_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILENAME_ALT),
            MINIMAL.replace("langgraph", "other"),
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.services.head.name.as_str(), "langgraph");
    }

    #[test]
    fn discover_without_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        let names: Vec<&str> = config.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["langgraph", "mcpserver"]);
    }

    #[test]
    fn init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "existing").unwrap();

        assert!(init_config(dir.path(), false).is_err());
        init_config(dir.path(), true).unwrap();
        assert!(Config::discover(dir.path()).is_ok());
    }
}
