// ABOUTME: Hooks system for release lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::store::Revision;
use crate::types::{BatchId, ImageRef, ServiceName};

/// Hook execution points in the release lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After staging, before deployment starts. Failure aborts the batch.
    PreDeploy,
    /// After a successful commit. Failure logs warning.
    PostDeploy,
    /// On deployment failure. Failure logs warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort the batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub batch: BatchId,
    pub revision: Revision,
    pub previous_revision: Option<Revision>,
    /// Images being released, by service.
    pub images: BTreeMap<ServiceName, ImageRef>,
    pub error: Option<String>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("SKIPPER_BATCH".to_string(), self.batch.to_string());
        env.insert("SKIPPER_REVISION".to_string(), self.revision.to_string());
        env.insert(
            "SKIPPER_SERVICES".to_string(),
            self.images
                .keys()
                .map(ServiceName::as_str)
                .collect::<Vec<_>>()
                .join(","),
        );
        env.insert(
            "SKIPPER_IMAGES".to_string(),
            self.images
                .iter()
                .map(|(service, image)| format!("{}={}", service, image))
                .collect::<Vec<_>>()
                .join(" "),
        );
        if let Some(prev) = self.previous_revision {
            env.insert("SKIPPER_PREVIOUS_REVISION".to_string(), prev.to_string());
        }
        if let Some(ref error) = self.error {
            env.insert("SKIPPER_ERROR".to_string(), error.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookResult {
    /// One-line failure summary for reports.
    pub fn describe_failure(&self) -> String {
        let stderr = self.stderr.trim();
        match (self.exit_code, stderr.is_empty()) {
            (Some(code), true) => format!("exit code {}", code),
            (Some(code), false) => format!("exit code {}: {}", code, stderr),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => stderr.to_string(),
        }
    }
}

/// Discovers and runs hooks from a hooks directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a hook runner looking for hooks in `<state_dir>/hooks`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            hooks_dir: state_dir.join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    /// Get the path to a hook script.
    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let env_vars = context.to_env();

        let output = Command::new(&hook_path)
            .envs(&env_vars)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HookContext {
        let mut images = BTreeMap::new();
        images.insert(
            ServiceName::new("langgraph").unwrap(),
            ImageRef::parse("ghcr.io/org/langgraph:v1.0.1").unwrap(),
        );
        images.insert(
            ServiceName::new("mcpserver").unwrap(),
            ImageRef::parse("ghcr.io/org/mcpserver:v0.5.0").unwrap(),
        );
        HookContext {
            batch: BatchId::new("b1"),
            revision: Revision::new(4),
            previous_revision: Some(Revision::new(3)),
            images,
            error: None,
        }
    }

    #[test]
    fn hook_point_filenames() {
        assert_eq!(HookPoint::PreDeploy.filename(), "pre-deploy");
        assert_eq!(HookPoint::PostDeploy.filename(), "post-deploy");
        assert_eq!(HookPoint::OnError.filename(), "on-error");
    }

    #[test]
    fn pre_deploy_is_fatal() {
        assert!(HookPoint::PreDeploy.is_fatal());
        assert!(!HookPoint::PostDeploy.is_fatal());
        assert!(!HookPoint::OnError.is_fatal());
    }

    #[test]
    fn hook_context_to_env() {
        let env = context().to_env();
        assert_eq!(env.get("SKIPPER_BATCH"), Some(&"b1".to_string()));
        assert_eq!(env.get("SKIPPER_REVISION"), Some(&"4".to_string()));
        assert_eq!(
            env.get("SKIPPER_PREVIOUS_REVISION"),
            Some(&"3".to_string())
        );
        assert_eq!(
            env.get("SKIPPER_SERVICES"),
            Some(&"langgraph,mcpserver".to_string())
        );
        assert_eq!(
            env.get("SKIPPER_IMAGES"),
            Some(
                &"langgraph=ghcr.io/org/langgraph:v1.0.1 mcpserver=ghcr.io/org/mcpserver:v0.5.0"
                    .to_string()
            )
        );
        assert!(!env.contains_key("SKIPPER_ERROR"));
    }

    #[test]
    fn hook_context_carries_error() {
        let mut ctx = context();
        ctx.error = Some("langgraph unhealthy".to_string());
        ctx.previous_revision = None;
        let env = ctx.to_env();
        assert_eq!(
            env.get("SKIPPER_ERROR"),
            Some(&"langgraph unhealthy".to_string())
        );
        assert!(!env.contains_key("SKIPPER_PREVIOUS_REVISION"));
    }

    #[test]
    fn hook_runner_checks_hooks_dir() {
        let runner = HookRunner::new(Path::new("/nonexistent"));
        assert!(!runner.hook_exists(HookPoint::PreDeploy));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_hook_reports_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let hooks = dir.path().join("hooks");
        std::fs::create_dir_all(&hooks).unwrap();
        let script = hooks.join("pre-deploy");
        std::fs::write(&script, "#!/bin/sh\necho \"refusing $SKIPPER_BATCH\" >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = HookRunner::new(dir.path());
        let result = runner.run(HookPoint::PreDeploy, &context()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.describe_failure(), "exit code 3: refusing b1");
    }
}
