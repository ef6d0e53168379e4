// ABOUTME: Compose client that shells out to `docker compose` or `podman compose`.
// ABOUTME: Every call pins the compose file, project name, and env file.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{ComposeError, ComposeOps, EnvOverrides, ServiceState, parse_ps_output};
use crate::config::Config;
use crate::runtime::RuntimeType;

/// Runs compose subcommands through the container runtime's CLI.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    binary: String,
    file: PathBuf,
    project: Option<String>,
    env_file: PathBuf,
    workdir: PathBuf,
}

impl ComposeCli {
    pub fn new(config: &Config, runtime: RuntimeType) -> Self {
        Self {
            binary: runtime.binary().to_string(),
            file: config.compose_file_path(),
            project: config.compose.project.clone(),
            env_file: config.env_file_path(),
            workdir: config.base_dir.clone(),
        }
    }

    fn args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.file.display().to_string(),
        ];
        if let Some(project) = &self.project {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args.push("--env-file".to_string());
        args.push(self.env_file.display().to_string());
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    async fn run(&self, subcommand: &[&str], env: &EnvOverrides) -> Result<String, ComposeError> {
        let args = self.args(subcommand);
        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(command = %command, overrides = env.len(), "running compose");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.workdir.as_os_str().is_empty() {
            cmd.current_dir(&self.workdir);
        }

        let output = cmd.output().await.map_err(|source| ComposeError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ComposeError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ComposeOps for ComposeCli {
    async fn pull(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError> {
        let mut sub = vec!["pull"];
        sub.extend(services.iter().map(String::as_str));
        self.run(&sub, env).await.map(|_| ())
    }

    async fn up(&self, services: &[String], env: &EnvOverrides) -> Result<(), ComposeError> {
        let mut sub = vec!["up", "-d", "--no-deps", "--force-recreate"];
        sub.extend(services.iter().map(String::as_str));
        self.run(&sub, env).await.map(|_| ())
    }

    async fn ps(&self, env: &EnvOverrides) -> Result<Vec<ServiceState>, ComposeError> {
        let stdout = self.run(&["ps", "--all", "--format", "json"], env).await?;
        parse_ps_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_pin_file_project_and_env_file() {
        let compose = ComposeCli {
            binary: "docker".to_string(),
            file: PathBuf::from("/srv/stack/docker-compose.yml"),
            project: Some("prod".to_string()),
            env_file: PathBuf::from("/srv/stack/.env"),
            workdir: PathBuf::from("/srv/stack"),
        };
        assert_eq!(
            compose.args(&["pull", "langgraph"]),
            vec![
                "compose",
                "-f",
                "/srv/stack/docker-compose.yml",
                "-p",
                "prod",
                "--env-file",
                "/srv/stack/.env",
                "pull",
                "langgraph"
            ]
        );
    }
}
