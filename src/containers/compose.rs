//! `docker compose` backed container controller.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::schema::ContainersConfig;
use crate::containers::{ContainerController, ControllerError};

pub struct ComposeController {
    docker_bin: String,
    workdir: PathBuf,
    project: String,
    backend_service: String,
    gateway_container: String,
    command_timeout: Duration,
}

impl ComposeController {
    pub fn from_config(config: &ContainersConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            workdir: PathBuf::from(&config.workdir),
            project: config.project.clone(),
            backend_service: config.backend_service.clone(),
            gateway_container: config.gateway_container.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    /// Arguments for recreating the backend service.
    pub fn recreate_args(&self) -> Vec<String> {
        vec![
            "compose".into(),
            "-p".into(),
            self.project.clone(),
            "up".into(),
            "-d".into(),
            "--force-recreate".into(),
            self.backend_service.clone(),
        ]
    }

    /// Arguments for restarting the gateway container.
    pub fn restart_args(&self) -> Vec<String> {
        vec![
            "restart".into(),
            "--time".into(),
            "10".into(),
            self.gateway_container.clone(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> Result<(), ControllerError> {
        let command = format!("{} {}", self.docker_bin, args.join(" "));
        let mut child = Command::new(&self.docker_bin);
        child
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.workdir.is_dir() {
            child.current_dir(&self.workdir);
        }

        let output = match tokio::time::timeout(self.command_timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ControllerError::Spawn { command, source }),
            Err(_) => {
                return Err(ControllerError::TimedOut {
                    command,
                    secs: self.command_timeout.as_secs(),
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(%command, stdout = %stdout.trim(), stderr = %stderr, "Container command failed");
            Err(ControllerError::Failed {
                command,
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}

#[async_trait]
impl ContainerController for ComposeController {
    async fn recreate_backend(&self) -> Result<(), ControllerError> {
        tracing::info!(service = %self.backend_service, project = %self.project, "Recreating backend container");
        self.run(self.recreate_args()).await?;
        tracing::info!(service = %self.backend_service, "Backend container recreated");
        Ok(())
    }

    async fn restart_self(&self) -> Result<(), ControllerError> {
        tracing::info!(container = %self.gateway_container, "Restarting gateway container to flush DNS cache");
        self.run(self.restart_args()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(docker_bin: &str) -> ComposeController {
        let mut config = ContainersConfig::default();
        config.docker_bin = docker_bin.to_string();
        config.workdir = std::env::temp_dir().display().to_string();
        config.command_timeout_secs = 5;
        ComposeController::from_config(&config)
    }

    #[test]
    fn test_recreate_command_line() {
        let c = controller("docker");
        assert_eq!(
            c.recreate_args().join(" "),
            "compose -p talktuah up -d --force-recreate vllm"
        );
        assert_eq!(c.restart_args().join(" "), "restart --time 10 vllm-proxy-api");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command() {
        controller("true").recreate_backend().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command() {
        let err = controller("false").recreate_backend().await.unwrap_err();
        assert!(matches!(err, ControllerError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = controller("no-such-docker-binary")
            .restart_self()
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Spawn { .. }));
    }
}
