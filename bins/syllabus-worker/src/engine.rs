/// Execution Engine - Sandboxed Code Execution
///
/// **Core Responsibility:**
/// Execute a submission against one test input and capture raw output.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (Docker)
/// - Engine does NOT decide verdicts
/// - Engine returns raw outputs for the checker to judge

use crate::checker::ExecutionOutput;
use crate::config::LanguageConfigManager;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::{Duration, Instant};
use syllabus_common::types::Language;
use tracing::{debug, info, warn};

/// Safety limits to keep pathological inputs away from Docker
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Anything that can run one submission against one input
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        language: &Language,
        source_code: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionOutput>;
}

/// Note appended to stderr for exit codes that mean the container was killed
pub fn exit_note(code: i64) -> Option<&'static str> {
    match code {
        137 => Some("[Container killed: likely OOM or exceeded memory limit]"),
        139 => Some("[Container killed: segmentation fault]"),
        _ => None,
    }
}

pub fn check_sizes(source_code: &str, input: &str) -> Result<()> {
    if source_code.len() > MAX_SOURCE_CODE_BYTES {
        bail!("Source code exceeds maximum size of {} bytes", MAX_SOURCE_CODE_BYTES);
    }
    if input.len() > MAX_TEST_INPUT_BYTES {
        bail!("Test input exceeds maximum size of {} bytes", MAX_TEST_INPUT_BYTES);
    }
    Ok(())
}

/// Removes the container when dropped, including on cancellation
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to clean up container");
            }
        });
    }
}

/// Docker-based sandbox
///
/// Every execution gets a fresh container with network disabled and the
/// language's memory/CPU limits applied. Source and input are passed base64
/// encoded through `SOURCE_CODE` and `TEST_INPUT`; the image's runner script
/// decodes them and feeds the input on stdin.
pub struct DockerEngine {
    docker: Docker,
    config_manager: LanguageConfigManager,
}

impl DockerEngine {
    pub fn new(config_manager: LanguageConfigManager) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?;

        Ok(Self {
            docker,
            config_manager,
        })
    }

    /// Pull the image if it is not cached locally
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.context("Failed to pull Docker image")?;
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }

    /// Collect logs until the container stops, then read its exit code
    async fn collect(&self, container_id: &str) -> (String, String, Option<i64>) {
        let mut stdout = String::new();
        let mut stderr = String::new();

        let logs_options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: true,
            ..Default::default()
        });

        let mut logs_stream = self.docker.logs(container_id, logs_options);
        while let Some(output) = logs_stream.next().await {
            match output {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Err(e) => {
                    warn!(error = %e, "Error reading container logs");
                    break;
                }
                _ => {}
            }
        }

        let wait_options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut wait_stream = self.docker.wait_container(container_id, Some(wait_options));

        // Non-zero exits surface as an error carrying the code
        let exit_code = match wait_stream.next().await {
            Some(Ok(response)) => Some(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Some(code),
            Some(Err(e)) => {
                warn!(error = %e, "Failed to get container exit code");
                None
            }
            None => None,
        };

        (stdout, stderr, exit_code)
    }
}

#[async_trait]
impl Sandbox for DockerEngine {
    async fn execute(
        &self,
        language: &Language,
        source_code: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionOutput> {
        check_sizes(source_code, input)?;

        let language_config = self.config_manager.get_config(language)?;
        let image = language_config.image.clone();
        self.ensure_image(&image)
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", image))?;

        let env = vec![
            format!("SOURCE_CODE={}", general_purpose::STANDARD.encode(source_code)),
            format!("TEST_INPUT={}", general_purpose::STANDARD.encode(input)),
            format!("LANGUAGE={}", language),
        ];

        let config = Config {
            image: Some(image),
            cmd: Some(self.config_manager.get_command(language)?),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(self.config_manager.get_memory_limit_bytes(language)?),
                nano_cpus: Some(self.config_manager.get_nano_cpus(language)?),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_name = format!("syllabus-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .context("Failed to create Docker container")?;
        let container_id = container.id;

        let _guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container_id.clone(),
        };

        let start_time = Instant::now();
        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start Docker container")?;

        let timeout = Duration::from_millis(timeout_ms);
        let output = match tokio::time::timeout(timeout, self.collect(&container_id)).await {
            Ok((stdout, mut stderr, exit_code)) => {
                let runtime_error = match exit_code {
                    Some(0) => false,
                    Some(code) => {
                        debug!(exit_code = code, "Runtime error");
                        if let Some(note) = exit_note(code) {
                            stderr.push('\n');
                            stderr.push_str(note);
                        }
                        true
                    }
                    None => bail!("Container finished without reporting an exit code"),
                };

                ExecutionOutput {
                    stdout,
                    stderr,
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                    timed_out: false,
                    runtime_error,
                }
            }
            Err(_) => {
                warn!(timeout_ms, "Execution timed out, killing container");
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(error = %e, "Failed to kill timed-out container");
                }

                ExecutionOutput {
                    stdout: String::new(),
                    stderr: "[Execution timed out]".to_string(),
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                    timed_out: true,
                    runtime_error: false,
                }
            }
        };

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_size_guards() {
        assert!(check_sizes("print(1)", "").is_ok());

        let big_source = "x".repeat(MAX_SOURCE_CODE_BYTES + 1);
        let err = check_sizes(&big_source, "").unwrap_err();
        assert!(err.to_string().contains("Source code exceeds"));

        let big_input = "x".repeat(MAX_TEST_INPUT_BYTES + 1);
        let err = check_sizes("", &big_input).unwrap_err();
        assert!(err.to_string().contains("Test input exceeds"));
    }

    #[test]
    fn test_exit_notes() {
        assert!(exit_note(137).unwrap().contains("OOM"));
        assert!(exit_note(139).unwrap().contains("segmentation fault"));
        assert_eq!(exit_note(1), None);
    }

    #[tokio::test]
    #[ignore] // needs a Docker daemon and the syllabus-python image
    async fn test_python_echo_in_docker() {
        let manager = LanguageConfigManager::load(Path::new("../../config/languages.json")).unwrap();
        let engine = DockerEngine::new(manager).unwrap();

        let output = engine
            .execute(&Language::Python, "print(input())", "hello\n", 10_000)
            .await
            .unwrap();

        assert!(!output.timed_out);
        assert!(!output.runtime_error);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    #[ignore] // needs a Docker daemon and the syllabus-python image
    async fn test_python_infinite_loop_times_out() {
        let manager = LanguageConfigManager::load(Path::new("../../config/languages.json")).unwrap();
        let engine = DockerEngine::new(manager).unwrap();

        let output = engine
            .execute(&Language::Python, "while True:\n    pass", "", 1_000)
            .await
            .unwrap();

        assert!(output.timed_out);
    }
}
