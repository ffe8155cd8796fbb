//! Gateway that shells out to the `kubectl` CLI

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use super::gateway::{target, ClusterGateway};
use super::status::WorkloadStatus;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::manifest::ManifestPayload;

/// Raw result of one kubectl invocation
#[derive(Debug, Clone)]
pub struct KubectlOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl KubectlOutput {
    /// stdout followed by stderr, the way a terminal would show it
    pub fn combined(&self) -> Vec<u8> {
        let mut out = self.stdout.clone();
        out.extend_from_slice(&self.stderr);
        out
    }

    fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// True only when the API server reported the pod `name` itself as
    /// missing; context, kubeconfig or namespace errors do not count
    fn is_pod_not_found(&self, name: &str) -> bool {
        let missing = format!("pods \"{}\" not found", name);
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .any(|line| line.starts_with("Error from server (NotFound)") && line.ends_with(&missing))
    }
}

/// Cluster gateway driving `kubectl`
#[derive(Debug, Clone)]
pub struct KubectlGateway {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl KubectlGateway {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            kubeconfig,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.kubeconfig.clone())
    }

    /// Use a different kubectl executable
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Build the argument list, prefixing `--kubeconfig` when configured
    fn args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(path) = &self.kubeconfig {
            full.push("--kubeconfig".to_string());
            full.push(path.display().to_string());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    /// Run kubectl with `args`, feeding `stdin` if given
    #[instrument(skip(self, stdin))]
    pub async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> std::io::Result<KubectlOutput> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(args))
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        // Dropping the pipe closes stdin, which tells kubectl the manifest is complete
        let write_error = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input).await.err(),
            _ => None,
        };

        let output = child.wait_with_output().await?;
        let mut result = KubectlOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        };

        // kubectl exited before reading all of stdin; its stderr says why
        if let Some(e) = write_error {
            warn!(error = %e, "kubectl closed stdin early");
            result.success = false;
            if result.stderr.is_empty() {
                result.stderr = format!("writing manifest to kubectl: {}", e).into_bytes();
            }
        }

        if !result.success {
            warn!(stderr = %result.stderr_lossy(), "kubectl exited with failure");
        }
        Ok(result)
    }

    async fn apply_with(&self, manifest: &ManifestPayload, namespace: Option<&str>) -> HarnessResult<()> {
        let mut args = vec!["apply", "-f", "-"];
        if let Some(ns) = namespace {
            args.extend(["--namespace", ns]);
        }
        let scope = namespace.unwrap_or("default namespace").to_string();

        let output = self
            .run(&args, Some(manifest.as_bytes()))
            .await
            .map_err(|e| HarnessError::gateway("apply", scope.clone(), e))?;

        if output.success {
            info!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "Manifest applied");
            Ok(())
        } else {
            error!("kubectl apply failed: {}", output.stderr_lossy());
            Err(HarnessError::gateway_with_output(
                "apply",
                scope,
                String::from_utf8_lossy(&output.combined()),
                "kubectl apply exited with failure",
            ))
        }
    }
}

impl Default for KubectlGateway {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ClusterGateway for KubectlGateway {
    async fn apply(&self, manifest: &ManifestPayload) -> HarnessResult<()> {
        self.apply_with(manifest, None).await
    }

    async fn apply_in_namespace(
        &self,
        manifest: &ManifestPayload,
        namespace: &str,
    ) -> HarnessResult<()> {
        self.apply_with(manifest, Some(namespace)).await
    }

    #[instrument(skip(self))]
    async fn get_status(&self, name: &str, namespace: &str) -> HarnessResult<WorkloadStatus> {
        let output = self
            .run(&["get", "pod", "--namespace", namespace, name, "-o", "json"], None)
            .await
            .map_err(|e| HarnessError::gateway("get status", target(namespace, name), e))?;

        if !output.success {
            if output.is_pod_not_found(name) {
                return Err(HarnessError::not_found(name, namespace));
            }
            return Err(HarnessError::gateway_with_output(
                "get status",
                target(namespace, name),
                output.stderr_lossy(),
                "kubectl get exited with failure",
            ));
        }

        let pod: Pod = serde_json::from_slice(&output.stdout)
            .map_err(|e| HarnessError::gateway("get status", target(namespace, name), e))?;
        Ok(WorkloadStatus::from_pod(&pod))
    }

    #[instrument(skip(self))]
    async fn delete(&self, namespace: &str, name: &str) -> HarnessResult<Vec<u8>> {
        let output = self
            .run(&["delete", "pod", "--namespace", namespace, name], None)
            .await
            .map_err(|e| HarnessError::gateway("delete", target(namespace, name), e))?;

        if output.success {
            info!(name, namespace, "Deleted pod");
            return Ok(output.combined());
        }
        if output.is_pod_not_found(name) {
            return Err(HarnessError::not_found(name, namespace));
        }
        Err(HarnessError::gateway_with_output(
            "delete",
            target(namespace, name),
            String::from_utf8_lossy(&output.combined()),
            "kubectl delete exited with failure",
        ))
    }
}
