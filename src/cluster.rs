//! Access to the Kubernetes cluster hosting the targets.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{ExperimentError, Result};

#[async_trait]
pub trait Cluster: Send + Sync {
    /// Creates the objects of a manifest.
    async fn apply(&self, manifest: &Path) -> Result<()>;
    /// Deletes the objects of a manifest.
    async fn delete(&self, manifest: &Path) -> Result<()>;
    /// Current replica count of the first deployment matching the selector.
    async fn replica_count(&self, namespace: &str, label_selector: &str) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    items: Vec<DeploymentItem>,
}

#[derive(Debug, Deserialize)]
struct DeploymentItem {
    #[serde(default)]
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentStatus {
    // omitted by the API server when zero
    #[serde(default)]
    replicas: u64,
}

/// Parses `kubectl get deployments -o json` output and returns the replicas of the first item.
pub fn parse_replica_count(json: &str, namespace: &str, label_selector: &str) -> Result<u64> {
    let list: DeploymentList = serde_json::from_str(json)?;
    list.items.first()
        .map(|deployment| deployment.status.replicas)
        .ok_or_else(|| ExperimentError::NoDeployment {
            namespace: namespace.to_string(),
            selector: label_selector.to_string(),
        })
}

/// Cluster driven through the `kubectl` binary, using whatever context kubectl is configured for.
pub struct KubectlCluster {
    kubectl: String,
}

impl KubectlCluster {
    pub fn new() -> Self {
        Self { kubectl: "kubectl".to_string() }
    }

    pub fn with_binary(kubectl: impl Into<String>) -> Self {
        Self { kubectl: kubectl.into() }
    }

    async fn kubectl(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.kubectl, args.join(" "));
        debug!("Running {}", command);
        let output = Command::new(&self.kubectl)
            .args(args)
            .output()
            .await
            .map_err(|source| ExperimentError::Spawn { command: command.clone(), source })?;
        if !output.status.success() {
            return Err(ExperimentError::Kubectl {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for KubectlCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cluster for KubectlCluster {
    async fn apply(&self, manifest: &Path) -> Result<()> {
        info!("Creating k8s objects from {}", manifest.display());
        self.kubectl(&["apply", "-f", &manifest.to_string_lossy()]).await?;
        Ok(())
    }

    async fn delete(&self, manifest: &Path) -> Result<()> {
        info!("Deleting k8s objects from {}", manifest.display());
        self.kubectl(&["delete", "-f", &manifest.to_string_lossy()]).await?;
        Ok(())
    }

    async fn replica_count(&self, namespace: &str, label_selector: &str) -> Result<u64> {
        let json = self.kubectl(&["get", "deployments", "-n", namespace, "-l", label_selector, "-o", "json"])
            .await?;
        parse_replica_count(&json, namespace, label_selector)
    }
}
