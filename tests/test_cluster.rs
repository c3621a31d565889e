#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use hpa_experiment::cluster::{Cluster, KubectlCluster};
use hpa_experiment::error::ExperimentError;

const FAKE_KUBECTL: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$1" in
  get)
    echo '{"apiVersion": "v1", "items": [{"status": {"replicas": 3}}]}'
    ;;
  delete)
    echo 'Error from server (NotFound): deployments.apps "predictive-deployment" not found' >&2
    exit 1
    ;;
esac
"#;

fn install_fake_kubectl(dir: &Path) -> PathBuf {
    let path = dir.join("kubectl");
    std::fs::write(&path, FAKE_KUBECTL).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// a single test so no other thread forks while the script is being written
#[tokio::test]
async fn test_kubectl_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let kubectl = install_fake_kubectl(dir.path());
    let cluster = KubectlCluster::with_binary(kubectl.to_string_lossy().into_owned());

    cluster.apply(Path::new("horizontal.yaml")).await.unwrap();
    let replicas = cluster.replica_count("experiments", "run=horizontal-deployment").await.unwrap();
    assert_eq!(replicas, 3);

    let error = cluster.delete(Path::new("predictive.yaml")).await.unwrap_err();
    match error {
        ExperimentError::Kubectl { command, status, stderr } => {
            assert!(command.ends_with("kubectl delete -f predictive.yaml"));
            assert_eq!(status.code(), Some(1));
            assert_eq!(stderr, "Error from server (NotFound): deployments.apps \"predictive-deployment\" not found");
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(calls(dir.path()), vec![
        "apply -f horizontal.yaml",
        "get deployments -n experiments -l run=horizontal-deployment -o json",
        "delete -f predictive.yaml",
    ]);

    let missing = KubectlCluster::with_binary(dir.path().join("no-kubectl").to_string_lossy().into_owned());
    let error = missing.apply(Path::new("horizontal.yaml")).await.unwrap_err();
    assert!(matches!(error, ExperimentError::Spawn { .. }));
}
