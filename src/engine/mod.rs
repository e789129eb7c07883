//! Container engine seam.
//!
//! The orchestrator and reaper only ever talk to a [`ContainerEngine`]. The
//! production implementation is [`DockerEngine`] (bollard over the local
//! daemon socket); [`InMemoryEngine`] backs the test suite and `--dry-run`.

pub mod docker;
pub mod memory;

use async_trait::async_trait;

use crate::errors::EngineError;

pub use docker::DockerEngine;
pub use memory::{EngineCalls, InMemoryEngine};

/// Which containers a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFilter {
    /// Every container the engine knows about, stopped ones included.
    All,
    /// Only containers whose status is `exited`.
    Exited,
}

/// Coarse lifecycle state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Exited,
    Other,
}

impl ContainerState {
    /// Map the engine's human status line (`Up 3 seconds`, `Exited (0) ...`).
    pub fn from_status(status: &str) -> Self {
        let status = status.trim();
        if status.starts_with("Up") {
            ContainerState::Running
        } else if status.starts_with("Exited") {
            ContainerState::Exited
        } else if status.starts_with("Created") {
            ContainerState::Created
        } else {
            ContainerState::Other
        }
    }
}

/// Engine-owned container as seen through a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    /// Canonical names, each prefixed with `/`.
    pub names: Vec<String>,
    pub state: ContainerState,
}

impl ContainerRecord {
    pub fn is_named(&self, name: &str) -> bool {
        let canonical = format!("/{}", name);
        self.names.iter().any(|n| *n == canonical)
    }
}

/// Everything the engine needs to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub binds: Vec<String>,
}

/// Abstraction over the container runtime's control API.
/// Real implementation: `DockerEngine`. Test double: `InMemoryEngine`.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn list_containers(
        &self,
        filter: ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, EngineError>;

    /// Returns the engine-assigned container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    async fn pull_image(&self, reference: &str) -> Result<(), EngineError>;
}

/// Find a container by its exact name (`"/" + name`), stopped ones included.
///
/// Absence is an expected outcome and yields `Ok(None)`.
pub async fn find_by_name(
    engine: &dyn ContainerEngine,
    name: &str,
) -> Result<Option<ContainerRecord>, EngineError> {
    let containers = engine.list_containers(ContainerFilter::All).await?;
    Ok(containers.into_iter().find(|c| c.is_named(name)))
}

/// Split an image reference into repository and tag, defaulting the tag to
/// `latest`. Digest references keep their digest in the tag slot.
pub fn split_reference(reference: &str) -> (&str, &str) {
    if let Some((repo, digest)) = reference.split_once('@') {
        return (repo, digest);
    }
    let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[last_slash..].rfind(':') {
        Some(colon) => {
            let at = last_slash + colon;
            (&reference[..at], &reference[at + 1..])
        }
        None => (reference, "latest"),
    }
}

/// True when two references name the same image once the implicit `latest`
/// tag is filled in on both sides.
pub fn same_image(a: &str, b: &str) -> bool {
    split_reference(a.trim()) == split_reference(b.trim())
}
