use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ContainerEngine, ContainerFilter, ContainerRecord, ContainerSpec, ContainerState, same_image,
};
use crate::errors::EngineError;

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCalls {
    pub list: usize,
    pub create: usize,
    pub start: usize,
    pub remove: usize,
    pub pull: usize,
}

#[derive(Debug, Clone)]
struct StoredContainer {
    id: String,
    spec: ContainerSpec,
    state: ContainerState,
}

#[derive(Default)]
struct MemoryState {
    containers: Vec<StoredContainer>,
    images: HashSet<String>,
    next_id: u64,
    calls: EngineCalls,
    failing_removals: HashSet<String>,
    create_failure: Option<String>,
    start_failure: Option<String>,
    pull_failure: Option<String>,
    pull_keeps_image_missing: bool,
    exit_on_start: bool,
}

impl MemoryState {
    fn has_image(&self, reference: &str) -> bool {
        self.images.iter().any(|i| same_image(i, reference))
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem{:012x}", self.next_id)
    }
}

/// Engine that keeps containers and images in memory and enforces the same
/// name uniqueness and image presence rules as a real daemon.
///
/// Used by the test suite and by `--dry-run`.
#[derive(Default)]
pub struct InMemoryEngine {
    state: Mutex<MemoryState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine for `--dry-run`: pulls succeed and started containers exit
    /// immediately, like a one-shot update command would.
    pub fn dry_run() -> Self {
        let engine = Self::new();
        engine.with_state(|s| s.exit_on_start = true);
        engine
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn add_image(&self, reference: &str) {
        self.with_state(|s| {
            s.images.insert(reference.to_string());
        });
    }

    /// Seed a container directly, bypassing the create counters.
    pub fn insert_container(&self, name: &str, state: ContainerState) -> String {
        self.with_state(|s| {
            let id = s.allocate_id();
            s.containers.push(StoredContainer {
                id: id.clone(),
                spec: ContainerSpec {
                    name: name.to_string(),
                    image: String::new(),
                    command: Vec::new(),
                    binds: Vec::new(),
                },
                state,
            });
            id
        })
    }

    pub fn calls(&self) -> EngineCalls {
        self.with_state(|s| s.calls)
    }

    pub fn containers(&self) -> Vec<ContainerRecord> {
        self.with_state(|s| s.containers.iter().map(record).collect())
    }

    /// Spec the named container was created with.
    pub fn spec_of(&self, name: &str) -> Option<ContainerSpec> {
        self.with_state(|s| {
            s.containers
                .iter()
                .find(|c| c.spec.name == name)
                .map(|c| c.spec.clone())
        })
    }
}

fn record(c: &StoredContainer) -> ContainerRecord {
    ContainerRecord {
        id: c.id.clone(),
        names: vec![format!("/{}", c.spec.name)],
        state: c.state,
    }
}

/// Failure injection. Nothing in the service calls these; they let tests
/// drive the error paths of the orchestrator, reaper, and router.
impl InMemoryEngine {
    /// Test hook: make `remove_container` fail for this id.
    pub fn fail_removal_of(&self, id: &str) {
        self.with_state(|s| {
            s.failing_removals.insert(id.to_string());
        });
    }

    /// Test hook: make every `create_container` fail with an engine API error.
    pub fn fail_creates(&self, message: &str) {
        self.with_state(|s| s.create_failure = Some(message.to_string()));
    }

    /// Test hook: make every `start_container` fail with an engine API error.
    pub fn fail_starts(&self, message: &str) {
        self.with_state(|s| s.start_failure = Some(message.to_string()));
    }

    /// Test hook: make every `pull_image` fail with an engine API error.
    pub fn fail_pulls(&self, message: &str) {
        self.with_state(|s| s.pull_failure = Some(message.to_string()));
    }

    /// Test hook: pulls report success but the image never becomes available.
    pub fn pull_keeps_image_missing(&self) {
        self.with_state(|s| s.pull_keeps_image_missing = true);
    }
}

#[async_trait]
impl ContainerEngine for InMemoryEngine {
    async fn list_containers(
        &self,
        filter: ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, EngineError> {
        Ok(self.with_state(|s| {
            s.calls.list += 1;
            s.containers
                .iter()
                .filter(|c| match filter {
                    ContainerFilter::All => true,
                    ContainerFilter::Exited => c.state == ContainerState::Exited,
                })
                .map(record)
                .collect()
        }))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        self.with_state(|s| {
            s.calls.create += 1;
            if let Some(message) = &s.create_failure {
                return Err(EngineError::Api(message.clone()));
            }
            if !s.has_image(&spec.image) {
                return Err(EngineError::ImageNotFound {
                    image: spec.image.clone(),
                });
            }
            if s.containers.iter().any(|c| c.spec.name == spec.name) {
                return Err(EngineError::NameConflict {
                    name: spec.name.clone(),
                });
            }
            let id = s.allocate_id();
            s.containers.push(StoredContainer {
                id: id.clone(),
                spec: spec.clone(),
                state: ContainerState::Created,
            });
            Ok(id)
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.with_state(|s| {
            s.calls.start += 1;
            if let Some(message) = &s.start_failure {
                return Err(EngineError::Api(message.clone()));
            }
            let exit_on_start = s.exit_on_start;
            let container = s
                .containers
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
            if container.state == ContainerState::Running {
                return Err(EngineError::NotModified { id: id.to_string() });
            }
            container.state = if exit_on_start {
                ContainerState::Exited
            } else {
                ContainerState::Running
            };
            Ok(())
        })
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.with_state(|s| {
            s.calls.remove += 1;
            if s.failing_removals.contains(id) {
                return Err(EngineError::Api(format!("removal of {} is in progress", id)));
            }
            let before = s.containers.len();
            s.containers.retain(|c| c.id != id);
            if s.containers.len() == before {
                return Err(EngineError::NotFound { id: id.to_string() });
            }
            Ok(())
        })
    }

    async fn pull_image(&self, reference: &str) -> Result<(), EngineError> {
        self.with_state(|s| {
            s.calls.pull += 1;
            if let Some(message) = &s.pull_failure {
                return Err(EngineError::Api(message.clone()));
            }
            if !s.pull_keeps_image_missing {
                s.images.insert(reference.to_string());
            }
            Ok(())
        })
    }
}
