//! Container launch orchestration.
//!
//! [`ContainerOrchestrator::ensure_running`] makes sure a container named after
//! the repository exists with the configured bind and is being started:
//!
//! 1. Create the container from the request's image with the update command.
//! 2. If the engine reports that exact image missing, pull it and create again.
//!    This happens at most once per call; a second miss is a creation failure.
//! 3. If the name is already taken (a concurrent trigger won the race, or an
//!    earlier container still exists), reuse that container and start it
//!    unless it is already running. If the holder is gone by the time it is
//!    looked up, create once more; a second conflict is reported.
//! 4. Start runs on a spawned task. The container id is returned as soon as
//!    create succeeds; the [`StartHandle`] can be awaited or dropped.

pub mod state;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{ContainerEngine, ContainerSpec, ContainerState, find_by_name, same_image};
use crate::errors::{EngineError, OrchestratorError};
use crate::models::{ContainerRequest, RepositoryName};

pub use state::LaunchPhase;

/// Handle on the background start of a launched container.
pub type StartHandle = JoinHandle<Result<(), OrchestratorError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOrigin {
    /// This call created the container.
    Created,
    /// A container with the requested name already existed.
    Reused,
}

/// Result of a successful `ensure_running`.
#[derive(Debug)]
pub struct Launch {
    pub container_id: String,
    pub origin: LaunchOrigin,
    /// `None` when a reused container was already running.
    pub start: Option<StartHandle>,
}

impl Launch {
    /// Wait for the background start to finish and surface its result.
    pub async fn started(self) -> Result<String, OrchestratorError> {
        if let Some(handle) = self.start {
            handle
                .await
                .map_err(|_| OrchestratorError::StartTaskAborted {
                    id: self.container_id.clone(),
                })??;
        }
        Ok(self.container_id)
    }
}

/// Tracks and logs the phase of one launch.
struct PhaseLog {
    repository: String,
    phase: LaunchPhase,
}

impl PhaseLog {
    fn new(repository: &str, phase: LaunchPhase) -> Self {
        Self {
            repository: repository.to_string(),
            phase,
        }
    }

    fn advance(&mut self, next: LaunchPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal launch transition {} -> {}",
            self.phase,
            next
        );
        debug!(repository = %self.repository, from = %self.phase, to = %next, "launch phase");
        self.phase = next;
    }
}

/// Drives create → (pull) → start against a container engine.
#[derive(Clone)]
pub struct ContainerOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    command: Vec<String>,
}

impl ContainerOrchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, command: Vec<String>) -> Self {
        Self { engine, command }
    }

    pub async fn ensure_running(&self, req: &ContainerRequest) -> Result<Launch, OrchestratorError> {
        let name = req.name.as_str();
        let spec = ContainerSpec {
            name: name.to_string(),
            image: req.image.clone(),
            command: self.command.clone(),
            binds: vec![req.bind.clone()],
        };

        let mut phase = PhaseLog::new(name, LaunchPhase::Requested);
        let mut pulled = false;
        let mut conflict_retried = false;

        loop {
            phase.advance(LaunchPhase::Creating { retry: pulled });
            match self.engine.create_container(&spec).await {
                Ok(id) => {
                    phase.advance(LaunchPhase::Created);
                    info!(repository = %name, container = %id, "container created");
                    let start = self.spawn_start(id.clone(), req.name.clone());
                    return Ok(Launch {
                        container_id: id,
                        origin: LaunchOrigin::Created,
                        start: Some(start),
                    });
                }
                Err(EngineError::ImageNotFound { image })
                    if !pulled && same_image(&image, &req.image) =>
                {
                    phase.advance(LaunchPhase::ImagePulling);
                    info!(repository = %name, image = %req.image, "image missing locally, pulling");
                    if let Err(source) = self.engine.pull_image(&req.image).await {
                        phase.advance(LaunchPhase::Failed);
                        error!(repository = %name, image = %req.image, error = %source, "image pull failed");
                        return Err(OrchestratorError::PullFailed {
                            image: req.image.clone(),
                            source,
                        });
                    }
                    pulled = true;
                }
                Err(EngineError::NameConflict { .. }) => {
                    if let Some(launch) = self.reuse_existing(req, &mut phase).await? {
                        return Ok(launch);
                    }
                    if conflict_retried {
                        phase.advance(LaunchPhase::Failed);
                        warn!(repository = %name, "name still conflicts but no container holds it");
                        return Err(OrchestratorError::NameConflictUnresolved {
                            name: name.to_string(),
                        });
                    }
                    info!(repository = %name, "conflicting container is gone, creating again");
                    conflict_retried = true;
                }
                Err(source) => {
                    phase.advance(LaunchPhase::Failed);
                    error!(repository = %name, error = %source, "container creation failed");
                    return Err(OrchestratorError::CreationFailed {
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Another container already holds the name: adopt it. `None` when the
    /// holder vanished before the lookup and the name is free again.
    async fn reuse_existing(
        &self,
        req: &ContainerRequest,
        phase: &mut PhaseLog,
    ) -> Result<Option<Launch>, OrchestratorError> {
        let name = req.name.as_str();
        let existing = match find_by_name(self.engine.as_ref(), name).await {
            Ok(existing) => existing,
            Err(source) => {
                phase.advance(LaunchPhase::Failed);
                return Err(OrchestratorError::LookupFailed {
                    name: name.to_string(),
                    source,
                });
            }
        };

        let Some(record) = existing else {
            return Ok(None);
        };

        phase.advance(LaunchPhase::Created);
        info!(
            repository = %name,
            container = %record.id,
            state = ?record.state,
            "container name already taken, reusing existing container"
        );

        let start = if record.state == ContainerState::Running {
            phase.advance(LaunchPhase::Starting);
            phase.advance(LaunchPhase::Running);
            None
        } else {
            Some(self.spawn_start(record.id.clone(), req.name.clone()))
        };

        Ok(Some(Launch {
            container_id: record.id,
            origin: LaunchOrigin::Reused,
            start,
        }))
    }

    fn spawn_start(&self, id: String, name: RepositoryName) -> StartHandle {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let mut phase = PhaseLog::new(name.as_str(), LaunchPhase::Created);
            phase.advance(LaunchPhase::Starting);
            match engine.start_container(&id).await {
                Ok(()) => {
                    phase.advance(LaunchPhase::Running);
                    info!(repository = %name, container = %id, "container started");
                    Ok(())
                }
                Err(EngineError::NotModified { .. }) => {
                    phase.advance(LaunchPhase::Running);
                    debug!(repository = %name, container = %id, "container was already running");
                    Ok(())
                }
                Err(source) => {
                    phase.advance(LaunchPhase::Failed);
                    error!(repository = %name, container = %id, error = %source, "failed to start container");
                    Err(OrchestratorError::StartFailed {
                        id,
                        name: name.to_string(),
                        source,
                    })
                }
            }
        })
    }
}
