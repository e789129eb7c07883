//! Removal of exited containers.
//!
//! Launched containers run a one-shot update command and then exit; the reaper
//! removes them so the names can be reused on the next push. `sweep` is called
//! before every webhook-triggered launch and from the periodic task started by
//! `spawn_periodic`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{ContainerEngine, ContainerFilter};
use crate::errors::EngineError;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Ids removed.
    pub removed: Vec<String>,
    /// Ids whose removal failed.
    pub failed: Vec<String>,
}

pub struct DeadContainerReaper {
    engine: Arc<dyn ContainerEngine>,
}

impl DeadContainerReaper {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Remove every container the engine reports as exited.
    ///
    /// A failed removal is logged and recorded; the remaining containers are
    /// still removed. Only a failed listing is returned as an error.
    pub async fn sweep(&self) -> Result<ReapReport, EngineError> {
        let exited = self.engine.list_containers(ContainerFilter::Exited).await?;
        let mut report = ReapReport::default();

        for container in exited {
            match self.engine.remove_container(&container.id).await {
                Ok(()) => {
                    debug!(container = %container.id, names = ?container.names, "removed exited container");
                    report.removed.push(container.id);
                }
                Err(e) => {
                    warn!(container = %container.id, names = ?container.names, error = %e, "failed to remove exited container");
                    report.failed.push(container.id);
                }
            }
        }

        if !report.removed.is_empty() || !report.failed.is_empty() {
            info!(
                removed = report.removed.len(),
                failed = report.failed.len(),
                "reaped exited containers"
            );
        }
        Ok(report)
    }

    /// Sweep now and then every `every` until the returned task is aborted.
    pub fn spawn_periodic(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    warn!(error = %e, "periodic sweep failed to list containers");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerRecord, ContainerSpec, ContainerState, InMemoryEngine};
    use async_trait::async_trait;

    fn setup() -> (Arc<InMemoryEngine>, DeadContainerReaper) {
        let engine = Arc::new(InMemoryEngine::new());
        let reaper = DeadContainerReaper::new(engine.clone());
        (engine, reaper)
    }

    #[tokio::test]
    async fn test_sweep_removes_only_exited() {
        let (engine, reaper) = setup();
        let dead = engine.insert_container("a", ContainerState::Exited);
        let live = engine.insert_container("b", ContainerState::Running);
        let fresh = engine.insert_container("c", ContainerState::Created);

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.removed, vec![dead]);
        assert!(report.failed.is_empty());

        let remaining: Vec<String> = engine.containers().into_iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![live, fresh]);
    }

    #[tokio::test]
    async fn test_one_failed_removal_does_not_stop_the_sweep() {
        let (engine, reaper) = setup();
        let ids: Vec<String> = (0..5)
            .map(|i| engine.insert_container(&format!("dead-{}", i), ContainerState::Exited))
            .collect();
        engine.fail_removal_of(&ids[1]);

        let report = reaper.sweep().await.unwrap();
        assert_eq!(report.failed, vec![ids[1].clone()]);
        assert_eq!(report.removed.len(), 4);
        assert_eq!(engine.calls().remove, 5);

        let remaining = engine.containers();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ids[1]);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_exited_is_empty() {
        let (engine, reaper) = setup();
        engine.insert_container("a", ContainerState::Running);
        let report = reaper.sweep().await.unwrap();
        assert_eq!(report, ReapReport::default());
        assert_eq!(engine.calls().remove, 0);
    }

    struct UnreachableEngine;

    #[async_trait]
    impl ContainerEngine for UnreachableEngine {
        async fn list_containers(
            &self,
            _filter: ContainerFilter,
        ) -> Result<Vec<ContainerRecord>, EngineError> {
            Err(EngineError::Api("connection refused".into()))
        }
        async fn create_container(&self, _spec: &ContainerSpec) -> Result<String, EngineError> {
            unreachable!()
        }
        async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
            unreachable!()
        }
        async fn remove_container(&self, _id: &str) -> Result<(), EngineError> {
            unreachable!()
        }
        async fn pull_image(&self, _reference: &str) -> Result<(), EngineError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_list_failure_is_returned_not_fatal() {
        let reaper = DeadContainerReaper::new(Arc::new(UnreachableEngine));
        let err = reaper.sweep().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_periodic_sweep_keeps_running() {
        let (engine, reaper) = setup();
        engine.insert_container("a", ContainerState::Exited);

        let handle = Arc::new(reaper).spawn_periodic(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;
        engine.insert_container("b", ContainerState::Exited);
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(engine.containers().is_empty());
        assert!(engine.calls().list >= 2);
    }
}
