use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, ContainerSummary, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListContainersOptionsBuilder,
    RemoveContainerOptions, StartContainerOptions,
};
use futures_util::TryStreamExt;
use tracing::debug;

use super::{
    ContainerEngine, ContainerFilter, ContainerRecord, ContainerSpec, ContainerState,
    split_reference,
};
use crate::errors::EngineError;

/// Docker daemon client over bollard.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST` when set, otherwise the local socket.
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_defaults().map_err(|e| EngineError::Api(e.to_string()))?;
        Ok(Self { docker })
    }
}

/// Which call produced a daemon error; used to name the subject in the
/// classified error.
enum Subject<'a> {
    Container(&'a str),
    Create { name: &'a str, image: &'a str },
    Image(&'a str),
}

fn classify(err: BollardError, subject: Subject<'_>) -> EngineError {
    let (status_code, message) = match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => (status_code, message),
        other => return EngineError::Api(other.to_string()),
    };

    match (status_code, subject) {
        (404, Subject::Create { image, .. }) if message.contains("No such image") => {
            let missing = message
                .rsplit_once("No such image: ")
                .map(|(_, rest)| rest.trim().to_string())
                .unwrap_or_else(|| image.to_string());
            EngineError::ImageNotFound { image: missing }
        }
        (404, Subject::Image(image)) => EngineError::ImageNotFound {
            image: image.to_string(),
        },
        (409, Subject::Create { name, .. }) => EngineError::NameConflict {
            name: name.to_string(),
        },
        (304, Subject::Container(id)) => EngineError::NotModified { id: id.to_string() },
        (404, Subject::Container(id)) => EngineError::NotFound { id: id.to_string() },
        (status, _) => EngineError::Api(format!("{} (status {})", message, status)),
    }
}

impl From<ContainerSummary> for ContainerRecord {
    fn from(summary: ContainerSummary) -> Self {
        let state = summary
            .status
            .as_deref()
            .map(ContainerState::from_status)
            .unwrap_or(ContainerState::Other);
        ContainerRecord {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
            state,
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list_containers(
        &self,
        filter: ContainerFilter,
    ) -> Result<Vec<ContainerRecord>, EngineError> {
        let mut filters: HashMap<&str, Vec<&str>> = HashMap::new();
        if filter == ContainerFilter::Exited {
            filters.insert("status", vec!["exited"]);
        }
        let options = ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&filters)
            .build();

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| EngineError::Api(e.to_string()))?;
        Ok(containers.into_iter().map(ContainerRecord::from).collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let options = CreateContainerOptionsBuilder::new()
            .name(&spec.name)
            .build();
        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| {
                classify(
                    e,
                    Subject::Create {
                        name: &spec.name,
                        image: &spec.image,
                    },
                )
            })?;
        for warning in &response.warnings {
            debug!(container = %spec.name, %warning, "engine warning on create");
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await
            .map_err(|e| classify(e, Subject::Container(id)))
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| classify(e, Subject::Container(id)))
    }

    async fn pull_image(&self, reference: &str) -> Result<(), EngineError> {
        let (image, tag) = split_reference(reference);
        let options = CreateImageOptionsBuilder::new()
            .from_image(image)
            .tag(tag)
            .build();

        let progress: Vec<_> = self
            .docker
            .create_image(Some(options), None, None)
            .try_collect()
            .await
            .map_err(|e| classify(e, Subject::Image(reference)))?;
        debug!(image = %reference, updates = progress.len(), "image pull finished");
        Ok(())
    }
}
