use std::sync::Arc;
use std::time::Duration;

use crate::models::containers::ContainerIndex;
use crate::models::images::{ImageIndex, ImageReference};
use crate::orchestrator::error::EngineError;
use crate::orchestrator::outcome::{bounded, CallOutcome};
use crate::runtime::error::RuntimeError;
use crate::runtime::runtime::RuntimeInterface;

/// Maps image tags to content IDs and content IDs to the containers running them.
pub(crate) struct Resolver {
    images: Arc<ImageIndex>,
    containers: Arc<ContainerIndex>,
    runtime: Arc<dyn RuntimeInterface>,
    deadline: Duration,
}

impl Resolver {
    pub(crate) fn new(images: Arc<ImageIndex>, containers: Arc<ContainerIndex>, runtime: Arc<dyn RuntimeInterface>, deadline: Duration) -> Self {
        Resolver { images, containers, runtime, deadline }
    }

    pub(crate) async fn tag_to_content_id(&self, reference: &ImageReference) -> Result<String, EngineError> {
        if let Some(content_id) = self.images.content_id_of(reference) {
            return Ok(content_id);
        }

        debug!("Image {} is not indexed, asking the daemon", reference);
        match bounded(self.deadline, "resolve", self.runtime.resolve_content_id(reference)).await {
            CallOutcome::Failed(RuntimeError::NotFound(_)) => Err(EngineError::ImageNotFound(reference.to_string())),
            outcome => outcome.into_result(),
        }
    }

    /// Live containers whose image carries `content_id`, under any of its tags.
    pub(crate) fn content_id_to_containers(&self, content_id: &str) -> Result<Vec<String>, EngineError> {
        let references = self.images.references_with_content_id(content_id);
        if references.is_empty() {
            return Err(EngineError::ImageNotFound(content_id.to_string()));
        }

        Ok(self.containers.ids_by_images(&references))
    }
}
