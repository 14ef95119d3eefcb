use bollard::{
    Docker,
    query_parameters::{BuildImageOptionsBuilder, RemoveImageOptionsBuilder},
};
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};

use crate::runtime::error::RuntimeError;

pub(crate) async fn build_image(docker: &Docker, source_dir: &Path, image: &str, dockerfile: &str) -> Result<String, RuntimeError> {
    info!("Docker build image {} from {}", image, source_dir.display());

    let context = pack_context(source_dir.to_path_buf()).await?;
    debug!("Build context for {} is {} bytes", image, context.len());

    let options = BuildImageOptionsBuilder::new()
        .dockerfile(dockerfile)
        .t(image)
        .rm(true)
        .build();

    let mut stream = docker.build_image(options, None, Some(bollard::body_full(context)));

    while let Some(build_result) = stream.next().await {
        let info = build_result.map_err(|e| {
            error!("Docker image build error: {}", e);
            RuntimeError::from(e)
        })?;

        if let Some(message) = info.error_detail.and_then(|detail| detail.message) {
            error!("Docker image build error: {}", message);
            return Err(RuntimeError::Daemon(message));
        }

        if let Some(line) = info.stream {
            debug!("[build {}] {}", image, line.trim_end());
        }
    }

    let content_id = resolve_content_id(docker, image).await?;
    info!("Docker image {} built as {}", image, content_id);
    Ok(content_id)
}

async fn pack_context(source_dir: PathBuf) -> Result<Bytes, RuntimeError> {
    let archive = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());
        builder.append_dir_all(".", &source_dir)?;
        builder.into_inner()
    })
    .await
    .map_err(|e| RuntimeError::FileSystemError(format!("Build context task failed: {}", e)))??;

    Ok(Bytes::from(archive))
}

pub(crate) async fn resolve_content_id(docker: &Docker, image: &str) -> Result<String, RuntimeError> {
    let inspect = docker.inspect_image(image).await?;
    inspect
        .id
        .ok_or_else(|| RuntimeError::NotFound(format!("No such image: {}", image)))
}

pub(crate) async fn remove_image(docker: &Docker, image: &str) -> Result<(), RuntimeError> {
    let options = RemoveImageOptionsBuilder::new().build();
    let deleted = docker.remove_image(image, Some(options), None).await?;
    info!("Docker image {} removed ({} layer(s))", image, deleted.len());
    Ok(())
}
