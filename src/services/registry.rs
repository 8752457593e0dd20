use crate::backends::RegistryClient;
use crate::domain::models::{Ensured, RunConfig};
use crate::error::Result;
use crate::services::ensure::ensure_idempotent;
use crate::services::stager::StagedArtifact;

#[derive(Debug, Clone)]
pub struct PublishedImage {
    pub image_ref: String,
    pub tag: String,
    pub repository: Ensured,
}

/// Log in, make sure the repository exists, then build, tag and push the
/// staged source under its fingerprint.
pub fn publish(
    registry: &dyn RegistryClient,
    config: &RunConfig,
    staged: &StagedArtifact,
) -> Result<PublishedImage> {
    registry.login(config)?;

    let repository = ensure_idempotent(
        || registry.repository_exists(config),
        || registry.create_repository(config),
    )?;
    tracing::info!(
        repository = %config.repository_name(),
        outcome = ?repository,
        "registry repository ready"
    );

    let tag = staged.fingerprint.clone();
    let local = format!("{}:{}", config.repository_name(), tag);
    let image_ref = config.image_ref(&tag);

    registry.build(&staged.dir, &local)?;
    registry.tag(&local, &image_ref)?;
    registry.push(&image_ref)?;
    tracing::info!(image = %image_ref, "pushed image");

    Ok(PublishedImage {
        image_ref,
        tag,
        repository,
    })
}
