//! Versioned model artifact persistence
//!
//! A trained model is stored as two JSON blobs, the fitted scaler and the
//! ensemble with its training metadata, under `<artifact_dir>/<version>/`,
//! next to a `MANIFEST` of SHA-256 digests. A load whose blobs do not match
//! the manifest is reported as corrupt.
//!
//! Saves build the complete directory under a staging name and then swap it
//! in by rename, so a failed save leaves the previous version intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::classifier::{StandardScaler, TrainedModel, VotingEnsemble};
use shared::training::EvaluationMetrics;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SCALER_FILE: &str = "feature_scaler.json";
pub const MODEL_FILE: &str = "flood_risk_model.json";
pub const MANIFEST_FILE: &str = "MANIFEST";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact for {version} is corrupt: {reason}")]
    Corrupt { version: String, reason: String },

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Facts about how a stored model was produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMetadata {
    pub variant: String,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub metrics: EvaluationMetrics,
}

/// Everything needed to rebuild a [`TrainedModel`]
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub model: TrainedModel,
    pub metadata: ArtifactMetadata,
}

#[derive(Serialize)]
struct ModelFileRef<'a> {
    metadata: &'a ArtifactMetadata,
    ensemble: &'a VotingEnsemble,
}

#[derive(Deserialize)]
struct ModelFile {
    metadata: ArtifactMetadata,
    ensemble: VotingEnsemble,
}

/// Load/save trained models by version tag
#[axum::async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// `Ok(None)` when nothing is stored for `version`
    async fn load(&self, version: &str) -> Result<Option<ArtifactBundle>, ArtifactError>;

    async fn save(&self, version: &str, bundle: &ArtifactBundle) -> Result<(), ArtifactError>;

    async fn exists(&self, version: &str) -> bool;
}

/// Filesystem repository rooted at the configured artifact directory
#[derive(Debug, Clone)]
pub struct FsArtifactRepository {
    root: PathBuf,
}

impl FsArtifactRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn digest_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn render_manifest(entries: &[(&str, &[u8])]) -> String {
    entries
        .iter()
        .map(|(name, data)| format!("{}  {}\n", digest_hex(data), name))
        .collect()
}

fn parse_manifest(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let (digest, name) = line.split_once("  ")?;
            Some((name.trim().to_string(), digest.trim().to_string()))
        })
        .collect()
}

/// Write `data` to `path` and flush it to disk
async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

impl FsArtifactRepository {
    /// Publish `files` plus their manifest as the contents of `version`
    async fn publish(&self, version: &str, files: &[(&str, &[u8])]) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let staging = self
            .root
            .join(format!(".{}.staging-{}", version, Uuid::new_v4()));

        let result = self.stage_and_swap(version, &staging, files).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %staging.display(), error = %e, "Could not remove staging directory");
                }
            }
        }
        result
    }

    async fn stage_and_swap(
        &self,
        version: &str,
        staging: &Path,
        files: &[(&str, &[u8])],
    ) -> Result<(), ArtifactError> {
        tokio::fs::create_dir(staging).await?;
        for (name, data) in files {
            write_synced(&staging.join(name), data).await?;
        }
        let manifest = render_manifest(files);
        write_synced(&staging.join(MANIFEST_FILE), manifest.as_bytes()).await?;

        let live = self.version_dir(version);
        let retired = self
            .root
            .join(format!(".{}.retired-{}", version, Uuid::new_v4()));
        let had_live = match tokio::fs::rename(&live, &retired).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = tokio::fs::rename(staging, &live).await {
            if had_live {
                tokio::fs::rename(&retired, &live).await?;
            }
            return Err(e.into());
        }

        if had_live {
            if let Err(e) = tokio::fs::remove_dir_all(&retired).await {
                tracing::warn!(path = %retired.display(), error = %e, "Could not remove retired artifact");
            }
        }
        Ok(())
    }
}

fn corrupt(version: &str, reason: impl Into<String>) -> ArtifactError {
    ArtifactError::Corrupt {
        version: version.to_string(),
        reason: reason.into(),
    }
}

#[axum::async_trait]
impl ArtifactRepository for FsArtifactRepository {
    async fn load(&self, version: &str) -> Result<Option<ArtifactBundle>, ArtifactError> {
        let dir = self.version_dir(version);
        let manifest = match tokio::fs::read_to_string(dir.join(MANIFEST_FILE)).await {
            Ok(text) => parse_manifest(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut blobs = Vec::with_capacity(2);
        for name in [SCALER_FILE, MODEL_FILE] {
            let expected = manifest
                .get(name)
                .ok_or_else(|| corrupt(version, format!("{} missing from manifest", name)))?;
            let data = match tokio::fs::read(dir.join(name)).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(corrupt(version, format!("{} missing", name)));
                }
                Err(e) => return Err(e.into()),
            };
            if &digest_hex(&data) != expected {
                return Err(corrupt(version, format!("{} digest mismatch", name)));
            }
            blobs.push(data);
        }

        let scaler: StandardScaler = serde_json::from_slice(&blobs[0])?;
        let model: ModelFile = serde_json::from_slice(&blobs[1])?;

        Ok(Some(ArtifactBundle {
            model: TrainedModel {
                scaler,
                ensemble: model.ensemble,
            },
            metadata: model.metadata,
        }))
    }

    async fn save(&self, version: &str, bundle: &ArtifactBundle) -> Result<(), ArtifactError> {
        let scaler = serde_json::to_vec(&bundle.model.scaler)?;
        let model = serde_json::to_vec(&ModelFileRef {
            metadata: &bundle.metadata,
            ensemble: &bundle.model.ensemble,
        })?;

        self.publish(version, &[(SCALER_FILE, scaler.as_slice()), (MODEL_FILE, model.as_slice())])
            .await?;

        tracing::info!(version, path = %self.version_dir(version).display(), "Model artifact saved");
        Ok(())
    }

    async fn exists(&self, version: &str) -> bool {
        tokio::fs::try_exists(self.version_dir(version).join(MANIFEST_FILE))
            .await
            .unwrap_or(false)
    }
}

/// Keeps artifacts in memory
#[derive(Default)]
pub struct MemoryArtifactRepository {
    bundles: RwLock<HashMap<String, ArtifactBundle>>,
}

impl MemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[axum::async_trait]
impl ArtifactRepository for MemoryArtifactRepository {
    async fn load(&self, version: &str) -> Result<Option<ArtifactBundle>, ArtifactError> {
        Ok(self.bundles.read().await.get(version).cloned())
    }

    async fn save(&self, version: &str, bundle: &ArtifactBundle) -> Result<(), ArtifactError> {
        self.bundles
            .write()
            .await
            .insert(version.to_string(), bundle.clone());
        Ok(())
    }

    async fn exists(&self, version: &str) -> bool {
        self.bundles.read().await.contains_key(version)
    }
}
