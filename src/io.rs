use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{create_dir_all, rename, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::store::Portal;

const SNAPSHOT_FORMAT: u32 = 1;

/// Written with `P = &Portal`, read back with `P = Portal`.
#[derive(Serialize, Deserialize)]
struct Snapshot<P> {
    format: u32,
    saved_at: DateTime<Utc>,
    portal: P,
}

/// Replaces the snapshot at `path`. Readers see the old file or the new
/// one, never half of either.
pub async fn save_snapshot(path: &Path, portal: &Portal) -> anyhow::Result<()> {
    let snapshot = Snapshot {
        format: SNAPSHOT_FORMAT,
        saved_at: Utc::now(),
        portal,
    };
    let bytes = postcard::to_allocvec(&snapshot)?;

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp).await?);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    rename(&tmp, path)
        .await
        .with_context(|| format!("moving snapshot into place at {}", path.display()))?;

    log::debug!("Snapshot of {} bytes written to {}.", bytes.len(), path.display());
    Ok(())
}

/// `Ok(None)` when there is no snapshot yet.
pub async fn load_snapshot(path: &Path) -> anyhow::Result<Option<Portal>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).await?)
        .read_to_end(&mut bytes)
        .await?;

    let snapshot: Snapshot<Portal> = postcard::from_bytes(&bytes)
        .with_context(|| format!("decoding snapshot {}", path.display()))?;
    if snapshot.format != SNAPSHOT_FORMAT {
        bail!(
            "Snapshot {} has format {}, expected {}",
            path.display(),
            snapshot.format,
            SNAPSHOT_FORMAT
        )
    }

    log::info!(
        "Restored snapshot saved at {} from {}.",
        snapshot.saved_at,
        path.display()
    );
    Ok(Some(snapshot.portal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProjectId, Role, UserId};

    #[tokio::test]
    async fn snapshot_restores_users_and_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("portal.dat");

        assert!(load_snapshot(&path).await.unwrap().is_none());

        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = portal.authenticate(Role::Admin, "admin", "admin").unwrap();
        portal
            .assign_examiner(&root, ProjectId(1), UserId(5))
            .unwrap();
        save_snapshot(&path, &portal).await.unwrap();
        assert!(!path.with_extension("tmp").exists());

        let restored = load_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(restored.identities().len(), 5);
        assert_eq!(
            restored.registry().project(ProjectId(1)).unwrap().examiner_id,
            Some(UserId(5))
        );
        assert!(restored
            .authenticate(Role::Student, "asmith", "password123")
            .is_ok());
    }

    #[tokio::test]
    async fn garbage_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.dat");
        tokio::fs::write(&path, b"not a snapshot").await.unwrap();
        assert!(load_snapshot(&path).await.is_err());
    }
}
