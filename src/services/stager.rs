use crate::error::{PipelineError, Result, Stage};
use crate::exec::{run_tolerant, CommandRunner, Invocation};
use crate::services::storage::copy_dir_all;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub dir: PathBuf,
    /// First 12 hex chars of the content digest; used as the image tag.
    pub fingerprint: String,
}

fn is_remote(source: &str) -> bool {
    ["https://", "http://", "ssh://", "git@", "git://"]
        .iter()
        .any(|p| source.starts_with(p))
}

/// Replace `staging_dir` with a fresh copy of `source` (local directory or
/// git URL), without VCS metadata.
pub fn stage_source(
    runner: &dyn CommandRunner,
    source: &str,
    staging_dir: &Path,
) -> Result<StagedArtifact> {
    if staging_dir.exists() {
        tracing::debug!(dir = %staging_dir.display(), "removing previous staged content");
        std::fs::remove_dir_all(staging_dir)?;
    }
    if let Some(parent) = staging_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if is_remote(source) {
        clone(runner, source, staging_dir)?;
    } else {
        let src = Path::new(source);
        if !src.is_dir() {
            return Err(PipelineError::SourceUnavailable(format!(
                "{} is not a directory or git URL",
                source
            )));
        }
        copy_dir_all(src, staging_dir)?;
    }

    let git_dir = staging_dir.join(".git");
    if git_dir.exists() {
        std::fs::remove_dir_all(&git_dir)?;
    }

    let fingerprint = fingerprint(staging_dir)?;
    tracing::info!(source, %fingerprint, "staged application source");
    Ok(StagedArtifact {
        dir: staging_dir.to_path_buf(),
        fingerprint,
    })
}

fn clone(runner: &dyn CommandRunner, url: &str, dest: &Path) -> Result<()> {
    let inv = Invocation::new("git").args([
        "clone".to_string(),
        "--depth".to_string(),
        "1".to_string(),
        url.to_string(),
        dest.to_string_lossy().into_owned(),
    ]);
    let out = run_tolerant(runner, Stage::Staging, &inv)?;
    if !out.success() {
        return Err(PipelineError::SourceUnavailable(format!(
            "git clone {}: {}",
            url,
            crate::error::last_line(&out.stderr)
        )));
    }
    if !dest.is_dir() {
        return Err(PipelineError::SourceUnavailable(format!(
            "git clone {} produced no checkout",
            url
        )));
    }
    Ok(())
}

/// SHA-256 over sorted relative paths and file bytes.
pub fn fingerprint(root: &Path) -> Result<String> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for rel in &files {
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(root.join(rel))?);
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..12].to_string())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::ScriptedRunner;
    use crate::exec::CommandOutput;
    use tempfile::TempDir;

    fn app(root: &Path) -> PathBuf {
        let src = root.join("dvwa");
        std::fs::create_dir_all(src.join(".git")).unwrap();
        std::fs::create_dir_all(src.join("config")).unwrap();
        std::fs::write(src.join(".git/HEAD"), "ref: refs/heads/master").unwrap();
        std::fs::write(src.join("index.php"), "<?php echo 'hi';").unwrap();
        std::fs::write(src.join("config/config.inc.php"), "<?php").unwrap();
        std::fs::write(src.join("Dockerfile"), "FROM php:8-apache").unwrap();
        src
    }

    #[test]
    fn local_copy_strips_vcs_metadata_and_stale_files() {
        let tmp = TempDir::new().unwrap();
        let src = app(tmp.path());
        let staging = tmp.path().join("work/app");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("leftover.php"), "old").unwrap();

        let staged = stage_source(&ScriptedRunner::new(), src.to_str().unwrap(), &staging).unwrap();

        assert!(staged.dir.join("index.php").exists());
        assert!(staged.dir.join("config/config.inc.php").exists());
        assert!(!staged.dir.join(".git").exists());
        assert!(!staged.dir.join("leftover.php").exists());
        assert_eq!(staged.fingerprint.len(), 12);
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let tmp = TempDir::new().unwrap();
        let src = app(tmp.path());
        let staging = tmp.path().join("app");
        let runner = ScriptedRunner::new();

        let first = stage_source(&runner, src.to_str().unwrap(), &staging).unwrap();
        let second = stage_source(&runner, src.to_str().unwrap(), &staging).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);

        std::fs::write(src.join("index.php"), "<?php echo 'changed';").unwrap();
        let third = stage_source(&runner, src.to_str().unwrap(), &staging).unwrap();
        assert_ne!(first.fingerprint, third.fingerprint);
    }

    #[test]
    fn missing_local_source_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = stage_source(
            &ScriptedRunner::new(),
            tmp.path().join("nope").to_str().unwrap(),
            &tmp.path().join("app"),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[test]
    fn failed_clone_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on(
            "git clone",
            128,
            "",
            "fatal: unable to access 'https://github.com/digininja/DVWA.git/': Could not resolve host",
        );
        let err = stage_source(
            &runner,
            "https://github.com/digininja/DVWA.git",
            &tmp.path().join("app"),
        )
        .unwrap_err();
        match err {
            PipelineError::SourceUnavailable(msg) => {
                assert!(msg.contains("Could not resolve host"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(runner.calls()[0]
            .starts_with("git clone --depth 1 https://github.com/digininja/DVWA.git"));
    }

    /// Writes a checkout where `git clone` was asked to.
    struct CloningRunner;

    impl CommandRunner for CloningRunner {
        fn run(&self, inv: &Invocation) -> std::io::Result<CommandOutput> {
            let dest = PathBuf::from(inv.args.last().cloned().unwrap_or_default());
            std::fs::create_dir_all(dest.join(".git"))?;
            std::fs::write(dest.join("index.php"), "<?php")?;
            Ok(CommandOutput {
                status: Some(0),
                ..Default::default()
            })
        }
    }

    #[test]
    fn remote_clone_is_stripped() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("app");
        let staged =
            stage_source(&CloningRunner, "https://example.invalid/app.git", &staging).unwrap();
        assert!(staged.dir.join("index.php").exists());
        assert!(!staged.dir.join(".git").exists());
    }
}
