use crate::error::{Result, Stage};
use crate::exec::{run_step, CommandRunner, Invocation};
use std::path::{Path, PathBuf};

pub const KEY_NAME: &str = "lab-key";

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private: PathBuf,
    pub public: PathBuf,
}

/// Generate the lab keypair under `keys_dir` unless both halves already
/// exist. Reused across runs.
pub fn ensure_keypair(runner: &dyn CommandRunner, keys_dir: &Path) -> Result<KeyPair> {
    let private = keys_dir.join(KEY_NAME);
    let public = keys_dir.join(format!("{}.pub", KEY_NAME));
    if private.exists() && public.exists() {
        tracing::debug!(path = %public.display(), "reusing existing keypair");
        return Ok(KeyPair { private, public });
    }

    std::fs::create_dir_all(keys_dir)?;
    // ssh-keygen prompts before overwriting a leftover half.
    for stale in [&private, &public] {
        if stale.exists() {
            std::fs::remove_file(stale)?;
        }
    }
    let inv = Invocation::new("ssh-keygen").args([
        "-t".to_string(),
        "rsa".to_string(),
        "-b".to_string(),
        "4096".to_string(),
        "-N".to_string(),
        String::new(),
        "-q".to_string(),
        "-C".to_string(),
        "rangectl".to_string(),
        "-f".to_string(),
        private.to_string_lossy().into_owned(),
    ]);
    run_step(runner, Stage::Infrastructure, &inv)?;
    tracing::info!(path = %public.display(), "generated keypair");
    Ok(KeyPair { private, public })
}
