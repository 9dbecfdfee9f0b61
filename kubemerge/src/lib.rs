pub mod delegate;
pub mod project;
pub mod prompt;
pub mod settings;
pub mod setup;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::bail;

pub use delegate::{Captured, Invocation, Runner, ShellRunner};
pub use project::{base_config_path, merged_kubeconfig, project_env, KUBECONFIG};
pub use prompt::{Prompt, Terminal};
pub use settings::{FileStore, Settings, Store, DEFAULT_CTL_COMMAND};
pub use setup::{Outcome, Setup, SetupAction};

/// Checks the `$HOME` value. Nothing works without it, so callers treat a miss
/// as fatal.
pub fn require_home(home: Option<OsString>) -> anyhow::Result<OsString> {
    match home {
        Some(home) if !home.is_empty() => Ok(home),
        _ => bail!("Please add $HOME to your environment variables."),
    }
}

pub fn kube_dir(home: impl AsRef<Path>) -> PathBuf {
    home.as_ref().join(".kube")
}

/// `${HOME}/.kube/config`
pub fn default_kubeconfig(home: impl AsRef<Path>) -> PathBuf {
    kube_dir(home).join("config")
}
