//! Projection of the config registry into the delegate's `KUBECONFIG`.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use log::{debug, warn};

use crate::default_kubeconfig;

pub const KUBECONFIG: &str = "KUBECONFIG";

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

const HOME_TOKEN: &str = "$HOME";
const KUBECONFIG_FLAG: &str = "--kubeconfig";

fn substitute_home(entry: &str, home: &OsStr) -> OsString {
    let mut out = OsString::with_capacity(entry.len());
    for (i, part) in entry.split(HOME_TOKEN).enumerate() {
        if i > 0 {
            out.push(home);
        }
        out.push(part);
    }
    out
}

/// Lexically folds `.` and `..` away. Symlinks are not followed.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Expands `$HOME` in a registry entry and makes it absolute against `cwd`.
pub fn resolve_entry(entry: &str, home: &OsStr, cwd: &Path) -> PathBuf {
    normalize(&cwd.join(substitute_home(entry, home)))
}

pub fn resolve_entries<'a>(
    registry: &'a [String],
    home: &'a OsStr,
    cwd: &'a Path,
) -> impl Iterator<Item = PathBuf> + 'a {
    registry.iter().map(move |entry| resolve_entry(entry, home, cwd))
}

/// `base` first, then every registry entry in insertion order, joined with the
/// platform path-list separator. Segments are not checked for separators.
pub fn merged_kubeconfig(base: &Path, registry: &[String], home: &OsStr, cwd: &Path) -> OsString {
    let mut merged = base.as_os_str().to_owned();
    for path in resolve_entries(registry, home, cwd) {
        merged.push(PATH_LIST_SEPARATOR);
        merged.push(path);
    }
    merged
}

/// The current process environment with `KUBECONFIG` set to the merged value.
pub fn project_env(
    base: &Path,
    registry: &[String],
    home: &OsStr,
) -> anyhow::Result<HashMap<OsString, OsString>> {
    let cwd = std::env::current_dir().context("Reading current directory")?;

    for path in resolve_entries(registry, home, &cwd) {
        if !path.exists() {
            warn!("registered config {} does not exist", path.display());
        }
    }

    let merged = merged_kubeconfig(base, registry, home, &cwd);
    debug!("{KUBECONFIG}={}", merged.to_string_lossy());

    let mut env: HashMap<OsString, OsString> = std::env::vars_os().collect();
    env.insert(KUBECONFIG.into(), merged);
    Ok(env)
}

/// Picks the base config from `--kubeconfig` in the raw args, falling back to
/// `${HOME}/.kube/config`. Last occurrence wins and a bare `--` ends the scan.
pub fn base_config_path(args: &[OsString], home: &OsStr) -> PathBuf {
    let mut found: Option<OsString> = None;
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        let arg_str = match arg.to_str() {
            Some(s) => s,
            None => continue,
        };

        if arg_str == "--" {
            break;
        }

        if arg_str == KUBECONFIG_FLAG {
            found = args.next().cloned();
        } else if let Some(value) = arg_str
            .strip_prefix(KUBECONFIG_FLAG)
            .and_then(|rest| rest.strip_prefix('='))
        {
            found = Some(value.into());
        }
    }

    match found {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_kubeconfig(home),
    }
}
