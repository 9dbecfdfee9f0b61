use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use log::debug;
use serde::*;

pub const DEFAULT_CTL_COMMAND: &str = "kubectl";

/// Overrides the settings file location.
pub const SETTINGS_ENV: &str = "KMERGE_SETTINGS";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ctl_command: String,
    /// Raw registry entries, `$HOME` left unexpanded.
    pub configs: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ctl_command: DEFAULT_CTL_COMMAND.to_owned(),
            configs: Vec::new(),
        }
    }
}

pub trait Store {
    fn load(&mut self) -> anyhow::Result<Settings>;
    fn save(&mut self, settings: &Settings) -> anyhow::Result<()>;

    /// Like [`Store::load`], but persists the defaults on first run.
    fn load_or_init(&mut self) -> anyhow::Result<Settings> {
        self.load()
    }
}

impl<S: Store + ?Sized> Store for &mut S {
    fn load(&mut self) -> anyhow::Result<Settings> {
        (**self).load()
    }

    fn save(&mut self, settings: &Settings) -> anyhow::Result<()> {
        (**self).save(settings)
    }

    fn load_or_init(&mut self) -> anyhow::Result<Settings> {
        (**self).load_or_init()
    }
}

/// Settings persisted as YAML, one file per package.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/<package>/settings.yaml`, unless `KMERGE_SETTINGS` says otherwise.
    pub fn for_package(package: &str) -> anyhow::Result<Self> {
        if let Some(path) = std::env::var_os(SETTINGS_ENV).filter(|p| !p.is_empty()) {
            return Ok(Self::new(path));
        }

        let config_dir = dirs::config_dir().context("Locating user config directory")?;
        Ok(Self::new(config_dir.join(package).join("settings.yaml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for FileStore {
    fn load(&mut self) -> anyhow::Result<Settings> {
        debug!("reading settings from {}", self.path.display());
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(e).context("Opening settings file"),
        };

        // An empty file deserializes to nothing rather than a mapping.
        if file.metadata().context("Reading settings file")?.len() == 0 {
            return Ok(Settings::default());
        }

        serde_yaml::from_reader(file).context("Parsing settings file")
    }

    fn load_or_init(&mut self) -> anyhow::Result<Settings> {
        if self.path.exists() {
            return self.load();
        }

        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }

    fn save(&mut self, settings: &Settings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Creating settings directory")?;
        }

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .context("Opening settings file")?;
        serde_yaml::to_writer(&mut file, settings).context("Writing settings file")?;
        file.flush().context("Writing settings file")?;
        file.sync_all().context("Writing settings file")?;
        drop(file);

        fs::rename(&tmp_path, &self.path).context("Replacing settings file")?;
        debug!("wrote settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub settings: Settings,
    pub saves: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings, saves: 0 }
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn load(&mut self) -> anyhow::Result<Settings> {
        Ok(self.settings.clone())
    }

    fn save(&mut self, settings: &Settings) -> anyhow::Result<()> {
        self.settings = settings.clone();
        self.saves += 1;
        Ok(())
    }
}
