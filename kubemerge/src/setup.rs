//! The `setup` menu. One action per run, every action reports an [`Outcome`].

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use anyhow::Context as _;
use console::style;
use log::debug;
use tabular::{row, Table};

use crate::delegate::{Invocation, Runner};
use crate::project::{project_env, resolve_entry};
use crate::prompt::Prompt;
use crate::settings::{Settings, Store, DEFAULT_CTL_COMMAND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupAction {
    AddConfig,
    SetContext,
    SetNamespace,
    ManageConfigs,
    SetCtlCommand,
}

impl SetupAction {
    pub const ALL: [SetupAction; 5] = [
        SetupAction::AddConfig,
        SetupAction::SetContext,
        SetupAction::SetNamespace,
        SetupAction::ManageConfigs,
        SetupAction::SetCtlCommand,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SetupAction::AddConfig => "✏️   Add config",
            SetupAction::SetContext => "🏷   Set context",
            SetupAction::SetNamespace => "📂   Set namespace",
            SetupAction::ManageConfigs => "🔧   Manage configs",
            SetupAction::SetCtlCommand => "⚙️   Set ctl command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ConfigAdded(String),
    AlreadyAdded,
    FileMissing,
    ConfigRemoved(String),
    NotRegistered(String),
    NoConfigs,
    /// `use-context` was handed to the ctl command, which reports for itself.
    ContextRequested { context: String, exit_code: i32 },
    ContextUnavailable,
    NamespaceSet { context: String, namespace: String },
    NamespaceFailed,
    CtlCommandSet(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::AlreadyAdded
                | Outcome::FileMissing
                | Outcome::NotRegistered(_)
                | Outcome::ContextUnavailable
                | Outcome::NamespaceFailed
        )
    }

    /// Prints the outcome, red for failures and green otherwise.
    pub fn report(&self) {
        if let Outcome::ContextRequested { .. } = self {
            return;
        }

        if self.is_failure() {
            println!("{}", style(self).red().bright());
        } else {
            println!("{}", style(self).green().bright());
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::ConfigAdded(_) => write!(f, "Added config file!"),
            Outcome::AlreadyAdded => write!(f, "You've already added this config file!"),
            Outcome::FileMissing => write!(f, "The specified config file doesn't exist."),
            Outcome::ConfigRemoved(_) => write!(f, "Removed configuration!"),
            Outcome::NotRegistered(entry) => write!(f, "{entry} is not a registered config."),
            Outcome::NoConfigs => write!(f, "No configurations found."),
            Outcome::ContextRequested { context, .. } => write!(f, "Requested context {context}"),
            Outcome::ContextUnavailable => {
                write!(f, "Could not determine the current context, nothing was changed.")
            }
            Outcome::NamespaceSet { context, namespace } => {
                write!(f, "Namespace {namespace} set for context {context}!")
            }
            Outcome::NamespaceFailed => write!(f, "Could not set the namespace."),
            Outcome::CtlCommandSet(command) => write!(f, "Now using {command}!"),
        }
    }
}

pub struct Setup<S, P, R> {
    pub store: S,
    pub prompt: P,
    pub runner: R,
    home: OsString,
    base: PathBuf,
}

impl<S: Store, P: Prompt, R: Runner> Setup<S, P, R> {
    pub fn new(store: S, prompt: P, runner: R, home: OsString, base: PathBuf) -> Self {
        Self {
            store,
            prompt,
            runner,
            home,
            base,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<Outcome> {
        let labels: Vec<String> = SetupAction::ALL
            .iter()
            .map(|action| action.label().to_owned())
            .collect();
        let choice = self.prompt.select("What do you want to do?", &labels)?;
        let action = *SetupAction::ALL
            .get(choice)
            .context("Selection out of range")?;

        debug!("setup action {action:?}");
        self.perform(action)
    }

    pub fn perform(&mut self, action: SetupAction) -> anyhow::Result<Outcome> {
        match action {
            SetupAction::AddConfig => self.add_config(),
            SetupAction::SetContext => self.set_context(),
            SetupAction::SetNamespace => self.set_namespace(),
            SetupAction::ManageConfigs => self.manage_configs(),
            SetupAction::SetCtlCommand => self.set_ctl_command(),
        }
    }

    fn resolve(&self, entry: &str) -> anyhow::Result<PathBuf> {
        let cwd = std::env::current_dir().context("Reading current directory")?;
        Ok(resolve_entry(entry, &self.home, &cwd))
    }

    fn invocation(&self, settings: &Settings, args: Vec<String>) -> anyhow::Result<Invocation> {
        let env = project_env(&self.base, &settings.configs, &self.home)?;
        Ok(Invocation::new(settings.ctl_command.clone(), args, env))
    }

    // region: Configs
    pub fn add_config(&mut self) -> anyhow::Result<Outcome> {
        self.prompt.hint(
            "You can include $HOME to be replaced at run-time with the environment variable's value (usually your home directory).",
        );
        let path = self
            .prompt
            .input("Please specify the configuration file path", None)?;
        self.add_config_path(&path)
    }

    /// Registers `entry` verbatim. Duplicates are judged on the raw string.
    pub fn add_config_path(&mut self, entry: &str) -> anyhow::Result<Outcome> {
        let mut settings = self.store.load()?;
        if settings.configs.iter().any(|c| c == entry) {
            return Ok(Outcome::AlreadyAdded);
        }

        if !self.resolve(entry)?.is_file() {
            return Ok(Outcome::FileMissing);
        }

        settings.configs.push(entry.to_owned());
        self.store.save(&settings)?;
        Ok(Outcome::ConfigAdded(entry.to_owned()))
    }

    fn config_table(&self, configs: &[String]) -> anyhow::Result<Table> {
        let mut table = Table::new("{:<}  {:<}  {:<}");
        for entry in configs {
            let resolved = self.resolve(entry)?;
            let state = if resolved.is_file() { "✔" } else { "missing" };
            table.add_row(row!(entry, resolved.display(), state));
        }
        Ok(table)
    }

    pub fn manage_configs(&mut self) -> anyhow::Result<Outcome> {
        let settings = self.store.load()?;
        if settings.configs.is_empty() {
            return Ok(Outcome::NoConfigs);
        }

        let table = self.config_table(&settings.configs)?;
        self.prompt.hint(&table.to_string());

        let choice = self
            .prompt
            .select("Select a config to be removed", &settings.configs)?;
        let entry = settings
            .configs
            .get(choice)
            .context("Selection out of range")?;
        self.remove_config(entry)
    }

    /// Removes the first entry equal to `entry`.
    pub fn remove_config(&mut self, entry: &str) -> anyhow::Result<Outcome> {
        let mut settings = self.store.load()?;
        if settings.configs.is_empty() {
            return Ok(Outcome::NoConfigs);
        }

        let index = match settings.configs.iter().position(|c| c == entry) {
            Some(index) => index,
            None => return Ok(Outcome::NotRegistered(entry.to_owned())),
        };

        let removed = settings.configs.remove(index);
        self.store.save(&settings)?;
        Ok(Outcome::ConfigRemoved(removed))
    }
    // endregion

    // region: Context
    /// `config current-context`, or `None` if the query failed.
    pub fn current_context(&mut self) -> anyhow::Result<Option<String>> {
        let settings = self.store.load()?;
        let invocation =
            self.invocation(&settings, vec!["config".into(), "current-context".into()])?;
        let captured = self.runner.capture(&invocation);

        if captured.failed || captured.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(captured.stdout))
    }

    pub fn set_context(&mut self) -> anyhow::Result<Outcome> {
        let current = self.current_context()?;
        let context = self
            .prompt
            .input("Enter the context name", current.as_deref())?;

        let settings = self.store.load()?;
        let invocation = self.invocation(
            &settings,
            vec!["config".into(), "use-context".into(), context.clone()],
        )?;
        let exit_code = self.runner.stream(&invocation)?;

        Ok(Outcome::ContextRequested { context, exit_code })
    }

    pub fn set_namespace(&mut self) -> anyhow::Result<Outcome> {
        let context = match self.current_context()? {
            Some(context) => context,
            None => return Ok(Outcome::ContextUnavailable),
        };

        let namespace = self.prompt.input(
            &format!("Enter the namespace to use in {context}"),
            None,
        )?;

        let settings = self.store.load()?;
        let invocation = self.invocation(
            &settings,
            vec![
                "config".into(),
                "set-context".into(),
                context.clone(),
                format!("--namespace={namespace}"),
            ],
        )?;

        if self.runner.stream(&invocation)? != 0 {
            return Ok(Outcome::NamespaceFailed);
        }
        Ok(Outcome::NamespaceSet { context, namespace })
    }
    // endregion

    // region: Ctl command
    pub fn set_ctl_command(&mut self) -> anyhow::Result<Outcome> {
        let settings = self.store.load()?;
        let command = self.prompt.input(
            &format!("Enter command to use ({DEFAULT_CTL_COMMAND} by default)"),
            Some(&settings.ctl_command),
        )?;
        self.store_ctl_command(&command)
    }

    /// Stores `command`; blank input falls back to the default binary.
    pub fn store_ctl_command(&mut self, command: &str) -> anyhow::Result<Outcome> {
        let command = match command.trim() {
            "" => DEFAULT_CTL_COMMAND,
            command => command,
        };

        let mut settings = self.store.load()?;
        settings.ctl_command = command.to_owned();
        self.store.save(&settings)?;
        Ok(Outcome::CtlCommandSet(settings.ctl_command))
    }
    // endregion
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::ffi::OsStr;
    use std::fs;

    use anyhow::Context as _;

    use super::*;
    use crate::delegate::Captured;
    use crate::settings::MemoryStore;

    #[derive(Default)]
    struct FakePrompt {
        selections: VecDeque<usize>,
        answers: VecDeque<String>,
        defaults: Vec<Option<String>>,
        hints: usize,
    }

    impl FakePrompt {
        fn answering(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        fn selecting(mut self, selections: &[usize]) -> Self {
            self.selections = selections.iter().copied().collect();
            self
        }
    }

    impl Prompt for FakePrompt {
        fn select(&mut self, _message: &str, items: &[String]) -> anyhow::Result<usize> {
            let choice = self.selections.pop_front().context("unexpected select")?;
            assert!(choice < items.len());
            Ok(choice)
        }

        fn input(&mut self, _message: &str, default: Option<&str>) -> anyhow::Result<String> {
            self.defaults.push(default.map(str::to_owned));
            let answer = self.answers.pop_front().context("unexpected input")?;
            Ok(match (answer.is_empty(), default) {
                (true, Some(default)) => default.to_owned(),
                _ => answer,
            })
        }

        fn hint(&mut self, _text: &str) {
            self.hints += 1;
        }
    }

    #[derive(Default)]
    struct FakeRunner {
        context: Option<String>,
        exit_code: i32,
        streamed: Vec<Invocation>,
        captured: Vec<Invocation>,
    }

    impl FakeRunner {
        fn with_context(context: &str) -> Self {
            Self {
                context: Some(context.to_owned()),
                ..Self::default()
            }
        }
    }

    impl Runner for FakeRunner {
        fn stream(&mut self, invocation: &Invocation) -> anyhow::Result<i32> {
            self.streamed.push(invocation.clone());
            Ok(self.exit_code)
        }

        fn capture(&mut self, invocation: &Invocation) -> Captured {
            self.captured.push(invocation.clone());
            match &self.context {
                Some(context) => Captured {
                    stdout: context.clone(),
                    failed: false,
                },
                None => Captured {
                    stdout: String::new(),
                    failed: true,
                },
            }
        }
    }

    fn setup(
        settings: Settings,
        prompt: FakePrompt,
        runner: FakeRunner,
    ) -> Setup<MemoryStore, FakePrompt, FakeRunner> {
        Setup::new(
            MemoryStore::new(settings),
            prompt,
            runner,
            "/home/u".into(),
            PathBuf::from("/home/u/.kube/config"),
        )
    }

    fn with_configs(configs: &[&str]) -> Settings {
        Settings {
            configs: configs.iter().map(|c| c.to_string()).collect(),
            ..Settings::default()
        }
    }

    fn args(invocation: &Invocation) -> Vec<&str> {
        invocation
            .args
            .iter()
            .map(|a| a.to_str().unwrap())
            .collect()
    }

    #[test]
    fn add_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.yaml");
        fs::write(&file, "").unwrap();
        let entry = file.to_str().unwrap();
        let mut setup = setup(
            Settings::default(),
            FakePrompt::answering(&[entry]),
            FakeRunner::default(),
        );

        let outcome = setup.add_config().unwrap();

        assert_eq!(outcome, Outcome::ConfigAdded(entry.to_owned()));
        assert_eq!(setup.store.settings.configs, vec![entry.to_owned()]);
        assert_eq!(setup.prompt.hints, 1);
    }

    #[test]
    fn add_keeps_home_token_unexpanded() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir(home.path().join("configs")).unwrap();
        fs::write(home.path().join("configs").join("a.yaml"), "").unwrap();
        let mut setup = Setup::new(
            MemoryStore::default(),
            FakePrompt::default(),
            FakeRunner::default(),
            home.path().as_os_str().to_owned(),
            PathBuf::from("/base"),
        );

        let outcome = setup.add_config_path("$HOME/configs/a.yaml").unwrap();

        assert_eq!(outcome, Outcome::ConfigAdded("$HOME/configs/a.yaml".into()));
        assert_eq!(setup.store.settings.configs, vec!["$HOME/configs/a.yaml"]);
    }

    #[test]
    fn add_duplicate_is_a_no_op() {
        let mut setup = setup(
            with_configs(&["/nope/a.yaml"]),
            FakePrompt::default(),
            FakeRunner::default(),
        );

        let outcome = setup.add_config_path("/nope/a.yaml").unwrap();

        assert_eq!(outcome, Outcome::AlreadyAdded);
        assert!(outcome.is_failure());
        assert_eq!(setup.store.settings.configs, vec!["/nope/a.yaml"]);
        assert_eq!(setup.store.saves, 0);
    }

    #[test]
    fn add_missing_file_is_a_no_op() {
        let mut setup = setup(Settings::default(), FakePrompt::default(), FakeRunner::default());

        let outcome = setup.add_config_path("/definitely/not/here.yaml").unwrap();

        assert_eq!(outcome, Outcome::FileMissing);
        assert!(setup.store.settings.configs.is_empty());
        assert_eq!(setup.store.saves, 0);
    }

    #[test]
    fn differently_spelled_paths_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "").unwrap();
        let plain = dir.path().join("a.yaml");
        let dotted = dir.path().join(".").join("a.yaml");
        let mut setup = setup(Settings::default(), FakePrompt::default(), FakeRunner::default());

        setup.add_config_path(plain.to_str().unwrap()).unwrap();
        let outcome = setup.add_config_path(dotted.to_str().unwrap()).unwrap();

        assert!(matches!(outcome, Outcome::ConfigAdded(_)));
        assert_eq!(setup.store.settings.configs.len(), 2);
    }

    #[test]
    fn remove_from_empty_registry() {
        let mut setup = setup(
            Settings::default(),
            FakePrompt::default().selecting(&[0]),
            FakeRunner::default(),
        );

        assert_eq!(setup.manage_configs().unwrap(), Outcome::NoConfigs);
        assert_eq!(setup.remove_config("/a").unwrap(), Outcome::NoConfigs);
        assert_eq!(setup.store.saves, 0);
        // never asked which one to remove
        assert_eq!(setup.prompt.selections.len(), 1);
    }

    #[test]
    fn manage_removes_selected_entry() {
        let mut setup = setup(
            with_configs(&["/a", "$HOME/b", "/c"]),
            FakePrompt::default().selecting(&[1]),
            FakeRunner::default(),
        );

        let outcome = setup.manage_configs().unwrap();

        assert_eq!(outcome, Outcome::ConfigRemoved("$HOME/b".into()));
        assert_eq!(setup.store.settings.configs, vec!["/a", "/c"]);
        assert_eq!(setup.prompt.hints, 1);
    }

    #[test]
    fn remove_matches_raw_string_only() {
        let mut setup = setup(
            with_configs(&["$HOME/b"]),
            FakePrompt::default(),
            FakeRunner::default(),
        );

        let outcome = setup.remove_config("/home/u/b").unwrap();

        assert_eq!(outcome, Outcome::NotRegistered("/home/u/b".into()));
        assert_eq!(setup.store.settings.configs, vec!["$HOME/b"]);
    }

    #[test]
    fn blank_ctl_command_resets_to_default() {
        let mut setup = setup(
            Settings {
                ctl_command: "oc".into(),
                configs: vec![],
            },
            FakePrompt::default(),
            FakeRunner::default(),
        );

        assert_eq!(
            setup.store_ctl_command("").unwrap(),
            Outcome::CtlCommandSet("kubectl".into())
        );
        assert_eq!(setup.store.settings.ctl_command, "kubectl");
    }

    #[test]
    fn blank_ctl_command_keeps_kubectl() {
        let mut setup = setup(Settings::default(), FakePrompt::default(), FakeRunner::default());

        setup.store_ctl_command("").unwrap();

        assert_eq!(setup.store.settings.ctl_command, "kubectl");
    }

    #[test]
    fn ctl_command_stored_verbatim() {
        let mut setup = setup(
            Settings::default(),
            FakePrompt::answering(&["microk8s kubectl"]),
            FakeRunner::default(),
        );

        let outcome = setup.set_ctl_command().unwrap();

        assert_eq!(outcome, Outcome::CtlCommandSet("microk8s kubectl".into()));
        assert_eq!(setup.store.settings.ctl_command, "microk8s kubectl");
        assert_eq!(setup.prompt.defaults, vec![Some("kubectl".to_owned())]);
    }

    #[test]
    fn set_context_defaults_to_current() {
        let mut setup = setup(
            with_configs(&["/extra.yaml"]),
            FakePrompt::answering(&[""]),
            FakeRunner::with_context("prod"),
        );

        let outcome = setup.set_context().unwrap();

        assert_eq!(
            outcome,
            Outcome::ContextRequested {
                context: "prod".into(),
                exit_code: 0
            }
        );
        assert_eq!(args(&setup.runner.captured[0]), ["config", "current-context"]);
        let used = &setup.runner.streamed[0];
        assert_eq!(used.command, "kubectl");
        assert_eq!(args(used), ["config", "use-context", "prod"]);
        assert_eq!(
            std::env::split_paths(used.env.get(OsStr::new("KUBECONFIG")).unwrap())
                .collect::<Vec<_>>(),
            vec![
                PathBuf::from("/home/u/.kube/config"),
                PathBuf::from("/extra.yaml")
            ]
        );
    }

    #[test]
    fn set_context_without_current_has_no_default() {
        let mut setup = setup(
            Settings::default(),
            FakePrompt::answering(&["dev"]),
            FakeRunner::default(),
        );

        setup.set_context().unwrap();

        assert_eq!(setup.prompt.defaults, vec![None]);
        assert_eq!(args(&setup.runner.streamed[0]), ["config", "use-context", "dev"]);
    }

    #[test]
    fn set_namespace_for_current_context() {
        let mut setup = setup(
            Settings {
                ctl_command: "oc".into(),
                configs: vec![],
            },
            FakePrompt::answering(&["team-a"]),
            FakeRunner::with_context("prod"),
        );

        let outcome = setup.set_namespace().unwrap();

        assert_eq!(
            outcome,
            Outcome::NamespaceSet {
                context: "prod".into(),
                namespace: "team-a".into()
            }
        );
        let invocation = &setup.runner.streamed[0];
        assert_eq!(invocation.command, "oc");
        assert_eq!(
            args(invocation),
            ["config", "set-context", "prod", "--namespace=team-a"]
        );
    }

    #[test]
    fn set_namespace_needs_a_context() {
        let mut setup = setup(Settings::default(), FakePrompt::default(), FakeRunner::default());

        assert_eq!(setup.set_namespace().unwrap(), Outcome::ContextUnavailable);
        assert!(setup.runner.streamed.is_empty());
        assert!(setup.prompt.defaults.is_empty());
    }

    #[test]
    fn set_namespace_reports_delegate_failure() {
        let mut runner = FakeRunner::with_context("prod");
        runner.exit_code = 1;
        let mut setup = setup(Settings::default(), FakePrompt::answering(&["x"]), runner);

        assert_eq!(setup.set_namespace().unwrap(), Outcome::NamespaceFailed);
    }

    #[test]
    fn run_dispatches_on_menu_choice() {
        let mut setup = setup(
            Settings::default(),
            FakePrompt::answering(&["k3s kubectl"]).selecting(&[4]),
            FakeRunner::default(),
        );

        let outcome = setup.run().unwrap();

        assert_eq!(outcome, Outcome::CtlCommandSet("k3s kubectl".into()));
    }

    #[test]
    fn menu_has_five_entries_in_order() {
        assert_eq!(
            SetupAction::ALL,
            [
                SetupAction::AddConfig,
                SetupAction::SetContext,
                SetupAction::SetNamespace,
                SetupAction::ManageConfigs,
                SetupAction::SetCtlCommand,
            ]
        );
    }
}
