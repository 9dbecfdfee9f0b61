use std::ffi::OsString;
use std::process;

use console::style;
use env_logger::Env;
use log::debug;

use kubemerge::{
    base_config_path, project_env, require_home, FileStore, Invocation, Prompt, Runner, Setup,
    ShellRunner, Store, Terminal,
};

const LOG_ENV: &str = "KMERGE_LOG";

/// Returns the process exit code.
fn run<S: Store, P: Prompt, R: Runner>(
    args: Vec<OsString>,
    home: Option<OsString>,
    mut store: S,
    prompt: P,
    mut runner: R,
) -> anyhow::Result<i32> {
    let home = match require_home(home) {
        Ok(home) => home,
        Err(e) => {
            println!("{}", style(e).red().bright());
            return Ok(1);
        }
    };

    let settings = store.load_or_init()?;
    let base = base_config_path(&args, &home);

    if args.first().map_or(false, |arg| arg == "setup") {
        let mut setup = Setup::new(store, prompt, runner, home, base);
        match setup.run() {
            Ok(outcome) => outcome.report(),
            Err(e) => println!("{}", style(format!("Setup aborted: {e:#}")).red().bright()),
        }
        return Ok(0);
    }

    let env = project_env(&base, &settings.configs, &home)?;
    debug!("forwarding {} args to {}", args.len(), settings.ctl_command);
    runner.stream(&Invocation::new(settings.ctl_command, args, env))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().filter_or(LOG_ENV, "warn")).init();

    let store = FileStore::for_package(env!("CARGO_PKG_NAME"))?;
    let code = run(
        std::env::args_os().skip(1).collect(),
        std::env::var_os("HOME"),
        store,
        Terminal::default(),
        ShellRunner,
    )?;
    process::exit(code);
}
