use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::doctor::{DoctorArgs, run_doctor};
use crate::error::Result;
use crate::extract::{ExtractArgs, run_extract};
use crate::init::{InitArgs, run_init};

#[derive(Debug, Parser)]
#[command(
    name = "blade-gettext",
    about = "Extract translatable strings from Blade views into gettext catalogs",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Application root; relative configuration paths resolve against it.
    #[arg(long = "app-root", global = true)]
    pub app_root: Option<PathBuf>,

    /// Configuration file (default: <app-root>/gettext.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile views, extract the template and merge it into every locale.
    Extract(ExtractArgs),

    /// Check tools, directories and the locale plan without changing anything.
    Doctor(DoctorArgs),

    /// Write a default gettext.toml.
    Init(InitArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract(args) => run_extract(&cli.global, args),
        Commands::Doctor(args) => run_doctor(&cli.global, args),
        Commands::Init(args) => run_init(&cli.global, args),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use clap::Parser;
    use tempfile::tempdir;

    use crate::doctor::DoctorArgs;
    use crate::error::GettextError;
    use crate::extract::ExtractArgs;
    use crate::init::InitArgs;

    use super::{Cli, Commands, GlobalArgs, run};

    #[test]
    fn global_options_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "blade-gettext",
            "doctor",
            "--app-root",
            "/srv/app",
            "--config=custom.toml",
        ])
        .expect("parse");
        assert_eq!(cli.global.app_root, Some(PathBuf::from("/srv/app")));
        assert_eq!(cli.global.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Doctor(_)));
    }

    #[test]
    fn init_command_dispatches_and_writes_config() {
        let temp = tempdir().expect("tempdir");
        run(Cli {
            global: GlobalArgs {
                app_root: Some(temp.path().to_path_buf()),
                config: None,
            },
            command: Commands::Init(InitArgs::default()),
        })
        .expect("init");
        assert!(temp.path().join("gettext.toml").is_file());
    }

    #[test]
    fn extract_command_dispatches_no_sources_error() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("resources/views")).expect("views");

        let result = run(Cli {
            global: GlobalArgs {
                app_root: Some(temp.path().to_path_buf()),
                config: None,
            },
            command: Commands::Extract(ExtractArgs::default()),
        });

        match result.expect_err("empty views should fail") {
            GettextError::NoSourcesFound { searched } => assert_eq!(searched.len(), 2),
            other => panic!("expected NoSourcesFound, got {other}"),
        }
    }

    #[test]
    fn doctor_command_dispatches_missing_root_error() {
        let result = run(Cli {
            global: GlobalArgs {
                app_root: Some(PathBuf::from("/definitely/not/here/blade-gettext")),
                config: None,
            },
            command: Commands::Doctor(DoctorArgs::default()),
        });
        match result.expect_err("missing root") {
            GettextError::Config { message } => assert!(message.contains("does not exist")),
            other => panic!("expected Config error, got {other}"),
        }
    }
}
