use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::json;

use crate::cli::GlobalArgs;
use crate::config::{CONFIG_FILE_NAME, GettextConfig, resolve_app_root};
use crate::error::{GettextError, Result};
use crate::util::{OutputIntegration, display_relative, output_for, write_string};

const HEADER: &str = "# blade-gettext configuration.\n\
# The first locale is the base locale; its catalog is the generated template.\n\n";

#[derive(Debug, Clone, Default, Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,

    /// Locales to write, base locale first (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub locales: Vec<String>,
}

#[must_use]
pub fn config_target(app_root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => app_root.join(path),
        None => app_root.join(CONFIG_FILE_NAME),
    }
}

/// Renders the stock configuration, optionally with a custom locale list.
pub fn render_default_config(locales: &[String]) -> Result<String> {
    let mut config = GettextConfig::default();
    if !locales.is_empty() {
        config.locales = locales.to_vec();
    }
    config.validate()?;
    Ok(format!("{HEADER}{}", config.to_toml()?))
}

pub fn write_default_config(target: &Path, args: &InitArgs) -> Result<()> {
    if target.exists() && !args.force {
        return Err(GettextError::config(format!(
            "{} already exists (pass --force to overwrite)",
            target.display()
        )));
    }
    let rendered = render_default_config(&args.locales)?;
    write_string(target, &rendered)
}

pub fn run_init(global: &GlobalArgs, args: InitArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let app_root = resolve_app_root(global.app_root.as_deref())?;
    let target = config_target(&app_root, global.config.as_deref());
    write_default_config(&target, &args)?;

    ui.success(&format!("wrote {}", display_relative(&app_root, &target)));
    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "status": "ok",
                "command": "init",
                "path": target,
            })
        );
    }
    Ok(())
}
