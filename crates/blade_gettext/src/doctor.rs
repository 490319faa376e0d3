use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use serde_json::json;

use crate::cli::GlobalArgs;
use crate::config::{CONFIG_FILE_NAME, GettextConfig, resolve_app_root};
use crate::error::{GettextError, Result};
use crate::extract::RunPlan;
use crate::msgmerge::translation_path;
use crate::util::{CliOutput, OutputIntegration, command_exists, display_relative, output_for};

#[derive(Debug, Clone, Default, Args)]
pub struct DoctorArgs {
    /// Treat a missing views directory as an error.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCheck {
    pub command: String,
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalePlan {
    pub locale: String,
    pub catalog: PathBuf,
    /// `template`, `seed` or `merge`.
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub xgettext: ToolCheck,
    pub msgmerge: Option<ToolCheck>,
    pub views_dir: PathBuf,
    pub views_dir_exists: bool,
    pub locales: Vec<LocalePlan>,
}

fn check_tool(executable: &Path) -> ToolCheck {
    let command = executable.to_string_lossy().into_owned();
    ToolCheck {
        found: command_exists(&command),
        command,
    }
}

/// Collects the preflight facts for `plan` without running anything.
#[must_use]
pub fn diagnose(plan: &RunPlan) -> DoctorReport {
    let mut locales = vec![LocalePlan {
        locale: plan.locales.base().to_string(),
        catalog: plan.template_path.clone(),
        action: "template",
    }];
    for locale in plan.locales.merge_targets() {
        let catalog = translation_path(&plan.localization_root, locale, &plan.textdomain);
        let action = if catalog.is_file() { "merge" } else { "seed" };
        locales.push(LocalePlan {
            locale: locale.clone(),
            catalog,
            action,
        });
    }

    DoctorReport {
        xgettext: check_tool(&plan.extraction.executable),
        msgmerge: plan.merge.as_ref().map(|merge| check_tool(&merge.executable)),
        views_dir: plan.views_dir.clone(),
        views_dir_exists: plan.views_dir.is_dir(),
        locales,
    }
}

fn report_tool(check: &ToolCheck, ui: &CliOutput) -> Result<()> {
    if check.found {
        ui.success(&format!("command available: {}", check.command));
        Ok(())
    } else {
        ui.error(&format!("command missing: {}", check.command));
        Err(GettextError::MissingCommand {
            command: check.command.clone(),
        })
    }
}

pub fn run_doctor(global: &GlobalArgs, args: DoctorArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let app_root = resolve_app_root(global.app_root.as_deref())?;
    let config = GettextConfig::load_for(&app_root, global.config.as_deref())?;
    let plan = RunPlan::resolve(&app_root, &config)?;

    ui.rule(Some("blade-gettext doctor"));
    ui.info(&format!("app_root={}", app_root.display()));
    ui.info(&format!(
        "config={}",
        global.config.as_ref().map_or_else(
            || {
                let default_path = app_root.join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    default_path.display().to_string()
                } else {
                    "built-in defaults".to_string()
                }
            },
            |path| path.display().to_string()
        )
    ));

    ui.rule(Some("environment detection"));
    ui.info(&format!(
        "fastapi_output mode={} agent={} ci={} tty={}",
        integration.fastapi_mode,
        integration.fastapi_agent,
        integration.fastapi_ci,
        integration.fastapi_tty
    ));
    ui.info(&format!(
        "sqlmodel_console mode={} agent={}",
        integration.sqlmodel_mode, integration.sqlmodel_agent
    ));

    let report = diagnose(&plan);

    ui.rule(Some("gettext tools"));
    report_tool(&report.xgettext, &ui)?;
    match &report.msgmerge {
        Some(check) => report_tool(check, &ui)?,
        None => ui.info("msgmerge disabled; merge tool not required"),
    }

    let views_label = display_relative(&app_root, &report.views_dir);
    if report.views_dir_exists {
        ui.success(&format!("views directory: {views_label}"));
    } else if args.strict {
        ui.error(&format!("views directory missing: {views_label}"));
        return Err(GettextError::config(format!(
            "views directory {} does not exist",
            report.views_dir.display()
        )));
    } else {
        ui.warning(&format!("views directory missing: {views_label}"));
    }

    ui.rule(Some("locale plan"));
    for entry in &report.locales {
        ui.info(&format!(
            "{} -> {} ({})",
            entry.locale,
            display_relative(&app_root, &entry.catalog),
            entry.action
        ));
    }

    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "status": "ok",
                "command": "doctor",
                "app_root": app_root,
                "report": serde_json::to_value(&report)?,
                "integration": serde_json::to_value(&integration)?,
            })
        );
    } else {
        ui.success("doctor checks passed");
    }

    Ok(())
}
