use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use serde_json::json;

use crate::cache;
use crate::cli::GlobalArgs;
use crate::compiler::{BladeCompiler, ExternalCompiler, TemplateCompiler, compile_templates};
use crate::config::{GettextConfig, resolve_app_root};
use crate::error::{GettextError, Result};
use crate::files::FileSetResolver;
use crate::locale::{ChildLocaleEnvironment, InheritedLocale, LocaleEnvironment, LocaleList};
use crate::locations;
use crate::msgmerge::{LocaleMergeReport, LocaleMergeStatus, MergeConfig, merge_all};
use crate::process::{ProcessRunner, SystemRunner};
use crate::util::{
    CliOutput, OutputIntegration, display_relative, ensure_dir, normalize_lexically, output_for,
    remove_file,
};
use crate::xgettext::{ExtractionConfig, extract};

/// Flags that override `gettext.toml` for a single run. Boolean flags accept
/// an explicit value (`--force-po=false`) so they can switch off a configured default.
#[derive(Debug, Clone, Default, Args)]
pub struct ExtractArgs {
    /// xgettext executable name.
    #[arg(long)]
    pub binary: Option<String>,

    /// Directory containing the gettext binaries.
    #[arg(long = "binary-path")]
    pub binary_path: Option<String>,

    /// Comment tag whose comments are copied into the template.
    #[arg(long)]
    pub comments: Option<String>,

    #[arg(
        long = "force-po",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub force_po: Option<bool>,

    #[arg(
        long = "no-location",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub no_location: Option<bool>,

    /// Compiled-template cache directory, relative to the app root.
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Extra source directories (repeatable, comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub additional: Vec<PathBuf>,

    /// Empty the cache after a successful run.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub cleanup: Option<bool>,

    /// Merge the template into every non-base locale.
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub msgmerge: Option<bool>,

    #[arg(long = "from-code")]
    pub from_code: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long = "package-name")]
    pub package_name: Option<String>,

    #[arg(long = "package-version")]
    pub package_version: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Keyword rule such as `ngettext:1,2` (repeatable; replaces the configured list).
    #[arg(long = "keywords", alias = "keyword")]
    pub keywords: Vec<String>,

    #[arg(long)]
    pub views: Option<PathBuf>,

    /// Locales, base locale first (comma-separated; replaces the configured list).
    #[arg(long, value_delimiter = ',')]
    pub locales: Vec<String>,

    #[arg(long)]
    pub textdomain: Option<String>,
}

impl GettextConfig {
    pub fn apply_extract_args(&mut self, args: &ExtractArgs) {
        if let Some(value) = &args.binary {
            self.xgettext.binary = value.clone();
        }
        if let Some(value) = &args.binary_path {
            self.xgettext.binary_path = value.clone();
            self.msgmerge.binary_path = value.clone();
        }
        if let Some(value) = &args.comments {
            self.xgettext.comments = value.clone();
        }
        if let Some(value) = args.force_po {
            self.xgettext.force_po = value;
        }
        if let Some(value) = args.no_location {
            self.xgettext.no_location = value;
        }
        if let Some(value) = &args.cache {
            self.cache = value.clone();
        }
        if !args.additional.is_empty() {
            self.additional = args.additional.clone();
        }
        if let Some(value) = args.cleanup {
            self.cleanup = value;
        }
        if let Some(value) = args.msgmerge {
            self.msgmerge.enabled = value;
        }
        if let Some(value) = &args.from_code {
            self.xgettext.from_code = value.clone();
        }
        if let Some(value) = &args.author {
            self.xgettext.author = value.clone();
        }
        if let Some(value) = &args.package_name {
            self.xgettext.package_name = value.clone();
        }
        if let Some(value) = &args.package_version {
            self.xgettext.package_version = value.clone();
        }
        if let Some(value) = &args.email {
            self.xgettext.email = value.clone();
        }
        if !args.keywords.is_empty() {
            self.xgettext.keywords = args.keywords.clone();
        }
        if let Some(value) = &args.views {
            self.views = value.clone();
        }
        if !args.locales.is_empty() {
            self.locales = args.locales.clone();
        }
        if let Some(value) = &args.textdomain {
            self.textdomain = value.clone();
        }
    }
}

/// Everything one run needs, resolved to absolute paths and validated
/// before any file is touched.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub app_root: PathBuf,
    pub views_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub additional_dirs: Vec<PathBuf>,
    pub localization_root: PathBuf,
    pub template_path: PathBuf,
    pub template_suffix: String,
    pub compiler_command: Vec<String>,
    pub locales: LocaleList,
    pub textdomain: String,
    pub cleanup: bool,
    pub extraction: ExtractionConfig,
    /// `None` when merging is disabled.
    pub merge: Option<MergeConfig>,
    pub locale_environment: Option<ChildLocaleEnvironment>,
}

fn under_root(app_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        app_root.join(path)
    }
}

/// Resolves the cache directory and refuses any location whose purge would
/// reach the application tree, the views, the catalogs or a source directory.
fn guard_cache_dir<'a>(
    app_root: &Path,
    configured: &Path,
    protected: impl IntoIterator<Item = &'a Path>,
) -> Result<PathBuf> {
    if configured.as_os_str().is_empty() {
        return Err(GettextError::config("cache directory cannot be empty"));
    }
    let cache_dir = normalize_lexically(&under_root(app_root, configured));
    for path in protected {
        if path.starts_with(&cache_dir) {
            return Err(GettextError::config(format!(
                "cache directory {} contains {}; its contents are deleted on every run",
                cache_dir.display(),
                path.display()
            )));
        }
    }
    Ok(cache_dir)
}

impl RunPlan {
    pub fn resolve(app_root: &Path, config: &GettextConfig) -> Result<Self> {
        config.validate()?;
        let locales = LocaleList::new(&config.locales)?;
        let textdomain = config.textdomain.trim().to_string();

        let localization_root = normalize_lexically(&under_root(app_root, &config.path));
        let template_path = localization_root.join(format!("{textdomain}.pot"));
        let extraction = ExtractionConfig::from_config(&config.xgettext, template_path.clone())?;

        let views_dir = normalize_lexically(&under_root(app_root, &config.views));
        let additional_dirs = config
            .additional
            .iter()
            .map(|dir| normalize_lexically(&under_root(app_root, dir)))
            .collect::<Vec<_>>();
        let cache_dir = guard_cache_dir(
            app_root,
            &config.cache,
            [app_root, views_dir.as_path(), localization_root.as_path()]
                .into_iter()
                .chain(additional_dirs.iter().map(PathBuf::as_path)),
        )?;

        let locale_environment = config.setlocale.then(|| {
            ChildLocaleEnvironment::new(locales.base(), &config.encoding, &config.target)
        });

        Ok(Self {
            app_root: app_root.to_path_buf(),
            views_dir,
            cache_dir,
            additional_dirs,
            localization_root,
            template_path,
            template_suffix: config.compiler.suffix.trim().to_string(),
            compiler_command: config.compiler.command.clone(),
            locales,
            textdomain,
            cleanup: config.cleanup,
            extraction,
            merge: config
                .msgmerge
                .enabled
                .then(|| MergeConfig::from_config(&config.msgmerge)),
            locale_environment,
        })
    }

    #[must_use]
    pub fn file_set(&self) -> FileSetResolver {
        FileSetResolver::new(
            &self.views_dir,
            &self.cache_dir,
            self.additional_dirs.clone(),
            self.template_suffix.clone(),
        )
    }

    #[must_use]
    pub fn environment(&self) -> &dyn LocaleEnvironment {
        match &self.locale_environment {
            Some(environment) => environment,
            None => &InheritedLocale,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub template: PathBuf,
    /// False when the extractor found no strings and `force_po` was off.
    pub template_written: bool,
    pub compiled_templates: usize,
    pub extracted_files: usize,
    pub locales: Vec<LocaleMergeReport>,
    pub cache_cleaned: bool,
}

/// Runs cache preparation, compilation, extraction, reference rewriting,
/// merging and the optional cache purge, stopping at the first failure.
pub fn run_pipeline(
    plan: &RunPlan,
    runner: &dyn ProcessRunner,
    ui: &CliOutput,
) -> Result<RunSummary> {
    cache::prepare(&plan.cache_dir)?;

    let file_set = plan.file_set();
    let templates = file_set.templates()?;

    let external;
    let compiler: &dyn TemplateCompiler = if plan.compiler_command.is_empty() {
        &BladeCompiler
    } else {
        external = ExternalCompiler::new(plan.compiler_command.clone(), runner);
        &external
    };
    let mapping = compile_templates(compiler, &templates, &plan.cache_dir)?;
    ui.info(&format!("compiled {} template(s)", mapping.len()));

    let files = file_set.resolve()?;
    ensure_dir(&plan.localization_root)?;
    // xgettext leaves an existing output untouched when it finds nothing.
    if plan.template_path.is_file() {
        remove_file(&plan.template_path)?;
    }

    extract(&files, &plan.extraction, runner, plan.environment())?;
    let template_label = display_relative(&plan.app_root, &plan.template_path);

    if !plan.template_path.is_file() {
        tracing::warn!(template = %plan.template_path.display(), "extractor produced no template");
        ui.warning(&format!(
            "no translatable strings found; {template_label} was not written"
        ));
        return Ok(RunSummary {
            template: plan.template_path.clone(),
            template_written: false,
            compiled_templates: mapping.len(),
            extracted_files: files.len(),
            locales: Vec::new(),
            cache_cleaned: false,
        });
    }

    locations::rewrite(&plan.template_path, &mapping, &plan.app_root)?;
    ui.success(&format!(
        "template written: {template_label} ({} file(s) scanned)",
        files.len()
    ));

    let locales = match &plan.merge {
        Some(merge) => merge_all(
            &plan.template_path,
            &plan.locales,
            &plan.localization_root,
            &plan.textdomain,
            merge,
            runner,
            plan.environment(),
        )?,
        None => {
            ui.info("msgmerge disabled; locale catalogs left untouched");
            Vec::new()
        }
    };
    for report in &locales {
        let verb = match report.status {
            LocaleMergeStatus::Seeded => "seeded",
            LocaleMergeStatus::Merged => "merged",
        };
        ui.success(&format!(
            "{verb} {} ({})",
            display_relative(&plan.app_root, &report.path),
            report.locale
        ));
    }

    if plan.cleanup {
        cache::cleanup(&plan.cache_dir)?;
        ui.info("compiled template cache purged");
    }

    Ok(RunSummary {
        template: plan.template_path.clone(),
        template_written: true,
        compiled_templates: mapping.len(),
        extracted_files: files.len(),
        locales,
        cache_cleaned: plan.cleanup,
    })
}

pub fn run_extract(global: &GlobalArgs, args: ExtractArgs) -> Result<()> {
    let integration = OutputIntegration::detect();
    let ui = output_for(&integration);

    let app_root = resolve_app_root(global.app_root.as_deref())?;
    let mut config = GettextConfig::load_for(&app_root, global.config.as_deref())?;
    config.apply_extract_args(&args);
    let plan = RunPlan::resolve(&app_root, &config)?;

    ui.rule(Some("blade-gettext extract"));
    ui.info(&format!("app_root={}", plan.app_root.display()));
    ui.info(&format!(
        "locales={} (base {})",
        plan.locales.as_slice().join(","),
        plan.locales.base()
    ));

    let summary = run_pipeline(&plan, &SystemRunner, &ui)?;

    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "status": "ok",
                "command": "extract",
                "app_root": plan.app_root,
                "summary": serde_json::to_value(&summary)?,
            })
        );
    }

    Ok(())
}
