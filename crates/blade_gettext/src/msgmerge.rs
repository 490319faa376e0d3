use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::MsgmergeConfig;
use crate::error::{GettextError, Result};
use crate::locale::{LocaleEnvironment, LocaleList, locale_dir};
use crate::process::{Invocation, ProcessRunner};
use crate::util::{copy_file, ensure_dir, remove_file};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub executable: PathBuf,
}

impl MergeConfig {
    #[must_use]
    pub fn from_config(config: &MsgmergeConfig) -> Self {
        Self {
            executable: config.executable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocaleMergeStatus {
    /// No catalog existed; the template was copied in.
    Seeded,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleMergeReport {
    pub locale: String,
    pub status: LocaleMergeStatus,
    pub path: PathBuf,
}

/// `<root>/<locale>/LC_MESSAGES/<textdomain>.po`
#[must_use]
pub fn translation_path(localization_root: &Path, locale: &str, textdomain: &str) -> PathBuf {
    locale_dir(localization_root, locale).join(format!("{textdomain}.po"))
}

/// Scratch copy of the existing catalog that msgmerge reads from.
#[must_use]
pub fn temp_path(translation: &Path) -> PathBuf {
    let mut name = translation
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    translation.with_file_name(name)
}

#[must_use]
pub fn build_merge_invocation(
    config: &MergeConfig,
    previous: &Path,
    template: &Path,
    result: &Path,
) -> Invocation {
    let mut output_file = OsString::from("--output-file=");
    output_file.push(result);

    let mut invocation = Invocation::new(&config.executable);
    invocation
        .arg(previous)
        .arg(template)
        .arg(output_file)
        .arg("--sort-output");
    invocation
}

/// Brings every non-base locale's catalog up to date with `template`.
///
/// Locales are handled in order. A failing merge aborts the remaining locales
/// but leaves the catalogs already processed in their updated state.
pub fn merge_all(
    template: &Path,
    locales: &LocaleList,
    localization_root: &Path,
    textdomain: &str,
    config: &MergeConfig,
    runner: &dyn ProcessRunner,
    environment: &dyn LocaleEnvironment,
) -> Result<Vec<LocaleMergeReport>> {
    let mut reports = Vec::with_capacity(locales.merge_targets().len());

    for locale in locales.merge_targets() {
        ensure_dir(&locale_dir(localization_root, locale))?;
        let result = translation_path(localization_root, locale, textdomain);

        if !result.exists() {
            copy_file(template, &result)?;
            tracing::info!(locale = %locale, path = %result.display(), "seeded catalog from template");
            reports.push(LocaleMergeReport {
                locale: locale.clone(),
                status: LocaleMergeStatus::Seeded,
                path: result,
            });
            continue;
        }

        let previous = temp_path(&result);
        copy_file(&result, &previous)?;

        let mut invocation = build_merge_invocation(config, &previous, template, &result);
        environment.apply(&mut invocation);
        let outcome = runner.run(&invocation)?;

        if !outcome.success() {
            tracing::warn!(
                locale = %locale,
                temp = %previous.display(),
                exit_code = outcome.exit_code,
                "msgmerge failed; scratch copy left in place"
            );
            return Err(GettextError::MergeFailed {
                locale: locale.clone(),
                exit_code: outcome.exit_code,
                exit_text: outcome.exit_text,
                command_line: outcome.command_line,
                stderr: outcome.stderr,
            });
        }

        remove_file(&previous)?;
        tracing::info!(locale = %locale, path = %result.display(), "merged catalog");
        reports.push(LocaleMergeReport {
            locale: locale.clone(),
            status: LocaleMergeStatus::Merged,
            path: result,
        });
    }

    Ok(reports)
}
