use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{GettextError, Result};
use crate::process::Invocation;

/// Ordered locale identifiers. Position 0 is the base locale, whose catalog
/// is the template itself and never takes part in merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleList(Vec<String>);

impl LocaleList {
    pub fn new<I, S>(locales: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let locales = locales
            .into_iter()
            .map(|locale| locale.as_ref().trim().to_string())
            .collect::<Vec<_>>();

        if locales.is_empty() {
            return Err(GettextError::config("at least one locale must be configured"));
        }
        if locales.iter().any(String::is_empty) {
            return Err(GettextError::config("locale identifiers cannot be empty"));
        }
        for (index, locale) in locales.iter().enumerate() {
            if locales[..index].contains(locale) {
                return Err(GettextError::config(format!(
                    "locale {locale} is listed more than once"
                )));
            }
        }

        Ok(Self(locales))
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.0[0]
    }

    /// Every locale except the base one, in configured order.
    #[must_use]
    pub fn merge_targets(&self) -> &[String] {
        &self.0[1..]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// `<root>/<locale>/LC_MESSAGES`
#[must_use]
pub fn locale_dir(localization_root: &Path, locale: &str) -> PathBuf {
    localization_root.join(locale).join("LC_MESSAGES")
}

/// Locale names to try in order: one per preferred encoding, then the bare
/// locale for platforms that reject encoding suffixes.
#[must_use]
pub fn locale_candidates(locale: &str, encodings: &[String]) -> Vec<String> {
    let mut candidates = encodings
        .iter()
        .map(|encoding| encoding.trim())
        .filter(|encoding| !encoding.is_empty())
        .map(|encoding| format!("{locale}.{encoding}"))
        .collect::<Vec<_>>();
    candidates.push(locale.to_string());
    candidates
}

/// Decides which locale variables spawned gettext tools see.
pub trait LocaleEnvironment {
    fn apply(&self, invocation: &mut Invocation);
}

/// Leaves the child environment exactly as inherited.
#[derive(Debug, Clone, Copy, Default)]
pub struct InheritedLocale;

impl LocaleEnvironment for InheritedLocale {
    fn apply(&self, _invocation: &mut Invocation) {}
}

/// Pins the base locale for child processes without touching this process's
/// own environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLocaleEnvironment {
    language: String,
    preferred: String,
    target: Option<String>,
}

impl ChildLocaleEnvironment {
    #[must_use]
    pub fn new(locale: &str, encodings: &[String], target: &str) -> Self {
        let preferred = locale_candidates(locale, encodings)
            .into_iter()
            .next()
            .unwrap_or_else(|| locale.to_string());
        let target = target.trim();
        Self {
            language: locale.to_string(),
            preferred,
            target: (!target.is_empty()).then(|| target.to_string()),
        }
    }
}

impl LocaleEnvironment for ChildLocaleEnvironment {
    fn apply(&self, invocation: &mut Invocation) {
        if cfg!(windows) {
            return;
        }

        invocation.env("LANGUAGE", self.language.clone());
        invocation.env("LANG", self.preferred.clone());
        if let Some(target) = &self.target {
            invocation.env(target.clone(), self.preferred.clone());
        }
    }
}
