//! Persisted configuration (`gettext.toml`).
//!
//! Every field has a default, so an absent file or a sparse file behaves the
//! same as the stock configuration:
//!
//! ```toml
//! locales = ["en_US", "fr_FR"]
//! textdomain = "messages"
//!
//! [xgettext]
//! keywords = ["_", "gettext", "ngettext:1,2"]
//!
//! [msgmerge]
//! enabled = true
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GettextError, Result};

pub const CONFIG_FILE_NAME: &str = "gettext.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GettextConfig {
    /// First entry is the base locale; the template is written for it.
    #[serde(deserialize_with = "one_or_many")]
    pub locales: Vec<String>,
    pub textdomain: String,
    /// Localization root, relative to the application root.
    pub path: PathBuf,
    pub views: PathBuf,
    pub setlocale: bool,
    pub target: String,
    #[serde(deserialize_with = "one_or_many")]
    pub encoding: Vec<String>,
    pub cache: PathBuf,
    pub cleanup: bool,
    #[serde(deserialize_with = "comma_separated_paths")]
    pub additional: Vec<PathBuf>,
    pub compiler: CompilerConfig,
    pub xgettext: XgettextConfig,
    pub msgmerge: MsgmergeConfig,
}

impl Default for GettextConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en_US".to_string()],
            textdomain: "messages".to_string(),
            path: PathBuf::from("resources/lang"),
            views: PathBuf::from("resources/views"),
            setlocale: false,
            target: "LC_ALL".to_string(),
            encoding: ["utf8", "UTF8", "utf-8", "UTF-8"]
                .iter()
                .map(|value| (*value).to_string())
                .collect(),
            cache: PathBuf::from("storage/gettext"),
            cleanup: false,
            additional: Vec::new(),
            compiler: CompilerConfig::default(),
            xgettext: XgettextConfig::default(),
            msgmerge: MsgmergeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// File-name suffix identifying template sources.
    pub suffix: String,
    /// External compiler argv prefix; empty selects the built-in compiler.
    pub command: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            suffix: "blade.php".to_string(),
            command: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XgettextConfig {
    pub binary: String,
    pub binary_path: String,
    pub language: String,
    pub comments: String,
    pub force_po: bool,
    pub no_location: bool,
    pub from_code: String,
    pub author: String,
    pub package_name: String,
    pub package_version: String,
    pub email: String,
    pub keywords: Vec<String>,
}

impl Default for XgettextConfig {
    fn default() -> Self {
        Self {
            binary: "xgettext".to_string(),
            binary_path: String::new(),
            language: "PHP".to_string(),
            comments: "TRANSLATORS".to_string(),
            force_po: true,
            no_location: false,
            from_code: "UTF-8".to_string(),
            author: "Your Name".to_string(),
            package_name: "Your project".to_string(),
            package_version: "v1.0.0".to_string(),
            email: "you@yourdomain.tld".to_string(),
            keywords: [
                "_",
                "gettext",
                "dgettext:2",
                "dcgettext:2",
                "ngettext:1,2",
                "dngettext:2,3",
                "dcngettext:2,3",
                "_n:1,2",
            ]
            .iter()
            .map(|value| (*value).to_string())
            .collect(),
        }
    }
}

impl XgettextConfig {
    #[must_use]
    pub fn executable(&self) -> PathBuf {
        executable_location(&self.binary_path, &self.binary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgmergeConfig {
    pub enabled: bool,
    pub binary: String,
    pub binary_path: String,
}

impl Default for MsgmergeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "msgmerge".to_string(),
            binary_path: String::new(),
        }
    }
}

impl MsgmergeConfig {
    #[must_use]
    pub fn executable(&self) -> PathBuf {
        executable_location(&self.binary_path, &self.binary)
    }
}

/// Joins an optional directory with a binary name; an empty directory means "look in PATH".
#[must_use]
pub fn executable_location(binary_path: &str, binary: &str) -> PathBuf {
    let directory = binary_path.trim();
    if directory.is_empty() {
        PathBuf::from(binary)
    } else {
        Path::new(directory).join(binary)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

fn comma_separated_paths<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(split_path_list(one_or_many(deserializer)?))
}

/// Splits comma-joined directory lists and drops empty segments.
#[must_use]
pub fn split_path_list<I, S>(values: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flat_map(|value| {
            value
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(PathBuf::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

impl GettextConfig {
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| GettextError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GettextError::config(format!(
                "configuration file {} does not exist (run `blade-gettext init` to create one)",
                path.display()
            )));
        }
        let content =
            fs::read_to_string(path).map_err(GettextError::filesystem("read", path))?;
        Self::from_toml_str(&content, path)
    }

    /// Loads an explicitly named file, or `<app_root>/gettext.toml` when it exists,
    /// or falls back to the defaults.
    pub fn load_for(app_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                app_root.join(path)
            };
            return Self::load(&path);
        }

        let default_path = app_root.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            Self::load(&default_path)
        } else {
            tracing::info!(path = %default_path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks everything that can be checked before touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.locales.is_empty() {
            return Err(GettextError::config("at least one locale must be configured"));
        }

        let mut seen = BTreeSet::new();
        for locale in &self.locales {
            let trimmed = locale.trim();
            if trimmed.is_empty() {
                return Err(GettextError::config("locale identifiers cannot be empty"));
            }
            if trimmed.contains(['/', '\\']) {
                return Err(GettextError::config(format!(
                    "locale identifier {locale:?} cannot contain path separators"
                )));
            }
            if !seen.insert(trimmed) {
                return Err(GettextError::config(format!(
                    "locale {trimmed} is listed more than once"
                )));
            }
        }

        let textdomain = self.textdomain.trim();
        if textdomain.is_empty() || textdomain.contains(['/', '\\']) {
            return Err(GettextError::config(format!(
                "textdomain {:?} must be a non-empty file stem",
                self.textdomain
            )));
        }

        if self.compiler.suffix.trim().is_empty() {
            return Err(GettextError::config("compiler suffix cannot be empty"));
        }

        if self.xgettext.binary.trim().is_empty() {
            return Err(GettextError::config("xgettext binary cannot be empty"));
        }

        if self.msgmerge.enabled && self.msgmerge.binary.trim().is_empty() {
            return Err(GettextError::config("msgmerge binary cannot be empty"));
        }

        Ok(())
    }
}

/// Canonicalizes the application root so every derived path is absolute.
pub fn resolve_app_root(requested: Option<&Path>) -> Result<PathBuf> {
    let root = match requested {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    fs::canonicalize(&root).map_err(|_| {
        GettextError::config(format!(
            "application root {} does not exist",
            root.display()
        ))
    })
}
