use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::XgettextConfig;
use crate::error::{GettextError, Result};
use crate::files::SourceFile;
use crate::locale::LocaleEnvironment;
use crate::process::{Invocation, ProcessOutcome, ProcessRunner};

/// One argument position of a keyword rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordArg {
    /// Argument carrying a msgid (first occurrence) or msgid_plural (second).
    Message(u32),
    /// `Nc`: argument carrying the message context.
    Context(u32),
    /// `Nt`: total number of arguments the call must have.
    Total(u32),
    /// `"text"`: extracted comment attached to every match.
    Comment(String),
}

/// A function name plus the positions of its translatable arguments,
/// e.g. `ngettext:1,2`. The original text is passed to the extractor verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    raw: String,
    function: String,
    args: Vec<KeywordArg>,
}

impl KeywordRule {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    #[must_use]
    pub fn args(&self) -> &[KeywordArg] {
        &self.args
    }

    fn message_positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            KeywordArg::Message(position) => Some(*position),
            _ => None,
        })
    }

    /// Position of the singular msgid; the extractor defaults to 1.
    #[must_use]
    pub fn singular(&self) -> u32 {
        self.message_positions().next().unwrap_or(1)
    }

    #[must_use]
    pub fn plural(&self) -> Option<u32> {
        self.message_positions().nth(1)
    }
}

impl fmt::Display for KeywordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for KeywordRule {
    type Err = GettextError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| GettextError::config(format!("invalid keyword rule {raw:?}: {reason}"));

        let trimmed = raw.trim();
        let (function, positions) = match trimmed.split_once(':') {
            Some((function, positions)) => (function, Some(positions)),
            None => (trimmed, None),
        };

        if function.is_empty() {
            return Err(invalid("missing function name"));
        }
        if function.chars().any(|ch| ch.is_whitespace() || ch == ',') {
            return Err(invalid("function name cannot contain whitespace or commas"));
        }

        let mut args = Vec::new();
        if let Some(positions) = positions {
            for item in split_positions(positions).map_err(invalid)? {
                args.push(parse_arg(item).map_err(invalid)?);
            }
        }

        let messages = args
            .iter()
            .filter(|arg| matches!(arg, KeywordArg::Message(_)))
            .count();
        if messages > 2 {
            return Err(invalid("at most a singular and a plural argument are allowed"));
        }
        let contexts = args
            .iter()
            .filter(|arg| matches!(arg, KeywordArg::Context(_)))
            .count();
        if contexts > 1 {
            return Err(invalid("at most one context argument is allowed"));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            function: function.to_string(),
            args,
        })
    }
}

/// Splits on commas that are not inside a quoted comment.
fn split_positions(positions: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (index, ch) in positions.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                items.push(&positions[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err("unterminated quoted comment");
    }
    items.push(&positions[start..]);
    Ok(items)
}

fn parse_arg(item: &str) -> std::result::Result<KeywordArg, &'static str> {
    let item = item.trim();
    if item.is_empty() {
        return Err("empty argument position");
    }
    if let Some(comment) = item.strip_prefix('"') {
        return comment
            .strip_suffix('"')
            .map(|text| KeywordArg::Comment(text.to_string()))
            .ok_or("malformed quoted comment");
    }

    let (digits, build): (&str, fn(u32) -> KeywordArg) = if let Some(n) = item.strip_suffix('c') {
        (n, KeywordArg::Context)
    } else if let Some(n) = item.strip_suffix('t') {
        (n, KeywordArg::Total)
    } else {
        (item, KeywordArg::Message)
    };

    match digits.parse::<u32>() {
        Ok(position) if position > 0 => Ok(build(position)),
        _ => Err("argument positions must be positive integers"),
    }
}

pub fn parse_keywords<I, S>(rules: I) -> Result<Vec<KeywordRule>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    rules
        .into_iter()
        .map(|rule| {
            let rule = rule.as_ref().parse::<KeywordRule>()?;
            tracing::debug!(
                function = rule.function(),
                singular = rule.singular(),
                plural = ?rule.plural(),
                context = rule.args().iter().any(|arg| matches!(arg, KeywordArg::Context(_))),
                "keyword rule"
            );
            Ok(rule)
        })
        .collect()
}

/// Immutable extractor settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub executable: PathBuf,
    pub output: PathBuf,
    pub language: String,
    pub comments: String,
    pub force_po: bool,
    pub no_location: bool,
    pub from_code: String,
    pub author: String,
    pub package_name: String,
    pub package_version: String,
    pub email: String,
    pub keywords: Vec<KeywordRule>,
}

impl ExtractionConfig {
    pub fn from_config(config: &XgettextConfig, output: PathBuf) -> Result<Self> {
        Ok(Self {
            executable: config.executable(),
            output,
            language: config.language.clone(),
            comments: config.comments.clone(),
            force_po: config.force_po,
            no_location: config.no_location,
            from_code: config.from_code.clone(),
            author: config.author.clone(),
            package_name: config.package_name.clone(),
            package_version: config.package_version.clone(),
            email: config.email.clone(),
            keywords: parse_keywords(&config.keywords)?,
        })
    }
}

fn push_valued(invocation: &mut Invocation, flag: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        invocation.arg(format!("{flag}={value}"));
    }
}

#[must_use]
pub fn build_invocation(files: &[SourceFile], config: &ExtractionConfig) -> Invocation {
    let mut invocation = Invocation::new(&config.executable);

    let mut output = std::ffi::OsString::from("--output=");
    output.push(&config.output);
    invocation.arg(output);
    invocation.arg(format!("--language={}", config.language));
    invocation.arg("--sort-output");

    push_valued(&mut invocation, "--add-comments", &config.comments);
    if config.force_po {
        invocation.arg("--force-po");
    }
    if config.no_location {
        invocation.arg("--no-location");
    }
    push_valued(&mut invocation, "--from-code", &config.from_code);
    push_valued(&mut invocation, "--copyright-holder", &config.author);
    push_valued(&mut invocation, "--package-name", &config.package_name);
    push_valued(&mut invocation, "--package-version", &config.package_version);
    push_valued(&mut invocation, "--msgid-bugs-address", &config.email);

    for keyword in &config.keywords {
        invocation.arg(format!("--keyword={}", keyword.as_str()));
    }

    invocation.args(files.iter().map(|file| file.path.as_os_str()));
    invocation
}

/// Runs the extractor over `files`, writing the template to `config.output`.
pub fn extract(
    files: &[SourceFile],
    config: &ExtractionConfig,
    runner: &dyn ProcessRunner,
    environment: &dyn LocaleEnvironment,
) -> Result<ProcessOutcome> {
    let mut invocation = build_invocation(files, config);
    environment.apply(&mut invocation);

    tracing::info!(
        files = files.len(),
        output = %config.output.display(),
        "running extractor"
    );

    let outcome = runner.run(&invocation)?;
    if !outcome.success() {
        return Err(GettextError::ExtractionFailed {
            exit_code: outcome.exit_code,
            exit_text: outcome.exit_text,
            command_line: outcome.command_line,
            stderr: outcome.stderr,
        });
    }
    Ok(outcome)
}
