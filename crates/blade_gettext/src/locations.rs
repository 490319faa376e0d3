//! Post-processing of `#:` reference comments in an extracted template.
//!
//! References to compiled artifacts are pointed back at the template they
//! came from, every path is made relative to the application root, and each
//! run of references in an entry header is sorted so the output does not
//! depend on filesystem traversal order.

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::compiler::CompiledMapping;
use crate::error::Result;
use crate::util::{read_string, write_string};

const REFERENCE_PREFIX: &str = "#:";

// gettext 0.20+ wraps file names containing spaces in Unicode isolates.
const ISOLATE_OPEN: char = '\u{2068}';
const ISOLATE_CLOSE: char = '\u{2069}';

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>.+):(?P<line>[0-9]+)$").expect("reference regex")
});

/// Rewrites the document at `document` in place.
pub fn rewrite(document: &Path, mapping: &CompiledMapping, app_root: &Path) -> Result<()> {
    let original = read_string(document)?;
    let rewritten = rewrite_document(&original, mapping, app_root);
    if rewritten != original {
        write_string(document, &rewritten)?;
        tracing::debug!(document = %document.display(), "rewrote reference comments");
    }
    Ok(())
}

#[must_use]
pub fn rewrite_document(content: &str, mapping: &CompiledMapping, app_root: &Path) -> String {
    let remapped = content
        .split('\n')
        .map(|line| remap_references(line, mapping, app_root))
        .collect::<Vec<_>>()
        .join("\n");
    sort_location_blocks(&remapped)
}

fn is_reference_line(line: &str) -> bool {
    line.starts_with(REFERENCE_PREFIX)
}

/// Remaps every `path:line` token of a `#:` line. Other lines are returned as-is.
#[must_use]
pub fn remap_references(line: &str, mapping: &CompiledMapping, app_root: &Path) -> String {
    let Some(body) = line.strip_prefix(REFERENCE_PREFIX) else {
        return line.to_string();
    };
    let body = body.trim_end_matches('\r');
    if body.trim().is_empty() {
        return line.to_string();
    }

    let tokens = split_references(body)
        .into_iter()
        .map(|token| remap_token(token, mapping, app_root))
        .collect::<Vec<_>>();

    let mut out = format!("{REFERENCE_PREFIX} {}", tokens.join(" "));
    if line.ends_with('\r') {
        out.push('\r');
    }
    out
}

/// Splits a reference line body on whitespace outside isolate marks.
fn split_references(body: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut isolated = false;
    for (index, ch) in body.char_indices() {
        match ch {
            ISOLATE_OPEN => {
                isolated = true;
                start.get_or_insert(index);
            }
            ISOLATE_CLOSE => isolated = false,
            ch if ch.is_whitespace() && !isolated => {
                if let Some(begin) = start.take() {
                    tokens.push(&body[begin..index]);
                }
            }
            _ => {
                start.get_or_insert(index);
            }
        }
    }
    if let Some(begin) = start {
        tokens.push(&body[begin..]);
    }
    tokens
}

fn remap_token(token: &str, mapping: &CompiledMapping, app_root: &Path) -> String {
    let (path, line) = if let Some((path, suffix)) = token
        .strip_prefix(ISOLATE_OPEN)
        .and_then(|rest| rest.split_once(ISOLATE_CLOSE))
    {
        match suffix {
            "" => (path, None),
            _ => match suffix.strip_prefix(':') {
                Some(line) if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) => {
                    (path, Some(line))
                }
                _ => return token.to_string(),
            },
        }
    } else if let Some(captures) = REFERENCE.captures(token) {
        (
            captures.name("path").map_or(token, |m| m.as_str()),
            captures.name("line").map(|m| m.as_str()),
        )
    } else {
        (token, None)
    };

    let mut rendered = remap_path(path, mapping, app_root);
    if rendered.contains(char::is_whitespace) {
        rendered = format!("{ISOLATE_OPEN}{rendered}{ISOLATE_CLOSE}");
    }
    match line {
        Some(line) => format!("{rendered}:{line}"),
        None => rendered,
    }
}

fn remap_path(path: &str, mapping: &CompiledMapping, app_root: &Path) -> String {
    relativize(mapping.resolve(Path::new(path)), app_root)
}

/// `path` relative to `app_root` with `/` separators; paths outside the root
/// are rendered unchanged.
#[must_use]
pub fn relativize(path: &Path, app_root: &Path) -> String {
    let Ok(relative) = path.strip_prefix(app_root) else {
        return path.to_string_lossy().into_owned();
    };

    let parts = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();

    if parts.is_empty() {
        path.to_string_lossy().into_owned()
    } else {
        parts.join("/")
    }
}

/// Sorts every run of consecutive `#:` lines that belongs to an entry header.
///
/// A header starts at the top of the document or after a blank line and ends
/// at the first line that is neither blank nor a comment. This is wider than
/// sorting only the runs that directly follow a blank line: a run at the very
/// start of the document, or one preceded by the entry's translator (`# `) or
/// extracted (`#.`) comments, is sorted as well.
#[must_use]
pub fn sort_location_blocks(content: &str) -> String {
    let lines = content.split('\n').collect::<Vec<_>>();
    let mut out = Vec::with_capacity(lines.len());
    let mut in_header = true;
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];

        if is_reference_line(line) {
            let start = index;
            while index < lines.len() && is_reference_line(lines[index]) {
                index += 1;
            }
            let mut block = lines[start..index].to_vec();
            if in_header {
                block.sort_unstable();
            }
            out.extend(block);
            continue;
        }

        if line.trim().is_empty() {
            in_header = true;
        } else if !line.starts_with('#') {
            in_header = false;
        }
        out.push(line);
        index += 1;
    }

    out.join("\n")
}
