//! Template compilation into extractable PHP.
//!
//! The extractor cannot read Blade syntax, so every template source is compiled
//! into the cache directory first. The returned [`CompiledMapping`] remembers
//! which source each artifact came from so location comments can be pointed
//! back at the views the developer actually edits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{GettextError, Result};
use crate::files::{SourceFile, SourceKind};
use crate::process::{Invocation, ProcessRunner};
use crate::util::{ensure_dir, hex_encode, read_string, write_string};

/// `compiled artifact path -> template source path` for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledMapping {
    entries: BTreeMap<PathBuf, PathBuf>,
}

impl CompiledMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, compiled: impl Into<PathBuf>, source: impl Into<PathBuf>) {
        self.entries.insert(compiled.into(), source.into());
    }

    /// The source for `compiled`, or `compiled` itself when it was never compiled.
    #[must_use]
    pub fn resolve<'a>(&'a self, compiled: &'a Path) -> &'a Path {
        self.entries
            .get(compiled)
            .map_or(compiled, PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries
            .iter()
            .map(|(compiled, source)| (compiled.as_path(), source.as_path()))
    }
}

pub trait TemplateCompiler {
    /// Writes the compiled form of `source` to `artifact`.
    fn compile(&self, source: &Path, artifact: &Path) -> Result<()>;
}

/// Artifact location for a template source: `<output_dir>/<sha256(source)>.php`.
#[must_use]
pub fn artifact_location_for(source: &Path, output_dir: &Path) -> PathBuf {
    let digest = Sha256::digest(source.to_string_lossy().as_bytes());
    output_dir.join(format!("{}.php", hex_encode(digest.as_slice())))
}

/// Compiles every template among `sources` into `output_dir`.
/// The first compiler error aborts the whole batch.
pub fn compile_templates(
    compiler: &dyn TemplateCompiler,
    sources: &[SourceFile],
    output_dir: &Path,
) -> Result<CompiledMapping> {
    ensure_dir(output_dir)?;

    let mut mapping = CompiledMapping::new();
    for source in sources.iter().filter(|file| file.kind == SourceKind::Template) {
        let artifact = artifact_location_for(&source.path, output_dir);
        compiler.compile(&source.path, &artifact)?;
        tracing::debug!(
            source = %source.path.display(),
            artifact = %artifact.display(),
            "compiled template"
        );
        mapping.insert(artifact, source.path.clone());
    }
    Ok(mapping)
}

/// In-process compiler covering the Blade constructs that carry PHP
/// expressions. Output keeps the source's line structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct BladeCompiler;

impl TemplateCompiler for BladeCompiler {
    fn compile(&self, source: &Path, artifact: &Path) -> Result<()> {
        let content = read_string(source).map_err(|error| GettextError::Compilation {
            source_path: source.to_path_buf(),
            message: error.to_string(),
        })?;
        write_string(artifact, &compile_blade(&content))
    }
}

/// Delegates to an external program run as `<command...> <source> <artifact>`.
pub struct ExternalCompiler<'a> {
    command: Vec<String>,
    runner: &'a dyn ProcessRunner,
}

impl<'a> ExternalCompiler<'a> {
    #[must_use]
    pub fn new(command: Vec<String>, runner: &'a dyn ProcessRunner) -> Self {
        Self { command, runner }
    }
}

impl TemplateCompiler for ExternalCompiler<'_> {
    fn compile(&self, source: &Path, artifact: &Path) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(GettextError::config("compiler command cannot be empty"));
        };

        let mut invocation = Invocation::new(program);
        invocation.args(args).arg(source).arg(artifact);

        let outcome = self.runner.run(&invocation)?;
        if !outcome.success() {
            return Err(GettextError::Compilation {
                source_path: source.to_path_buf(),
                message: format!(
                    "{} exited with {} ({}){}",
                    outcome.command_line,
                    outcome.exit_code,
                    outcome.exit_text,
                    if outcome.stderr.trim().is_empty() {
                        String::new()
                    } else {
                        format!(": {}", outcome.stderr.trim())
                    }
                ),
            });
        }

        if !artifact.is_file() {
            return Err(GettextError::Compilation {
                source_path: source.to_path_buf(),
                message: format!("compiler did not produce {}", artifact.display()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    Comment,
    EscapedEcho,
    RawEcho,
    Echo,
    PhpBlock,
}

const OPENERS: [(&str, Construct); 5] = [
    ("{{--", Construct::Comment),
    ("@{{", Construct::EscapedEcho),
    ("{!!", Construct::RawEcho),
    ("{{", Construct::Echo),
    ("@php", Construct::PhpBlock),
];

fn next_construct(text: &str) -> Option<(usize, &'static str, Construct)> {
    OPENERS
        .iter()
        .filter_map(|(open, construct)| {
            let mut offset = 0;
            while let Some(found) = text[offset..].find(open) {
                let at = offset + found;
                if *construct != Construct::PhpBlock || is_php_directive(&text[at..]) {
                    return Some((at, *open, *construct));
                }
                offset = at + open.len();
            }
            None
        })
        .min_by_key(|(at, open, _)| (*at, std::cmp::Reverse(open.len())))
}

/// `@php` followed by a non-identifier character; excludes `@phpinfo` and friends.
fn is_php_directive(text: &str) -> bool {
    text["@php".len()..]
        .chars()
        .next()
        .is_none_or(|ch| !(ch.is_alphanumeric() || ch == '_'))
}

/// Rewrites Blade echo, comment and `@php` constructs into PHP. Newlines are
/// never added or removed, so line numbers in the artifact match the source.
#[must_use]
pub fn compile_blade(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    let mut rest = source;

    while let Some((at, open, construct)) = next_construct(rest) {
        out.push_str(&rest[..at]);
        let body_start = at + open.len();

        let close = match construct {
            Construct::Comment => "--}}",
            Construct::EscapedEcho => {
                out.push_str("{{");
                rest = &rest[body_start..];
                continue;
            }
            Construct::RawEcho => "!!}",
            Construct::Echo => "}}",
            Construct::PhpBlock => "@endphp",
        };

        let Some(length) = rest[body_start..].find(close) else {
            out.push_str(&rest[at..]);
            return out;
        };
        let body = &rest[body_start..body_start + length];

        match construct {
            Construct::Comment => {
                out.extend(body.chars().filter(|ch| *ch == '\n'));
            }
            Construct::RawEcho => {
                out.push_str("<?php echo ");
                out.push_str(body.trim());
                out.push_str("; ?>");
                push_line_breaks(&mut out, body);
            }
            Construct::Echo => {
                out.push_str("<?php echo e(");
                out.push_str(body.trim());
                out.push_str("); ?>");
                push_line_breaks(&mut out, body);
            }
            Construct::PhpBlock => {
                out.push_str("<?php");
                out.push_str(body);
                out.push_str("?>");
            }
            Construct::EscapedEcho => {}
        }

        rest = &rest[body_start + length + close.len()..];
    }

    out.push_str(rest);
    out
}

/// Re-adds the newlines trimmed off the edges of an echo body.
fn push_line_breaks(out: &mut String, body: &str) {
    let trimmed = body.trim();
    let inner_breaks = trimmed.matches('\n').count();
    let total_breaks = body.matches('\n').count();
    for _ in inner_breaks..total_breaks {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use crate::error::{GettextError, Result};
    use crate::files::{SourceFile, SourceKind};
    use crate::process::{Invocation, ProcessOutcome, ProcessRunner};

    use super::{
        BladeCompiler, CompiledMapping, ExternalCompiler, artifact_location_for, compile_blade,
        compile_templates,
    };

    #[test]
    fn mapping_resolves_known_paths_and_passes_unknown_through() {
        let mut mapping = CompiledMapping::new();
        mapping.insert("/cache/abc.php", "/app/resources/views/a.blade.php");

        assert_eq!(
            mapping.resolve(Path::new("/cache/abc.php")),
            Path::new("/app/resources/views/a.blade.php")
        );
        assert_eq!(
            mapping.resolve(Path::new("/app/lib/plain.php")),
            Path::new("/app/lib/plain.php")
        );
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn artifact_location_is_stable_and_unique_per_source() {
        let out = Path::new("/cache");
        let first = artifact_location_for(Path::new("/v/a.blade.php"), out);
        let again = artifact_location_for(Path::new("/v/a.blade.php"), out);
        let other = artifact_location_for(Path::new("/v/b.blade.php"), out);

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.parent(), Some(out));
        let name = first.file_name().and_then(|n| n.to_str()).expect("file name");
        assert_eq!(name.len(), 64 + ".php".len());
        assert!(name.ends_with(".php"));
    }

    #[test]
    fn echo_becomes_php_echo() {
        assert_eq!(
            compile_blade("<h1>{{ _('Hello') }}</h1>"),
            "<h1><?php echo e(_('Hello')); ?></h1>"
        );
    }

    #[test]
    fn raw_echo_is_not_escaped() {
        assert_eq!(
            compile_blade("{!! ngettext('apple', 'apples', $n) !!}"),
            "<?php echo ngettext('apple', 'apples', $n); ?>"
        );
    }

    #[test]
    fn comments_are_removed_but_keep_their_lines() {
        let source = "a\n{{-- one\ntwo\n--}}\n{{ _('b') }}";
        let compiled = compile_blade(source);
        assert_eq!(compiled, "a\n\n\n\n<?php echo e(_('b')); ?>");
        assert_eq!(compiled.lines().count(), source.lines().count());
    }

    #[test]
    fn escaped_echo_stays_literal() {
        assert_eq!(compile_blade("@{{ name }}"), "{{ name }}");
    }

    #[test]
    fn php_blocks_open_and_close_php() {
        assert_eq!(
            compile_blade("@php\n$t = _('Title');\n@endphp"),
            "<?php\n$t = _('Title');\n?>"
        );
        assert_eq!(compile_blade("@phpinfo"), "@phpinfo");
    }

    #[test]
    fn multiline_echo_preserves_line_count() {
        let source = "{{\n  _('x')\n}}\nnext";
        let compiled = compile_blade(source);
        assert_eq!(compiled, "<?php echo e(_('x')); ?>\n\n\nnext");
        assert_eq!(compiled.matches('\n').count(), source.matches('\n').count());
    }

    #[test]
    fn unterminated_construct_is_copied_verbatim() {
        assert_eq!(compile_blade("a {{ b"), "a {{ b");
    }

    #[test]
    fn compile_templates_maps_artifacts_back_to_sources() {
        let temp = tempdir().expect("tempdir");
        let view = temp.path().join("views/greeting.blade.php");
        fs::create_dir_all(view.parent().expect("parent")).expect("views");
        fs::write(&view, "<p>{{ _('Hi') }}</p>\n").expect("write view");
        let plain = temp.path().join("views/plain.php");
        fs::write(&plain, "<?php _('x');").expect("write plain");
        let cache = temp.path().join("cache");

        let sources = vec![
            SourceFile::new(&view, SourceKind::Template),
            SourceFile::new(&plain, SourceKind::Plain),
        ];
        let mapping = compile_templates(&BladeCompiler, &sources, &cache).expect("compile");

        assert_eq!(mapping.len(), 1);
        let (artifact, source) = mapping.iter().next().expect("entry");
        assert_eq!(source, view.as_path());
        assert_eq!(
            fs::read_to_string(artifact).expect("artifact"),
            "<p><?php echo e(_('Hi')); ?></p>\n"
        );
    }

    #[test]
    fn blade_compiler_reports_unreadable_source() {
        let temp = tempdir().expect("tempdir");
        let sources = vec![SourceFile::new(
            temp.path().join("missing.blade.php"),
            SourceKind::Template,
        )];
        let error = compile_templates(&BladeCompiler, &sources, &temp.path().join("cache"))
            .expect_err("missing source");
        assert!(matches!(error, GettextError::Compilation { .. }));
    }

    struct FakeCompilerRunner {
        exit_code: i32,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ProcessRunner for FakeCompilerRunner {
        fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome> {
            let args = invocation.arg_strings();
            if self.exit_code == 0
                && let Some(artifact) = args.last()
            {
                fs::write(PathBuf::from(artifact), "<?php _('x');").expect("write artifact");
            }
            self.calls.borrow_mut().push(args);
            Ok(ProcessOutcome::from_exit_code(invocation, self.exit_code, "boom"))
        }
    }

    #[test]
    fn external_compiler_passes_source_and_artifact() {
        let temp = tempdir().expect("tempdir");
        let runner = FakeCompilerRunner {
            exit_code: 0,
            calls: RefCell::new(Vec::new()),
        };
        let compiler = ExternalCompiler::new(
            vec!["php".to_string(), "artisan".to_string(), "blade:compile".to_string()],
            &runner,
        );
        let source = temp.path().join("a.blade.php");
        let sources = vec![SourceFile::new(&source, SourceKind::Template)];

        let mapping = compile_templates(&compiler, &sources, temp.path()).expect("compile");
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(&calls[0][..3], &["php", "artisan", "blade:compile"]);
        assert_eq!(calls[0][3], source.display().to_string());
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn external_compiler_failure_is_a_compilation_error() {
        let temp = tempdir().expect("tempdir");
        let runner = FakeCompilerRunner {
            exit_code: 255,
            calls: RefCell::new(Vec::new()),
        };
        let compiler = ExternalCompiler::new(vec!["php".to_string()], &runner);
        let sources = vec![SourceFile::new(
            temp.path().join("a.blade.php"),
            SourceKind::Template,
        )];

        match compile_templates(&compiler, &sources, temp.path()).expect_err("should fail") {
            GettextError::Compilation { message, .. } => {
                assert!(message.contains("255"));
                assert!(message.contains("boom"));
            }
            other => panic!("expected Compilation, got {other}"),
        }
    }
}
