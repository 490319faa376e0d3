//! Discovery of the files handed to the extractor.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{GettextError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A view still in template syntax; superseded by its compiled artifact.
    Template,
    /// Output of the template compiler, living in the cache directory.
    Compiled,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[must_use]
pub fn is_template(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Collects all regular files below `dir`, skipping dot-files and dot-directories.
/// A missing directory contributes nothing.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "source directory does not exist");
        return Ok(files);
    }
    collect_into(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_into(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(GettextError::filesystem("list directory", dir))?;
    for entry in entries {
        let entry = entry.map_err(GettextError::filesystem("list directory", dir))?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            collect_into(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Builds the ordered extractor input from the views, the compiled-template
/// cache and any additional directories.
#[derive(Debug, Clone)]
pub struct FileSetResolver {
    views_dir: PathBuf,
    cache_dir: PathBuf,
    additional_dirs: Vec<PathBuf>,
    template_suffix: String,
}

impl FileSetResolver {
    #[must_use]
    pub fn new(
        views_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        additional_dirs: Vec<PathBuf>,
        template_suffix: impl Into<String>,
    ) -> Self {
        Self {
            views_dir: views_dir.into(),
            cache_dir: cache_dir.into(),
            additional_dirs,
            template_suffix: template_suffix.into(),
        }
    }

    /// Every file under the views directory, classified as template or plain.
    pub fn views(&self) -> Result<Vec<SourceFile>> {
        Ok(collect_files(&self.views_dir)?
            .into_iter()
            .map(|path| {
                let kind = if is_template(&path, &self.template_suffix) {
                    SourceKind::Template
                } else {
                    SourceKind::Plain
                };
                SourceFile::new(path, kind)
            })
            .collect())
    }

    /// The template sources the compiler has to process.
    pub fn templates(&self) -> Result<Vec<SourceFile>> {
        Ok(self
            .views()?
            .into_iter()
            .filter(|file| file.kind == SourceKind::Template)
            .collect())
    }

    /// Final extractor input. Must run after compilation has filled the cache.
    pub fn resolve(&self) -> Result<Vec<SourceFile>> {
        let mut files = self
            .views()?
            .into_iter()
            .filter(|file| file.kind != SourceKind::Template)
            .collect::<Vec<_>>();

        files.extend(
            collect_files(&self.cache_dir)?
                .into_iter()
                .map(|path| SourceFile::new(path, SourceKind::Compiled)),
        );

        for dir in &self.additional_dirs {
            files.extend(
                collect_files(dir)?
                    .into_iter()
                    .map(|path| SourceFile::new(path, SourceKind::Plain)),
            );
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        if files.is_empty() {
            return Err(GettextError::NoSourcesFound {
                searched: self.searched_dirs(),
            });
        }

        tracing::debug!(count = files.len(), "resolved extractor input");
        Ok(files)
    }

    #[must_use]
    pub fn searched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.views_dir.clone(), self.cache_dir.clone()];
        dirs.extend(self.additional_dirs.iter().cloned());
        dirs
    }
}
