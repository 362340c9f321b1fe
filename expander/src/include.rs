use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{ExpandError, InclusionError};
use crate::expand::{Expansion, Session};
use crate::evaluator::ScriptEvaluator;

impl<E: ScriptEvaluator> Session<E> {
    /// Where an include path points: `{format}` substituted, then joined onto
    /// the base directory. The including file's location plays no part.
    pub fn resolve_include(&self, raw: &str) -> PathBuf {
        let path = raw.trim().replace("{format}", &self.context.target_format);
        self.settings.base_dir().join(path)
    }

    /// Execute a script include in the session namespace, returning its output.
    pub(crate) fn include_script(
        &mut self,
        raw: &str,
        range: &Range<usize>,
        file_id: usize,
    ) -> Result<String, ExpandError> {
        let (path, id, source) = self.load(raw, range, file_id)?;
        tracing::debug!(path = %path.display(), "executing script include");
        self.evaluator
            .exec(&source, &mut self.namespace)
            .map_err(|err| {
                let span = err.span.clone().unwrap_or(0..source.len());
                ExpandError::new(err.kind, span, id)
                    .with_note(format!("included as `{}`", raw.trim()))
            })
    }

    /// Scan and expand a document include in the session namespace.
    pub(crate) fn include_document(
        &mut self,
        raw: &str,
        range: &Range<usize>,
        file_id: usize,
    ) -> Result<Expansion, ExpandError> {
        let path = self.resolve_include(raw);
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(_) => return Err(not_found(raw, &path, range, file_id)),
        };

        if self.include_stack.contains(&canonical) {
            let chain = self
                .include_stack
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect();
            return Err(ExpandError::new(InclusionError::Cycle { chain }, range.clone(), file_id));
        }

        let (_, id, source) = self.load(raw, range, file_id)?;
        tracing::debug!(path = %canonical.display(), depth = self.include_stack.len(), "expanding document include");
        self.include_stack.push(canonical);
        let result = self.expand_source(&source, 0, id);
        self.include_stack.pop();
        result
    }

    /// Read an include into the file database.
    fn load(
        &mut self,
        raw: &str,
        range: &Range<usize>,
        file_id: usize,
    ) -> Result<(PathBuf, usize, String), ExpandError> {
        let path = self.resolve_include(raw);
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(raw, &path, range, file_id));
            }
            Err(err) => {
                return Err(ExpandError::new(
                    InclusionError::Io {
                        path: path.display().to_string(),
                        message: err.to_string(),
                    },
                    range.clone(),
                    file_id,
                ));
            }
        };
        let id = self.files.add(path.display().to_string(), source.clone());
        Ok((path, id, source))
    }
}

fn not_found(raw: &str, path: &Path, range: &Range<usize>, file_id: usize) -> ExpandError {
    let (searched, nearby) = nearby_files(path);
    let mut err = ExpandError::new(
        InclusionError::NotFound {
            path: raw.trim().to_string(),
            searched: searched.clone(),
            nearby: nearby.clone(),
        },
        range.clone(),
        file_id,
    )
    .with_note(format!("resolved to `{}`", path.display()));

    if let Some(dir) = searched {
        err = if nearby.is_empty() {
            err.with_note(format!("`{}` is empty", dir.display()))
        } else {
            err.with_note(format!("files in `{}`: {}", dir.display(), nearby.join(", ")))
        };
    }
    err
}

/// Sorted entries of the nearest existing ancestor directory of `path`.
fn nearby_files(path: &Path) -> (Option<PathBuf>, Vec<String>) {
    let mut dir = path.parent();
    while let Some(candidate) = dir {
        let candidate = if candidate.as_os_str().is_empty() {
            Path::new(".")
        } else {
            candidate
        };
        if candidate.is_dir() {
            let mut names: Vec<String> = std::fs::read_dir(candidate)
                .into_iter()
                .flatten()
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            return (Some(candidate.to_path_buf()), names);
        }
        dir = candidate.parent();
    }
    (None, Vec::new())
}
