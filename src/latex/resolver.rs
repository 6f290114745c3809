use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{AssistError, Result};
use crate::latex::source::SourceTree;
use crate::latex::{Diagnostic, Diagnostics, INCLUDE_REGEX};

/// Upper bound on re-scan passes over one text.
pub const MAX_PASSES: usize = 64;

/// Extension tried when an inclusion names a file without one.
pub const DEFAULT_EXTENSION: &str = "tex";

/// Recursively replaces `\input{..}` and `\include{..}` with the text they name.
///
/// The set of files currently being expanded lives for one resolution only. A
/// file may be included any number of times, but never inside itself.
pub struct Resolver<'t, T: SourceTree + ?Sized> {
    tree: &'t T,
    strict_cycles: bool,
    active: HashSet<PathBuf>,
    diagnostics: Diagnostics,
}

impl<'t, T: SourceTree + ?Sized> Resolver<'t, T> {
    pub fn new(tree: &'t T) -> Self {
        Self {
            tree,
            strict_cycles: false,
            active: HashSet::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Fail with [`AssistError::CircularInclusion`] instead of dropping the directive.
    pub fn strict_cycles(mut self, strict: bool) -> Self {
        self.strict_cycles = strict;
        self
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_vec()
    }

    /// Resolve `text`, which was read from `origin`.
    ///
    /// `origin` counts as being expanded, so an inclusion that leads back to it
    /// is treated as circular. Relative names resolve against its directory.
    pub fn resolve_from(&mut self, origin: &Path, text: &str) -> Result<String> {
        let key = self.tree.canonical(origin);
        let base_dir = origin.parent().map(Path::to_path_buf).unwrap_or_default();
        let inserted = self.active.insert(key.clone());
        let result = self.resolve(text, &base_dir);
        if inserted {
            self.active.remove(&key);
        }
        result
    }

    /// Resolve `text` against `base_dir` until no directive is left.
    pub fn resolve(&mut self, text: &str, base_dir: &Path) -> Result<String> {
        let mut current = self.substitute_pass(text, base_dir)?;
        let mut passes = 1;
        while INCLUDE_REGEX.is_match(&current) {
            if passes >= MAX_PASSES {
                self.diagnostics.push(Diagnostic::PassLimit { passes });
                break;
            }
            current = self.substitute_pass(&current, base_dir)?;
            passes += 1;
        }
        Ok(current)
    }

    fn substitute_pass(&mut self, text: &str, base_dir: &Path) -> Result<String> {
        let mut result = String::with_capacity(text.len());
        let mut last_end = 0;
        for cap in INCLUDE_REGEX.captures_iter(text) {
            let (Some(directive), Some(argument)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            result.push_str(&text[last_end..directive.start()]);
            last_end = directive.end();

            let expanded = self.expand(directive.as_str(), argument.as_str().trim(), base_dir)?;
            result.push_str(&expanded);
        }
        result.push_str(&text[last_end..]);
        Ok(result)
    }

    fn expand(&mut self, directive: &str, argument: &str, base_dir: &Path) -> Result<String> {
        let Some(path) = self.locate(base_dir, argument) else {
            self.diagnostics.push(Diagnostic::UnresolvedInclusion {
                directive: directive.to_string(),
                base_dir: base_dir.to_path_buf(),
            });
            return Ok(String::new());
        };

        let key = self.tree.canonical(&path);
        if self.active.contains(&key) {
            if self.strict_cycles {
                return Err(AssistError::CircularInclusion(key));
            }
            self.diagnostics.push(Diagnostic::CircularInclusion { path: key });
            return Ok(String::new());
        }

        let content = match self.tree.read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                self.diagnostics.push(Diagnostic::UnreadableInclusion {
                    path,
                    reason: e.to_string(),
                });
                return Ok(String::new());
            }
        };

        debug!("Inlining {:?}", path);
        let nested_base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.active.insert(key.clone());
        let expanded = self.resolve(&content, &nested_base);
        self.active.remove(&key);
        expanded
    }

    /// Find the file an inclusion names, trying `<name>.tex` when `name` has no extension.
    pub fn locate(&self, base_dir: &Path, name: &str) -> Option<PathBuf> {
        let literal = base_dir.join(name);
        if self.tree.is_file(&literal) {
            return Some(literal);
        }
        if Path::new(name).extension().is_none() {
            let with_extension = base_dir.join(format!("{name}.{DEFAULT_EXTENSION}"));
            if self.tree.is_file(&with_extension) {
                return Some(with_extension);
            }
        }
        None
    }
}
