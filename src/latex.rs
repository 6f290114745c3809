//! Flattening of multi-file TeX sources into a single document.

pub mod body;
pub mod comments;
pub mod resolver;
pub mod selector;
pub mod source;

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use body::{extract_body, Body};
pub use comments::strip_comment_lines;
pub use resolver::Resolver;
pub use selector::{select_entry, DocumentSet, SourceFile};
pub use source::{FsTree, MemoryTree, SourceTree};

pub const DOCUMENT_CLASS: &str = "\\documentclass";
pub const BEGIN_DOCUMENT: &str = "\\begin{document}";
pub const END_DOCUMENT: &str = "\\end{document}";
pub const COMMENT_SIGIL: char = '%';

/// `\input{name}` or `\include{name}`; group 1 is the file name.
pub static INCLUDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:input|include)\{([^}]+)\}").expect("Invalid inclusion regex pattern")
});

/// A recoverable problem met while flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// No file matched an inclusion; it was replaced by nothing.
    UnresolvedInclusion { directive: String, base_dir: PathBuf },
    /// An inclusion pointed at a file that is already being expanded; it was replaced by nothing.
    CircularInclusion { path: PathBuf },
    /// The target exists but could not be read; it was replaced by nothing.
    UnreadableInclusion { path: PathBuf, reason: String },
    /// The entry document lacks body markers; the whole text was used.
    MissingBodyMarkers,
    /// Substitution kept producing new directives and was stopped.
    PassLimit { passes: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedInclusion { directive, base_dir } => {
                write!(f, "included file not found: {} (relative to {:?})", directive, base_dir)
            }
            Diagnostic::CircularInclusion { path } => write!(f, "circular inclusion of {:?}", path),
            Diagnostic::UnreadableInclusion { path, reason } => {
                write!(f, "could not read included file {:?}: {}", path, reason)
            }
            Diagnostic::MissingBodyMarkers => write!(
                f,
                "{} ... {} not found, using the full document",
                BEGIN_DOCUMENT, END_DOCUMENT
            ),
            Diagnostic::PassLimit { passes } => {
                write!(f, "inclusion directives still present after {} passes", passes)
            }
        }
    }
}

/// Ordered diagnostics; each one is logged as it is recorded.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.0.push(diagnostic);
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    /// Splice the flattened body back between the preamble and `\end{document}`.
    pub keep_preamble: bool,
    /// Treat a circular inclusion as an error.
    pub strict_cycles: bool,
}

/// Result of flattening a source tree.
#[derive(Debug, Clone)]
pub struct Flattened {
    pub entry: PathBuf,
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Select the entry document under `root` and flatten it.
pub fn flatten<T: SourceTree + ?Sized>(tree: &T, root: &Path, options: &FlattenOptions) -> Result<Flattened> {
    let documents = DocumentSet::discover(tree, root)?;
    let entry = select_entry(&documents)?;
    let text = match &entry.text {
        Some(text) => text.clone(),
        None => tree.read_to_string(&entry.path)?,
    };
    flatten_document(tree, &entry.path, &text, options)
}

/// Flatten `text`, the content of the entry document at `entry`.
///
/// Body extraction, then inclusion expansion, then comment-line removal.
pub fn flatten_document<T: SourceTree + ?Sized>(
    tree: &T,
    entry: &Path,
    text: &str,
    options: &FlattenOptions,
) -> Result<Flattened> {
    let mut diagnostics = Diagnostics::default();
    let body = extract_body(text);
    if !body.has_markers() {
        diagnostics.push(Diagnostic::MissingBodyMarkers);
    } else {
        info!("Extracted content between {} and {}", BEGIN_DOCUMENT, END_DOCUMENT);
    }

    let mut resolver = Resolver::new(tree).strict_cycles(options.strict_cycles);
    let inlined = resolver.resolve_from(entry, body.text)?;
    for diagnostic in resolver.into_diagnostics() {
        diagnostics.0.push(diagnostic);
    }

    let flattened = match (&body.span, options.keep_preamble) {
        (Some(span), true) => {
            let mut full = String::with_capacity(text.len() + inlined.len());
            full.push_str(&text[..span.start]);
            full.push_str(&inlined);
            full.push_str(&text[span.end..]);
            full
        }
        _ => inlined,
    };

    Ok(Flattened {
        entry: entry.to_path_buf(),
        text: strip_comment_lines(&flattened),
        diagnostics: diagnostics.into_vec(),
    })
}
