use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::error::{AssistError, Result};
use crate::latex::source::SourceTree;
use crate::latex::{BEGIN_DOCUMENT, DOCUMENT_CLASS};

/// File name that always wins entry-document selection.
pub const MAIN_FILE_NAME: &str = "main.tex";

/// One TeX file found under the extraction root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// `None` when the file could not be read.
    pub text: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: Some(text.into()),
        }
    }

    fn is_main_file(&self) -> bool {
        self.path.file_name().is_some_and(|name| name == MAIN_FILE_NAME)
    }

    /// +10 for a document class declaration, +10 for a document body marker.
    pub fn score(&self) -> u32 {
        let Some(text) = &self.text else {
            return 0;
        };
        let mut score = 0;
        if text.contains(DOCUMENT_CLASS) {
            score += 10;
        }
        if text.contains(BEGIN_DOCUMENT) {
            score += 10;
        }
        score
    }
}

/// The TeX files under an extraction root, in discovery order.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl DocumentSet {
    pub fn new(root: impl Into<PathBuf>, files: Vec<SourceFile>) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    /// Collect every `.tex` file below `root`.
    pub fn discover<T: SourceTree + ?Sized>(tree: &T, root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for path in tree.list_files(root)? {
            if !path.extension().is_some_and(|ext| ext == "tex") {
                continue;
            }
            let text = match tree.read_to_string(&path) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Could not read {:?}: {}", path, e);
                    None
                }
            };
            files.push(SourceFile { path, text });
        }
        info!("Found {} TeX files under {:?}", files.len(), root);
        Ok(Self::new(root, files))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Pick the compilation root of a document set.
///
/// A file named `main.tex` wins outright. Otherwise the highest [`SourceFile::score`]
/// wins, with ties going to the file discovered first. This is a heuristic: it
/// does not parse the sources.
pub fn select_entry(documents: &DocumentSet) -> Result<&SourceFile> {
    if let Some(main) = documents.files.iter().find(|f| f.is_main_file()) {
        info!("Found {}: {:?}", MAIN_FILE_NAME, main.path);
        return Ok(main);
    }

    let mut best: Option<(&SourceFile, u32)> = None;
    for file in &documents.files {
        let score = file.score();
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((file, score)),
        }
    }

    match best {
        Some((file, score)) => {
            info!("Selected entry document by score ({}): {:?}", score, file.path);
            Ok(file)
        }
        None => Err(AssistError::NoCandidate(documents.root.clone())),
    }
}
