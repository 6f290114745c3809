use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::arxiv::{fetch_paper, output_stem, parse_paper_id};
use crate::config::Settings;
use crate::convert::MarkdownConverter;
use crate::error::Result;
use crate::latex::{flatten, Diagnostic, FlattenOptions, FsTree};

/// Files written by [`arxiv_to_markdown`].
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub paper_id: String,
    pub tex_path: PathBuf,
    /// `None` when no converter was given.
    pub markdown_path: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Download a paper's TeX source, flatten it and convert it to Markdown.
///
/// `input` is an arXiv URL or id. Writes `<stem>.tex` and, when a converter is
/// given, `<stem>.md` into `output_dir`.
pub fn arxiv_to_markdown(
    settings: &Settings,
    input: &str,
    output_dir: &Path,
    converter: Option<&dyn MarkdownConverter>,
    options: &FlattenOptions,
) -> Result<ConversionOutput> {
    let paper_id = parse_paper_id(input)?;
    let source = fetch_paper(settings, &paper_id)?;
    let flattened = flatten(&FsTree, source.root(), options)?;
    info!(
        "Flattened {:?} with {} warning(s)",
        flattened.entry,
        flattened.diagnostics.len()
    );

    fs::create_dir_all(output_dir)?;
    let stem = output_stem(&paper_id);
    let tex_path = output_dir.join(format!("{stem}.tex"));
    fs::write(&tex_path, &flattened.text)?;
    info!("Saved flattened TeX to {:?}", tex_path);

    let markdown_path = match converter {
        Some(converter) => {
            let markdown = converter.convert(&flattened.text)?;
            let path = output_dir.join(format!("{stem}.md"));
            fs::write(&path, markdown)?;
            info!("Saved Markdown to {:?}", path);
            Some(path)
        }
        None => None,
    };

    Ok(ConversionOutput {
        paper_id,
        tex_path,
        markdown_path,
        diagnostics: flattened.diagnostics,
    })
}
