use arxiv_assist::error::AssistError;
use arxiv_assist::latex::{
    extract_body, flatten, select_entry, strip_comment_lines, DocumentSet, FlattenOptions, FsTree, SourceFile,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn document_set(files: Vec<SourceFile>) -> DocumentSet {
    DocumentSet::new("/paper", files)
}

#[test]
fn test_main_tex_wins_regardless_of_score() {
    let documents = document_set(vec![
        SourceFile::new("/paper/full.tex", "\\documentclass{article}\\begin{document}\\end{document}"),
        SourceFile::new("/paper/sub/main.tex", "nothing here"),
    ]);

    let entry = select_entry(&documents).unwrap();
    assert_eq!(entry.path, Path::new("/paper/sub/main.tex"));
}

#[test]
fn test_highest_score_wins_without_main_tex() {
    let documents = document_set(vec![
        SourceFile::new("/paper/macros.tex", "\\newcommand{\\R}{\\mathbb{R}}"),
        SourceFile::new("/paper/class_only.tex", "\\documentclass{article}"),
        SourceFile::new("/paper/paper.tex", "\\documentclass{article}\n\\begin{document}\n\\end{document}"),
    ]);

    let entry = select_entry(&documents).unwrap();
    assert_eq!(entry.path, Path::new("/paper/paper.tex"));
    assert_eq!(entry.score(), 20);
}

#[test]
fn test_ties_go_to_first_discovered() {
    let documents = document_set(vec![
        SourceFile::new("/paper/a.tex", "\\begin{document}"),
        SourceFile::new("/paper/b.tex", "\\documentclass{x}"),
        SourceFile::new("/paper/c.tex", "\\begin{document}"),
    ]);

    let entry = select_entry(&documents).unwrap();
    assert_eq!(entry.path, Path::new("/paper/a.tex"));

    let unscored = document_set(vec![
        SourceFile::new("/paper/first.tex", "plain"),
        SourceFile::new("/paper/second.tex", "plain"),
    ]);
    assert_eq!(select_entry(&unscored).unwrap().path, Path::new("/paper/first.tex"));
}

#[test]
fn test_unreadable_file_scores_zero() {
    let unreadable = SourceFile {
        path: "/paper/broken.tex".into(),
        text: None,
    };
    assert_eq!(unreadable.score(), 0);
}

#[test]
fn test_empty_document_set_has_no_candidate() {
    let documents = document_set(Vec::new());
    assert!(matches!(select_entry(&documents), Err(AssistError::NoCandidate(root)) if root == Path::new("/paper")));
}

#[test]
fn test_extract_body() {
    let body = extract_body("pre\\begin{document}BODY\\end{document}post\\end{document}");
    assert_eq!(body.text, "BODY");
    assert_eq!(body.span, Some(19..23));

    let no_end = extract_body("\\begin{document} unterminated");
    assert_eq!(no_end.text, "\\begin{document} unterminated");
    assert!(!no_end.has_markers());

    let reversed = extract_body("\\end{document} then \\begin{document}");
    assert!(reversed.span.is_none());
}

#[test]
fn test_strip_comment_lines() {
    let text = "keep\n  % indented comment\n\t%tab comment\nrate is 50\\% here\r\n% last";
    assert_eq!(strip_comment_lines(text), "keep\nrate is 50\\% here\r\n");
    assert_eq!(strip_comment_lines("a % trailing\nb"), "a % trailing\nb");
    assert_eq!(strip_comment_lines(""), "");
}

#[test]
fn test_strip_comment_lines_with_carriage_returns() {
    assert_eq!(strip_comment_lines("keep\r% comment\rmore\r"), "keep\rmore\r");
    assert_eq!(
        strip_comment_lines("a\r\n% dos\r\nb\r% mac\rc\n% unix\nd"),
        "a\r\nb\rc\nd"
    );
    assert_eq!(strip_comment_lines("%only\r"), "");
    assert_eq!(strip_comment_lines("\r\r\n\n"), "\r\r\n\n");
}

#[test]
fn test_discover_only_tex_files_in_name_order() {
    let dir = tempdir().unwrap();
    File::create(dir.path().join("b.tex")).unwrap();
    File::create(dir.path().join("a.tex")).unwrap();
    File::create(dir.path().join("refs.bbl")).unwrap();
    let sub_dir = dir.path().join("sections");
    fs::create_dir(&sub_dir).unwrap();
    File::create(sub_dir.join("intro.tex")).unwrap();

    let documents = DocumentSet::discover(&FsTree, dir.path()).unwrap();
    let names: Vec<_> = documents
        .files()
        .iter()
        .map(|f| f.path.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();

    assert_eq!(documents.len(), 3);
    assert!(names.contains(&Path::new("sections/intro.tex").to_path_buf()));
    assert!(names.iter().position(|p| p == Path::new("a.tex")) < names.iter().position(|p| p == Path::new("b.tex")));
}

#[test]
fn test_flatten_from_filesystem() {
    let dir = tempdir().unwrap();
    let mut paper = File::create(dir.path().join("paper.tex")).unwrap();
    write!(
        paper,
        "\\documentclass{{article}}\n\\begin{{document}}\nMain file content.\n\\input{{sections/intro}}\n\\end{{document}}\n"
    )
    .unwrap();
    File::create(dir.path().join("notes.tex")).unwrap();

    fs::create_dir(dir.path().join("sections")).unwrap();
    let mut intro = File::create(dir.path().join("sections/intro.tex")).unwrap();
    writeln!(intro, "% draft note").unwrap();
    writeln!(intro, "Included file content.").unwrap();

    let flattened = flatten(&FsTree, dir.path(), &FlattenOptions::default()).unwrap();

    assert!(flattened.entry.ends_with("paper.tex"));
    assert_eq!(flattened.text, "\nMain file content.\nIncluded file content.\n\n");
    assert!(flattened.diagnostics.is_empty());
}

#[test]
fn test_unlistable_root_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("never-extracted");

    let documents = DocumentSet::discover(&FsTree, &missing).unwrap();
    assert!(documents.is_empty());

    let result = flatten(&FsTree, &missing, &FlattenOptions::default());
    assert!(matches!(result, Err(AssistError::NoCandidate(root)) if root == missing));
}
