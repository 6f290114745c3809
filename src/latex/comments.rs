use crate::latex::COMMENT_SIGIL;

/// Drop every line whose first non-whitespace character is `%`.
///
/// Lines end at `\n`, `\r\n` or a lone `\r`. They are kept or dropped whole: a
/// `%` later in a line, escaped or not, is left alone, and retained lines keep
/// their terminators byte for byte.
pub fn strip_comment_lines(text: &str) -> String {
    let mut kept = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(line_end(rest));
        if !is_comment_line(line) {
            kept.push_str(line);
        }
        rest = tail;
    }
    kept
}

pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT_SIGIL)
}

/// Byte offset just past the first line terminator, or the text length.
fn line_end(text: &str) -> usize {
    match text.find(['\n', '\r']) {
        Some(i) if text[i..].starts_with("\r\n") => i + 2,
        Some(i) => i + 1,
        None => text.len(),
    }
}
