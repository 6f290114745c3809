use std::ops::Range;

use crate::latex::{BEGIN_DOCUMENT, END_DOCUMENT};

/// The substantive part of an entry document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body<'a> {
    pub text: &'a str,
    /// Byte range of `text` inside the full document; `None` when the markers
    /// were missing and the whole document is used.
    pub span: Option<Range<usize>>,
}

impl Body<'_> {
    pub fn has_markers(&self) -> bool {
        self.span.is_some()
    }
}

/// Text strictly between `\begin{document}` and the first `\end{document}` after it.
///
/// Falls back to the full text when either marker is absent.
pub fn extract_body(text: &str) -> Body<'_> {
    let markers = text.find(BEGIN_DOCUMENT).and_then(|begin| {
        let start = begin + BEGIN_DOCUMENT.len();
        text[start..]
            .find(END_DOCUMENT)
            .map(|offset| start..start + offset)
    });

    match markers {
        Some(span) => Body {
            text: &text[span.clone()],
            span: Some(span),
        },
        None => Body { text, span: None },
    }
}
