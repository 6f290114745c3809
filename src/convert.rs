//! TeX to Markdown conversion through an external tool.

use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{AssistError, Result};

/// Converts a TeX document into Markdown.
pub trait MarkdownConverter {
    fn convert(&self, tex: &str) -> Result<String>;
}

/// Runs `pandoc -f latex -t markdown --wrap=none`, document on stdin.
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Default for Pandoc {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
            extra_args: Vec::new(),
        }
    }
}

impl Pandoc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

impl MarkdownConverter for Pandoc {
    fn convert(&self, tex: &str) -> Result<String> {
        info!("Converting to Markdown with {:?}", self.program);
        let mut child = Command::new(&self.program)
            .args(["-f", "latex", "-t", "markdown", "--wrap=none"])
            .args(&self.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AssistError::Converter(format!("failed to run {:?}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AssistError::Converter("converter stdin unavailable".to_string()))?;
        let input = tex.to_string();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| AssistError::Converter("converter input thread panicked".to_string()))?;

        if !output.status.success() {
            return Err(AssistError::Converter(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
