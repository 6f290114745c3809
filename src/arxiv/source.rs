use log::info;
use reqwest::blocking::Client;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::config::Settings;
use crate::error::{AssistError, Result};
use crate::retry::retry_blocking;
use crate::USER_AGENT;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const PDF_MAGIC: &[u8] = b"%PDF";
/// Name given to a source that arrives as a single compressed TeX file.
const SINGLE_FILE_NAME: &str = "main.tex";

/// An extracted source archive. The files live as long as this value.
#[derive(Debug)]
pub struct PaperSource {
    pub id: String,
    _temp_dir: TempDir,
    root: PathBuf,
}

impl PaperSource {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub(crate) fn blocking_client() -> Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// Download the e-print archive of a paper.
pub fn download_source(settings: &Settings, paper_id: &str) -> Result<Vec<u8>> {
    let client = blocking_client()?;
    let url = format!("{}/e-print/{}", settings.endpoints.arxiv.trim_end_matches('/'), paper_id);

    let content = retry_blocking(&settings.retry, || {
        info!("Downloading TeX source from: {}", url);
        let response = client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssistError::Status {
                service: "arXiv".to_string(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(response.bytes()?.to_vec())
    })?;

    if content.is_empty() {
        return Err(AssistError::EmptySource(paper_id.to_string()));
    }
    Ok(content)
}

/// Download and extract a paper's source into a fresh temporary directory.
pub fn fetch_paper(settings: &Settings, paper_id: &str) -> Result<PaperSource> {
    let content = download_source(settings, paper_id)?;
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().to_path_buf();
    extract_archive(&content, &root)?;
    Ok(PaperSource {
        id: paper_id.to_string(),
        _temp_dir: temp_dir,
        root,
    })
}

/// Extract a source archive (ZIP, tar, gzip-compressed tar, or a single
/// gzip-compressed TeX file) into `output_dir`.
pub fn extract_archive(content: &[u8], output_dir: &Path) -> Result<()> {
    if let Ok(zip) = ZipArchive::new(Cursor::new(content)) {
        info!("Extracting ZIP archive");
        return extract_zip(zip, output_dir);
    }

    if content.starts_with(&GZIP_MAGIC) {
        let mut decompressed = Vec::new();
        GzDecoder::new(content)
            .read_to_end(&mut decompressed)
            .map_err(|e| AssistError::Archive(format!("invalid gzip stream: {e}")))?;
        if is_tar(&decompressed) {
            info!("Extracting TAR.GZ archive");
            return unpack_tar(&decompressed, output_dir);
        }
        info!("Source is a single compressed file, writing it as {}", SINGLE_FILE_NAME);
        fs::create_dir_all(output_dir)?;
        fs::write(output_dir.join(SINGLE_FILE_NAME), decompressed)?;
        return Ok(());
    }

    if is_tar(content) {
        info!("Extracting TAR archive");
        return unpack_tar(content, output_dir);
    }

    if content.starts_with(PDF_MAGIC) {
        return Err(AssistError::Archive("received a PDF, no TeX source is available".to_string()));
    }
    Err(AssistError::Archive("unrecognised archive format".to_string()))
}

fn extract_zip(mut zip: ZipArchive<Cursor<&[u8]>>, output_dir: &Path) -> Result<()> {
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let outpath = match file.enclosed_name() {
            Some(path) => output_dir.join(path),
            None => continue,
        };

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&outpath)?;
            io::copy(&mut file, &mut outfile)?;
        }
    }
    Ok(())
}

/// POSIX and GNU tar headers carry `ustar` at offset 257.
fn is_tar(content: &[u8]) -> bool {
    content.len() > 262 && &content[257..262] == b"ustar"
}

fn unpack_tar(content: &[u8], output_dir: &Path) -> Result<()> {
    let mut archive = Archive::new(Cursor::new(content));
    archive
        .unpack(output_dir)
        .map_err(|e| AssistError::Archive(format!("failed to unpack tar archive: {e}")))
}
