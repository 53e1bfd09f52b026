//! CV loading for `.txt`, `.pdf` and `.docx` files.

use std::io::{Cursor, Read};
use std::path::Path;

use tracing::info;

use crate::retrieval::{Document, DocumentMetadata, RetrievalError};

/// Supported CV formats, resolved from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvFormat {
    Text,
    Pdf,
    Docx,
}

impl CvFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self, RetrievalError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => Err(RetrievalError::UnsupportedFormat(format!(".{ext}"))),
        }
    }
}

/// Loads a CV from a local file.
pub async fn load_cv(path: &Path) -> Result<Vec<Document>, RetrievalError> {
    let source = path.display().to_string();
    // Reject unsupported formats before touching the filesystem
    CvFormat::from_file_name(&source)?;

    info!("Loading CV from {source}...");
    let bytes = tokio::fs::read(path).await?;
    load_cv_bytes(&source, &bytes)
}

/// Loads a CV from raw bytes, using `file_name` to pick the format.
pub fn load_cv_bytes(file_name: &str, bytes: &[u8]) -> Result<Vec<Document>, RetrievalError> {
    let docs = match CvFormat::from_file_name(file_name)? {
        CvFormat::Text => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| RetrievalError::Encoding(file_name.to_string()))?;
            vec![Document::new(text, file_name)]
        }
        CvFormat::Pdf => load_pdf(file_name, bytes)?,
        CvFormat::Docx => vec![Document::new(extract_docx_text(bytes)?, file_name)],
    };

    if docs.iter().all(|d| d.page_content.trim().is_empty()) {
        return Err(RetrievalError::EmptyDocument(file_name.to_string()));
    }
    Ok(docs)
}

/// One document per non-blank page, numbered from zero.
fn load_pdf(file_name: &str, bytes: &[u8]) -> Result<Vec<Document>, RetrievalError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RetrievalError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, content)| !content.trim().is_empty())
        .map(|(page, content)| Document {
            page_content: content,
            metadata: DocumentMetadata {
                source: file_name.to_string(),
                page: Some(page),
            },
        })
        .collect())
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, RetrievalError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RetrievalError::Docx(format!("not a DOCX archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| RetrievalError::Docx(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| RetrievalError::Docx(e.to_string()))?;

    Ok(wordprocessing_xml_to_text(&xml))
}

/// Flattens WordprocessingML into plain text: `<w:t>` runs, one line per paragraph.
fn wordprocessing_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or_default();

        match name {
            "w:t" if !self_closing => {
                if let Some(close) = rest.find("</w:t>") {
                    out.push_str(&decode_entities(&rest[..close]));
                    rest = &rest[close + "</w:t>".len()..];
                }
            }
            "/w:p" | "w:br" | "w:cr" => out.push('\n'),
            "w:tab" => out.push('\t'),
            _ => {}
        }
    }

    out.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
