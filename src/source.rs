//! Source document loading
//!
//! Resolves the intake form's answer (a transcript URL, a document URL, an
//! uploaded file or a local path) into plain text. Only plain-text formats are
//! handled here; PDF, DOCX and HTML extraction belong to a richer loader.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::article::ArticleRecord;

/// Why a source could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("No source document was provided")]
    Missing,

    #[error("Unsupported content type: {0}")]
    Unsupported(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source is not valid UTF-8 text")]
    Encoding,

    #[error("Source document is empty")]
    Empty,
}

/// Where the source document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Fetch over HTTP(S)
    Url(String),
    /// Read from the local filesystem
    Path(PathBuf),
    /// Bytes uploaded through a form, typed by their file name
    Upload { file_name: String, bytes: Vec<u8> },
}

impl SourceRef {
    /// Pick the source named by the intake fields of a record
    ///
    /// Priority: transcript URL, document URL, uploaded bytes, local path.
    pub fn from_record(record: &ArticleRecord) -> Result<Self, LoadError> {
        if let Some(url) = non_blank(record.transcript.as_deref()) {
            return Ok(SourceRef::Url(url.to_string()));
        }
        if let Some(url) = non_blank(record.url.as_deref()) {
            return Ok(SourceRef::Url(url.to_string()));
        }
        match (&record.raw, non_blank(record.file_name.as_deref())) {
            (Some(bytes), Some(name)) => Ok(SourceRef::Upload {
                file_name: name.to_string(),
                bytes: bytes.clone(),
            }),
            (Some(bytes), None) => Ok(SourceRef::Upload {
                file_name: String::from("upload.txt"),
                bytes: bytes.clone(),
            }),
            (None, Some(path)) => Ok(SourceRef::Path(PathBuf::from(path))),
            (None, None) => Err(LoadError::Missing),
        }
    }

    /// Short human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            SourceRef::Url(url) => url.clone(),
            SourceRef::Path(path) => path.display().to_string(),
            SourceRef::Upload { file_name, bytes } => {
                format!("upload {} ({} bytes)", file_name, bytes.len())
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Plain-text formats this crate understands
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "vtt", "srt"];

/// Whether a file name's extension is a supported text format
fn check_extension(name: &str) -> Result<(), LoadError> {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else if ext.is_empty() {
        Err(LoadError::Unsupported(format!("{} (no extension)", name)))
    } else {
        Err(LoadError::Unsupported(ext))
    }
}

/// Whether an HTTP content type is plain text
fn check_mime(mime: &str) -> Result<(), LoadError> {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
    match essence.as_str() {
        "text/plain" | "text/markdown" | "text/vtt" | "application/x-subrip" => Ok(()),
        _ => Err(LoadError::Unsupported(essence)),
    }
}

fn decode(bytes: Vec<u8>) -> Result<String, LoadError> {
    let text = String::from_utf8(bytes).map_err(|_| LoadError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
    if text.trim().is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(text)
}

/// Resolves a source reference into plain text
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, reference: &SourceRef) -> Result<String, LoadError>;
}

/// Loader for plain-text sources over HTTP or from disk
pub struct TextSourceLoader {
    client: reqwest::Client,
}

impl TextSourceLoader {
    /// Create a loader with the given fetch timeout
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Fetch {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, LoadError> {
        let fetch_error = |message: String| LoadError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match mime {
            Some(mime) => check_mime(&mime)?,
            None => check_extension(url.split(['?', '#']).next().unwrap_or(url))?,
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        decode(bytes.to_vec())
    }
}

#[async_trait]
impl SourceLoader for TextSourceLoader {
    async fn load(&self, reference: &SourceRef) -> Result<String, LoadError> {
        info!("Loading source from {}", reference.describe());

        let text = match reference {
            SourceRef::Url(url) => self.fetch(url).await?,
            SourceRef::Path(path) => {
                check_extension(&path.to_string_lossy())?;
                let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                decode(bytes)?
            }
            SourceRef::Upload { file_name, bytes } => {
                check_extension(file_name)?;
                decode(bytes.clone())?
            }
        };

        debug!("Loaded {} characters of source text", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> TextSourceLoader {
        TextSourceLoader::new(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_priority_prefers_transcript() {
        let record = ArticleRecord {
            transcript: Some("https://example.com/t.txt".to_string()),
            url: Some("https://example.com/other.txt".to_string()),
            file_name: Some("local.txt".to_string()),
            ..Default::default()
        };
        assert_eq!(
            SourceRef::from_record(&record).unwrap(),
            SourceRef::Url("https://example.com/t.txt".to_string())
        );
    }

    #[test]
    fn test_upload_beats_path() {
        let record = ArticleRecord {
            file_name: Some("minutes.txt".to_string()),
            raw: Some(b"minutes".to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            SourceRef::from_record(&record).unwrap(),
            SourceRef::Upload { .. }
        ));
    }

    #[test]
    fn test_missing_source() {
        let record = ArticleRecord {
            url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            SourceRef::from_record(&record),
            Err(LoadError::Missing)
        ));
    }

    #[test]
    fn test_mime_check() {
        assert!(check_mime("text/plain; charset=utf-8").is_ok());
        assert!(matches!(
            check_mime("text/html"),
            Err(LoadError::Unsupported(m)) if m == "text/html"
        ));
    }

    #[tokio::test]
    async fn test_load_upload() {
        let reference = SourceRef::Upload {
            file_name: "minutes.TXT".to_string(),
            bytes: "\u{feff}The council met.".as_bytes().to_vec(),
        };
        assert_eq!(loader().load(&reference).await.unwrap(), "The council met.");
    }

    #[tokio::test]
    async fn test_load_rejects_pdf_upload() {
        let reference = SourceRef::Upload {
            file_name: "minutes.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        };
        assert!(matches!(
            loader().load(&reference).await,
            Err(LoadError::Unsupported(ext)) if ext == "pdf"
        ));
    }

    #[tokio::test]
    async fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        std::fs::write(&path, "Speaker 0: we are gonna vote.").unwrap();

        let text = loader().load(&SourceRef::Path(path)).await.unwrap();
        assert!(text.contains("gonna vote"));
    }

    #[tokio::test]
    async fn test_load_missing_path() {
        let reference = SourceRef::Path(PathBuf::from("/definitely/not/here.txt"));
        assert!(matches!(
            loader().load(&reference).await,
            Err(LoadError::Read { .. })
        ));
    }

    #[test]
    fn test_load_empty_upload() {
        let reference = SourceRef::Upload {
            file_name: "blank.txt".to_string(),
            bytes: b"  \n".to_vec(),
        };
        let result = tokio_test::block_on(loader().load(&reference));
        assert!(matches!(result, Err(LoadError::Empty)));
    }
}
