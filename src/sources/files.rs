//! Directory loaders: plain text, HTML, PDF and ReadTheDocs exports.

use super::{LoadOutcome, Loader, RawSource, SourceKind};
use crate::chunking::{Document, META_KIND, META_PAGE, META_TITLE, META_TOTAL_PAGES};
use crate::error::{AifaqError, Result};
use crate::extract::{
    extract_html, extract_html_within, extract_pdf_pages, normalize_whitespace,
    DOCS_CONTENT_ROOTS,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

const HTML_EXTENSIONS: &[&str] = &["html", "htm"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// List files in `dir` in file-name order, keeping only the given extensions
/// (all files when `extensions` is empty). Hidden files are skipped.
pub(crate) fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let walker = if recursive {
        WalkDir::new(dir)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker.sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let matches = extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|want| e.eq_ignore_ascii_case(want)))
                .unwrap_or(false);
        if matches {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Read a plain-text file into a document. `None` when the file holds no text.
pub(crate) fn load_text_file(path: &Path, kind: SourceKind) -> Result<Option<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| AifaqError::Extraction {
        source_id: path.display().to_string(),
        message: e.to_string(),
    })?;
    let content = normalize_whitespace(&content);
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        Document::new(content, path.display().to_string()).with_meta(META_KIND, kind.to_string()),
    ))
}

/// Walk `dir` and run `load_one` on every matching file, isolating failures.
fn load_each<F>(kind: SourceKind, dir: &Path, extensions: &[&str], mut load_one: F) -> LoadOutcome
where
    F: FnMut(&Path) -> Result<Vec<Document>>,
{
    let mut outcome = LoadOutcome::default();
    let files = match collect_files(dir, extensions, true) {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot list {:?}: {}", dir, e);
            outcome
                .report
                .record_failure(&RawSource::new(kind, dir.display().to_string()), e);
            return outcome;
        }
    };

    for path in files {
        let raw = RawSource::new(kind, path.display().to_string());
        match load_one(path.as_path()) {
            Ok(docs) => {
                if docs.is_empty() {
                    debug!("{} has no extractable text", raw.locator);
                }
                outcome.report.record_success();
                outcome.documents.extend(docs);
            }
            Err(e) => {
                warn!("Skipping {}: {}", raw.locator, e);
                outcome.report.record_failure(&raw, e);
            }
        }
    }
    outcome
}

fn html_document(path: &Path, html: &str, roots: &[&str], kind: SourceKind) -> Option<Document> {
    let extracted = if roots.is_empty() {
        extract_html(html)
    } else {
        extract_html_within(html, roots)
    };
    if extracted.text.is_empty() {
        return None;
    }
    let mut doc = Document::new(extracted.text, path.display().to_string())
        .with_meta(META_KIND, kind.to_string());
    if let Some(title) = extracted.title {
        doc = doc.with_meta(META_TITLE, title);
    }
    Some(doc)
}

fn read_html(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Every file in the folder, read as UTF-8 text.
pub struct TextLoader {
    subdir: String,
}

impl TextLoader {
    pub fn new(subdir: &str) -> Self {
        Self {
            subdir: subdir.to_string(),
        }
    }
}

#[async_trait]
impl Loader for TextLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Text
    }

    #[instrument(skip(self), fields(kind = "text"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        load_each(
            SourceKind::Text,
            &scope_root.join(&self.subdir),
            &[],
            |path| Ok(load_text_file(path, SourceKind::Text)?.into_iter().collect()),
        )
    }
}

/// Standalone HTML files.
pub struct HtmlLoader {
    subdir: String,
}

impl HtmlLoader {
    pub fn new(subdir: &str) -> Self {
        Self {
            subdir: subdir.to_string(),
        }
    }
}

#[async_trait]
impl Loader for HtmlLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    #[instrument(skip(self), fields(kind = "html"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        load_each(
            SourceKind::Html,
            &scope_root.join(&self.subdir),
            HTML_EXTENSIONS,
            |path| {
                let html = read_html(path)?;
                Ok(html_document(path, &html, &[], SourceKind::Html)
                    .into_iter()
                    .collect())
            },
        )
    }
}

/// HTML trees exported from ReadTheDocs. Only the main content area is kept.
pub struct ReadTheDocsLoader {
    subdir: String,
}

impl ReadTheDocsLoader {
    pub fn new(subdir: &str) -> Self {
        Self {
            subdir: subdir.to_string(),
        }
    }
}

#[async_trait]
impl Loader for ReadTheDocsLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::ReadTheDocs
    }

    #[instrument(skip(self), fields(kind = "rtdocs"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        load_each(
            SourceKind::ReadTheDocs,
            &scope_root.join(&self.subdir),
            HTML_EXTENSIONS,
            |path| {
                let html = read_html(path)?;
                Ok(
                    html_document(path, &html, DOCS_CONTENT_ROOTS, SourceKind::ReadTheDocs)
                        .into_iter()
                        .collect(),
                )
            },
        )
    }
}

/// PDF files, one document per non-empty page.
pub struct PdfLoader {
    subdir: String,
}

impl PdfLoader {
    pub fn new(subdir: &str) -> Self {
        Self {
            subdir: subdir.to_string(),
        }
    }

    async fn load_pdf(path: PathBuf) -> Result<Vec<Document>> {
        let source_id = path.display().to_string();
        let bytes = tokio::fs::read(&path).await?;

        // pdf-extract can panic on malformed input; the blocking task contains it.
        let id = source_id.clone();
        let pages = tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes, &id))
            .await
            .map_err(|e| AifaqError::Extraction {
                source_id: source_id.clone(),
                message: format!("PDF parser crashed: {}", e),
            })??;

        let total_pages = pages.len();
        Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.is_empty())
            .map(|(page, text)| {
                Document::new(text, source_id.clone())
                    .with_meta(META_KIND, SourceKind::Pdf.to_string())
                    .with_meta(META_PAGE, page.to_string())
                    .with_meta(META_TOTAL_PAGES, total_pages.to_string())
            })
            .collect())
    }
}

#[async_trait]
impl Loader for PdfLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    #[instrument(skip(self), fields(kind = "pdf"))]
    async fn load(&self, scope_root: &Path) -> LoadOutcome {
        let dir = scope_root.join(&self.subdir);
        let mut outcome = LoadOutcome::default();

        let files = match collect_files(&dir, PDF_EXTENSIONS, true) {
            Ok(files) => files,
            Err(e) => {
                outcome
                    .report
                    .record_failure(&RawSource::new(SourceKind::Pdf, dir.display().to_string()), e);
                return outcome;
            }
        };

        for path in files {
            let raw = RawSource::new(SourceKind::Pdf, path.display().to_string());
            match Self::load_pdf(path).await {
                Ok(docs) => {
                    outcome.report.record_success();
                    outcome.documents.extend(docs);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", raw.locator, e);
                    outcome.report.record_failure(&raw, e);
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::META_SOURCE;

    /// Minimal PDF with one Helvetica text line per page; `""` makes a blank page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..pages.len())
                    .map(|i| format!("{} 0 R", 4 + 2 * i))
                    .collect::<Vec<_>>()
                    .join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = if text.is_empty() {
                String::new()
            } else {
                format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text)
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ));
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).into_bytes());
        }
        let xref = pdf.len();
        pdf.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).into_bytes());
        for offset in offsets {
            pdf.extend(format!("{:010} 00000 n \n", offset).into_bytes());
        }
        pdf.extend(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .into_bytes(),
        );
        pdf
    }

    #[tokio::test]
    async fn test_text_loader_reads_every_file_sorted_and_skips_empty() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("text_files");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("b.txt"), "Second   file.").unwrap();
        std::fs::write(dir.join("a.md"), "First file.\n\n\n\nMore.").unwrap();
        std::fs::write(dir.join("data.csv"), "a,b").unwrap();
        std::fs::write(dir.join("empty.txt"), "   \n").unwrap();
        std::fs::write(dir.join("logo.bin"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        std::fs::write(dir.join("nested/c.txt"), "Nested file.").unwrap();

        let outcome = TextLoader::new("text_files").load(root.path()).await;
        let contents: Vec<_> = outcome.documents.iter().map(|d| d.content.as_str()).collect();

        assert_eq!(contents, vec!["First file.\n\nMore.", "Second file.", "a,b", "Nested file."]);
        assert_eq!(outcome.report.succeeded, 5);
        assert_eq!(outcome.report.failed.len(), 1);
        assert!(outcome.report.failed[0].locator.ends_with("logo.bin"));
        assert_eq!(outcome.documents[0].metadata.get(META_KIND).unwrap(), "text");
    }

    #[tokio::test]
    async fn test_missing_directory_yields_nothing() {
        let root = tempfile::tempdir().unwrap();
        let outcome = HtmlLoader::new("html_files").load(root.path()).await;
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.report, Default::default());
    }

    #[tokio::test]
    async fn test_html_loader_extracts_title() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("html_files");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("faq.html"),
            "<html><head><title>FAQ</title></head><body><nav>Menu</nav><p>Answers.</p></body></html>",
        )
        .unwrap();

        let outcome = HtmlLoader::new("html_files").load(root.path()).await;
        assert_eq!(outcome.documents.len(), 1);
        let doc = &outcome.documents[0];
        assert_eq!(doc.content, "Answers.");
        assert_eq!(doc.metadata.get(META_TITLE).unwrap(), "FAQ");
        assert!(doc.metadata.get(META_SOURCE).unwrap().ends_with("faq.html"));
    }

    #[tokio::test]
    async fn test_rtdocs_loader_keeps_main_content() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("rtdocs_files/en/latest");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("index.html"),
            r#"<body><div class="wy-nav-side">Sidebar</div><div role="main"><h1>Guide</h1><p>Body.</p></div></body>"#,
        )
        .unwrap();

        let outcome = ReadTheDocsLoader::new("rtdocs_files").load(root.path()).await;
        assert_eq!(outcome.documents[0].content, "Guide\nBody.");
    }

    #[tokio::test]
    async fn test_malformed_pdf_is_isolated() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("pdf_files");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.pdf"), b"%PDF-1.4 garbage").unwrap();

        let outcome = PdfLoader::new("pdf_files").load(root.path()).await;
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(outcome.report.failed[0].kind, SourceKind::Pdf);
    }

    #[tokio::test]
    async fn test_pdf_yields_one_document_per_page() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("pdf_files");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("handbook.pdf"),
            pdf_with_pages(&["Admissions open in May", "", "Tuition is waived"]),
        )
        .unwrap();

        let outcome = PdfLoader::new("pdf_files").load(root.path()).await;
        assert!(outcome.report.failed.is_empty());
        assert_eq!(outcome.report.succeeded, 1);
        assert_eq!(outcome.documents.len(), 2);

        let first = &outcome.documents[0];
        assert!(first.content.contains("Admissions"));
        assert_eq!(first.metadata.get(META_PAGE).unwrap(), "0");
        assert_eq!(first.metadata.get(META_TOTAL_PAGES).unwrap(), "3");

        let last = &outcome.documents[1];
        assert!(last.content.contains("Tuition"));
        assert_eq!(last.metadata.get(META_PAGE).unwrap(), "2");
        assert!(last.metadata.get(META_SOURCE).unwrap().ends_with("handbook.pdf"));
    }
}
