//! Document Reader Tools
//!
//! Local document parsing for PDF, DOCX, and spreadsheets. Every reader
//! opens its output with a `Read document: <path>` header so insight
//! extraction can attribute findings to the file.

use std::path::Path;

use async_trait::async_trait;
use calamine::Reader;
use serde_json::Value;

use drafthorse_tools::{names, ResearchTool};

use crate::config::DocumentConfig;

/// Hard cap on document tool output
const MAX_DOC_OUTPUT_CHARS: usize = 100_000;

/// Maximum file size for document parsing (50MB)
const MAX_DOC_SIZE: u64 = 50 * 1024 * 1024;

/// Check file size against a limit
fn check_file_size(path: &Path, max_size: u64) -> Result<(), String> {
    let metadata =
        std::fs::metadata(path).map_err(|e| format!("Failed to read file metadata: {}", e))?;
    let size = metadata.len();
    if size > max_size {
        return Err(format!(
            "File too large: {:.1} MB (max {:.1} MB)",
            size as f64 / (1024.0 * 1024.0),
            max_size as f64 / (1024.0 * 1024.0)
        ));
    }
    Ok(())
}

/// Cap output at the document limit with a marker
fn cap_output(mut output: String) -> String {
    if output.chars().count() > MAX_DOC_OUTPUT_CHARS {
        output = output.chars().take(MAX_DOC_OUTPUT_CHARS).collect();
        output.push_str("\n\n... (output truncated)");
    }
    output
}

/// Parse a PDF file and extract text content, page by page.
pub fn parse_pdf(path: &Path) -> Result<String, String> {
    check_file_size(path, MAX_DOC_SIZE)?;

    let text = pdf_extract::extract_text(path)
        .map_err(|e| format!("Failed to extract PDF text: {}", e))?;

    // pdf-extract separates pages with form feeds
    let pages: Vec<&str> = text.split('\x0c').collect();

    let mut output = format!(
        "Read document: {}\nPDF with {} pages\n\n",
        path.display(),
        pages.len()
    );
    for (i, page) in pages.iter().enumerate() {
        let trimmed = page.trim();
        if !trimmed.is_empty() {
            output.push_str(&format!("--- Page {} ---\n{}\n\n", i + 1, trimmed));
        }
    }

    Ok(cap_output(output))
}

/// Parse a DOCX file by extracting text from the XML inside the ZIP archive.
pub fn parse_docx(path: &Path) -> Result<String, String> {
    check_file_size(path, MAX_DOC_SIZE)?;

    let file = std::fs::File::open(path).map_err(|e| format!("Failed to open DOCX: {}", e))?;

    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| format!("Failed to read DOCX as ZIP: {}", e))?;

    let mut doc_xml = String::new();
    {
        let mut doc_entry = archive
            .by_name("word/document.xml")
            .map_err(|_| "Invalid DOCX: missing word/document.xml".to_string())?;
        std::io::Read::read_to_string(&mut doc_entry, &mut doc_xml)
            .map_err(|e| format!("Failed to read document.xml: {}", e))?;
    }

    // Extract text from <w:t> elements, paragraph by paragraph
    let mut reader = quick_xml::Reader::from_str(&doc_xml);
    let mut output = format!("Read document: {}\n\n", path.display());
    let mut in_paragraph = false;
    let mut paragraph_text = String::new();
    let mut in_text_element = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(ref e))
            | Ok(quick_xml::events::Event::Empty(ref e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                if name == "p" {
                    in_paragraph = true;
                    paragraph_text.clear();
                } else if name == "t" {
                    in_text_element = true;
                }
            }
            Ok(quick_xml::events::Event::End(ref e)) => {
                let local_name = e.local_name();
                let name = std::str::from_utf8(local_name.as_ref()).unwrap_or("");
                if name == "p" {
                    if in_paragraph && !paragraph_text.is_empty() {
                        output.push_str(&paragraph_text);
                        output.push_str("\n\n");
                    }
                    in_paragraph = false;
                } else if name == "t" {
                    in_text_element = false;
                }
            }
            Ok(quick_xml::events::Event::Text(ref e)) => {
                if in_text_element {
                    if let Ok(text) = e.unescape() {
                        paragraph_text.push_str(&text);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(cap_output(output))
}

/// Preview a spreadsheet: bounded sheets, rows, and columns, rendered as
/// pipe-separated rows under a `Workbook:` header.
pub fn parse_xlsx(path: &Path, config: &DocumentConfig) -> Result<String, String> {
    check_file_size(path, MAX_DOC_SIZE)?;

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| format!("Failed to open spreadsheet: {}", e))?;

    let sheet_names: Vec<String> = workbook
        .sheet_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let shown_sheets = sheet_names.len().min(config.max_sheets);

    let workbook_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut output = format!(
        "Read document: {}\nWorkbook: {}\nSheets: {}{}\n\n",
        path.display(),
        workbook_name,
        sheet_names.join(", "),
        if sheet_names.len() > shown_sheets {
            format!(" (showing first {})", shown_sheets)
        } else {
            String::new()
        }
    );

    for sheet_name in sheet_names.iter().take(shown_sheets) {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(r) => r,
            Err(e) => {
                output.push_str(&format!("## Sheet: {} (error: {})\n\n", sheet_name, e));
                continue;
            }
        };

        output.push_str(&format!("## Sheet: {}\n", sheet_name));

        let mut shown_rows = 0;
        for row in range.rows().take(config.max_rows) {
            let cells: Vec<String> = row
                .iter()
                .take(config.max_cols)
                .map(|cell| cell.to_string())
                .collect();
            output.push_str(&cells.join(" | "));
            output.push('\n');
            shown_rows += 1;
        }

        if shown_rows == 0 {
            output.push_str("(empty sheet)\n");
        } else {
            let total_rows = range.rows().count();
            if total_rows > config.max_rows {
                output.push_str(&format!(
                    "... ({} more rows not shown)\n",
                    total_rows - config.max_rows
                ));
            }
        }
        output.push('\n');
    }

    Ok(cap_output(output))
}

/// The `read_document` tool: dispatches on file extension.
pub struct ReadDocumentTool {
    config: DocumentConfig,
}

impl ReadDocumentTool {
    /// Create the tool with the given reader limits
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }
}

fn path_arg(args: &Value) -> Result<&str, String> {
    args.get("path")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing 'path' argument".to_string())
}

#[async_trait]
impl ResearchTool for ReadDocumentTool {
    fn name(&self) -> &str {
        names::READ_DOCUMENT
    }

    fn description(&self) -> &str {
        "Read a local PDF, DOCX, or XLSX document. Arguments: {\"path\": \"/abs/path/report.pdf\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path_str = path_arg(&args)?;
        let path = Path::new(path_str);

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => parse_pdf(path),
            "docx" => parse_docx(path),
            "xlsx" | "xls" => parse_xlsx(path, &self.config),
            other => Err(format!(
                "Unsupported document extension: '{}'. Supported: pdf, docx, xlsx",
                other
            )),
        }
    }
}

/// The `read_xlsx` tool: spreadsheet preview without extension dispatch.
pub struct ReadXlsxTool {
    config: DocumentConfig,
}

impl ReadXlsxTool {
    /// Create the tool with the given reader limits
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ResearchTool for ReadXlsxTool {
    fn name(&self) -> &str {
        names::READ_XLSX
    }

    fn description(&self) -> &str {
        "Preview a local spreadsheet (first sheets/rows/columns). Arguments: {\"path\": \"/abs/path/data.xlsx\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path_str = path_arg(&args)?;
        parse_xlsx(Path::new(path_str), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_document_unknown_extension() {
        let tool = ReadDocumentTool::new(DocumentConfig::default());
        let result = tool
            .execute(serde_json::json!({"path": "/tmp/notes.txt"}))
            .await;
        assert!(result.unwrap_err().contains("Unsupported document extension"));
    }

    #[tokio::test]
    async fn test_read_document_missing_path() {
        let tool = ReadDocumentTool::new(DocumentConfig::default());
        let result = tool.execute(serde_json::json!({})).await;
        assert_eq!(result.unwrap_err(), "Missing 'path' argument");
    }

    #[tokio::test]
    async fn test_read_document_case_insensitive_dispatch() {
        let tool = ReadDocumentTool::new(DocumentConfig::default());
        // Dispatches to the PDF reader, which then fails on the missing file;
        // the point is that the extension was recognized.
        let result = tool
            .execute(serde_json::json!({"path": "/nonexistent/REPORT.PDF"}))
            .await;
        let err = result.unwrap_err();
        assert!(!err.contains("Unsupported document extension"));
    }

    #[tokio::test]
    async fn test_read_xlsx_missing_file() {
        let tool = ReadXlsxTool::new(DocumentConfig::default());
        let result = tool
            .execute(serde_json::json!({"path": "/nonexistent/data.xlsx"}))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_docx_from_zip() {
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memo.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        archive.start_file("word/document.xml", options).unwrap();
        archive
            .write_all(
                br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly revenue grew 12 percent.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Churn held steady.</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
            )
            .unwrap();
        archive.finish().unwrap();

        let output = parse_docx(&path).unwrap();
        assert!(output.starts_with(&format!("Read document: {}", path.display())));
        assert!(output.contains("Quarterly revenue grew 12 percent."));
        assert!(output.contains("Churn held steady."));
    }

    #[test]
    fn test_cap_output() {
        let long_input = "y".repeat(MAX_DOC_OUTPUT_CHARS + 10);
        let capped = cap_output(long_input);
        assert!(capped.contains("... (output truncated)"));
    }
}
