//! Plain-text extraction for study documents.
//!
//! Dispatch is keyed by file extension (case-insensitive): `pdf` via
//! [`pdf_extract`], `docx`/`pptx`/`xlsx` by walking the OOXML parts with
//! [`zip`] + [`quick_xml`], `txt` read directly. The rest of the pipeline
//! only ever sees a single UTF-8 string per document.

use std::io::Read;
use std::path::{Path, PathBuf};

/// Extensions the extractor accepts, lowercase.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "pptx", "xlsx", "txt"];

/// Decompressed-size bound per ZIP entry (zip-bomb protection).
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Cells read per worksheet before the rest of the sheet is dropped.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

/// A supported document format, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
}

impl DocumentFormat {
    /// Case-insensitive extension lookup.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "txt" => Some(DocumentFormat::Txt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[derive(Debug)]
pub enum ExtractError {
    /// No file at the given path. Checked before anything is read.
    NotFound(PathBuf),
    /// Extension outside [`SUPPORTED_EXTENSIONS`]; carries the extension
    /// (empty string when the path has none).
    UnsupportedExtension(String),
    Io(std::io::Error),
    Pdf(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotFound(path) => write!(f, "file not found: {}", path.display()),
            ExtractError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file extension: .{}", ext)
            }
            ExtractError::Io(e) => write!(f, "failed to read file: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Extract the full text of the document at `path`.
///
/// Gate order is fixed: existence, then extension, then the actual read.
/// A missing file never touches a reader; an unsupported extension never
/// opens the file.
pub fn load_text(path: &Path) -> Result<String, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let format = DocumentFormat::from_extension(&ext)
        .ok_or(ExtractError::UnsupportedExtension(ext))?;
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    extract_bytes(&bytes, format)
}

/// Extract text from in-memory content of a known format.
pub fn extract_bytes(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Xlsx => extract_xlsx(bytes),
        DocumentFormat::Txt => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

// ============ OOXML plumbing ============

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "{} exceeds size limit ({} bytes)",
            name, MAX_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Archive entries matching `prefix<N>suffix`, sorted by N.
fn numbered_entries(archive: &Archive<'_>, prefix: &str, suffix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(suffix)
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Collect the text runs of a WordprocessingML or DrawingML part.
///
/// Both vocabularies put visible text in `<t>` elements nested inside
/// `<p>` paragraphs (`w:t`/`w:p` in docx, `a:t`/`a:p` in pptx slides), so
/// a single walker keyed on local names covers both. Each closed
/// paragraph contributes a newline.
fn collect_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut out = String::new();
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(text.as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    collect_paragraph_text(&xml).map(|s| s.trim_end().to_string())
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slides = numbered_entries(&archive, "ppt/slides/slide", ".xml");
    let mut out = String::new();
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        let slide_text = collect_paragraph_text(&xml)?;
        let slide_text = slide_text.trim_end();
        if slide_text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(slide_text);
    }
    Ok(out)
}

// ============ XLSX ============

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Literal,
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = read_shared_strings(&mut archive)?;
    let sheets = numbered_entries(&archive, "xl/worksheets/sheet", ".xml");
    let mut out = String::new();
    for name in sheets {
        let xml = read_entry(&mut archive, &name)?;
        let sheet_text = sheet_rows_text(&xml, &shared)?;
        if sheet_text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&sheet_text);
    }
    Ok(out)
}

/// Shared strings, one entry per `<si>`. Rich-text runs (multiple `<t>`
/// children under one `<si>`) are concatenated so indices stay aligned
/// with what the worksheets reference. A workbook with no shared-strings
/// part yields an empty table.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    let xml = match archive.by_name("xl/sharedStrings.xml") {
        Ok(entry) => {
            let mut out = Vec::new();
            entry
                .take(MAX_ENTRY_BYTES)
                .read_to_end(&mut out)
                .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
            out
        }
        Err(_) => return Ok(Vec::new()),
    };

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if current.is_some() => in_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                if let Some(s) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    s.push_str(text.as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Walk one worksheet: cells joined by spaces within a row, rows by
/// newlines. Shared-string cells are resolved through the table; inline
/// strings and literal values are taken as written.
fn sheet_rows_text(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_kind = CellKind::Literal;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut cells_seen = 0usize;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        if cells_seen >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    cell_kind = CellKind::Literal;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            cell_kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Literal,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if cell_kind == CellKind::Inline => in_inline_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(t)) if in_value || in_inline_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                let value = text.trim();
                if value.is_empty() {
                    // skip blank cells
                } else if in_value && cell_kind == CellKind::Shared {
                    if let Some(s) = value.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                        row.push(s.clone());
                        cells_seen += 1;
                    }
                } else {
                    row.push(value.to_string());
                    cells_seen += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => cell_kind = CellKind::Literal,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join(" "));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join(" "));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_extension("PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_extension("Docx"),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_extension("zip"), None);
        assert_eq!(
            DocumentFormat::from_path(Path::new("dir/Notes.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_text(Path::new("/nonexistent/notes.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }

    #[test]
    fn unsupported_extension_names_the_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("archive.zip");
        std::fs::write(&path, b"PK").unwrap();
        match load_text(&path).unwrap_err() {
            ExtractError::UnsupportedExtension(ext) => assert_eq!(ext, "zip"),
            other => panic!("expected UnsupportedExtension, got {:?}", other),
        }
    }

    #[test]
    fn txt_reads_verbatim() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.TXT");
        std::fs::write(&path, "plain notes\nwith two lines").unwrap();
        assert_eq!(load_text(&path).unwrap(), "plain notes\nwith two lines");
    }

    #[test]
    fn invalid_pdf_bytes_fail() {
        let err = extract_bytes(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_fails_for_docx() {
        let err = extract_bytes(b"not a zip", DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = zip_with(&[(
            "word/document.xml",
            r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        let text = extract_bytes(&bytes, DocumentFormat::Docx).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn docx_without_document_part_fails() {
        let bytes = zip_with(&[("word/other.xml", "<x/>")]);
        let err = extract_bytes(&bytes, DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn pptx_slides_in_numeric_order() {
        let slide = |text: &str| {
            format!(
                r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#,
                text
            )
        };
        // slide10 after slide2, despite lexicographic order
        let s1 = slide("one");
        let s2 = slide("two");
        let s10 = slide("ten");
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
        ]);
        let text = extract_bytes(&bytes, DocumentFormat::Pptx).unwrap();
        assert_eq!(text, "one\ntwo\nten");
    }

    #[test]
    fn xlsx_resolves_shared_and_literal_cells() {
        let bytes = zip_with(&[
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>revenue</t></si><si><t>rich </t><t>text</t></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row><c t="s"><v>0</v></c><c><v>42</v></c></row><row><c t="s"><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ]);
        let text = extract_bytes(&bytes, DocumentFormat::Xlsx).unwrap();
        assert_eq!(text, "revenue 42\nrich text");
    }

    #[test]
    fn xlsx_without_shared_strings_still_reads_values() {
        let bytes = zip_with(&[(
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row><c><v>3.14</v></c><c t="inlineStr"><is><t>note</t></is></c></row></sheetData></worksheet>"#,
        )]);
        let text = extract_bytes(&bytes, DocumentFormat::Xlsx).unwrap();
        assert_eq!(text, "3.14 note");
    }
}
