//! services/worker/src/adapters/extract.rs
//!
//! Format-specific text and metadata extraction. PDF text comes from
//! `lopdf`; DOCX and PPTX are ZIP archives of Open XML, walked with
//! `quick-xml` (`word/document.xml` for DOCX, `ppt/slides/slideN.xml` for
//! PPTX, `docProps/core.xml` / `docProps/app.xml` for metadata).

use async_trait::async_trait;
use cat_tales_core::ports::{ContentExtractor, DocumentFormat, ExtractError, ExtractedMetadata};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Extractor over raw document bytes for the three supported formats.
pub struct FormatExtractor {
    spaces: Regex,
    blank_lines: Regex,
}

impl FormatExtractor {
    pub fn new() -> Self {
        Self {
            spaces: Regex::new(r"[ \t]+").expect("static regex"),
            blank_lines: Regex::new(r"\n{3,}").expect("static regex"),
        }
    }

    /// Collapses runs of spaces and excess blank lines while keeping
    /// paragraph boundaries intact.
    fn normalize(&self, raw: &str) -> String {
        let stripped: String = raw
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        let collapsed = self.spaces.replace_all(&stripped, " ");
        let trimmed = self.blank_lines.replace_all(&collapsed, "\n\n");
        trimmed.trim().to_string()
    }

    //-------------------------------------------------------------------------------------
    // PDF
    //-------------------------------------------------------------------------------------

    fn pdf_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Parse {
            format: "pdf",
            detail: e.to_string(),
        })?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        if pages.is_empty() {
            return Err(ExtractError::Empty);
        }
        let text = doc.extract_text(&pages).map_err(|e| ExtractError::Parse {
            format: "pdf",
            detail: e.to_string(),
        })?;
        Ok(text)
    }

    fn pdf_metadata(&self, bytes: &[u8]) -> Result<ExtractedMetadata, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Parse {
            format: "pdf",
            detail: e.to_string(),
        })?;
        let mut meta = ExtractedMetadata {
            page_count: Some(doc.get_pages().len()),
            ..Default::default()
        };
        // The Info dictionary is optional and often absent; best-effort.
        if let Ok(info_ref) = doc.trailer.get(b"Info") {
            if let Ok(info_id) = info_ref.as_reference() {
                if let Ok(info) = doc.get_dictionary(info_id) {
                    meta.title = pdf_info_string(info, b"Title");
                    meta.author = pdf_info_string(info, b"Author");
                }
            }
        }
        Ok(meta)
    }

    //-------------------------------------------------------------------------------------
    // Open XML (DOCX / PPTX)
    //-------------------------------------------------------------------------------------

    fn open_archive<'a>(
        bytes: &'a [u8],
        format: &'static str,
    ) -> Result<ZipArchive<Cursor<&'a [u8]>>, ExtractError> {
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Parse {
            format,
            detail: format!("failed to open archive: {e}"),
        })
    }

    fn read_entry(
        archive: &mut ZipArchive<Cursor<&[u8]>>,
        name: &str,
    ) -> Option<String> {
        let mut entry = archive.by_name(name).ok()?;
        let mut content = String::new();
        entry.read_to_string(&mut content).ok()?;
        Some(content)
    }

    fn docx_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = Self::open_archive(bytes, "docx")?;
        let xml = Self::read_entry(&mut archive, "word/document.xml").ok_or(
            ExtractError::Parse {
                format: "docx",
                detail: "missing word/document.xml".to_string(),
            },
        )?;
        // <w:t> runs hold the text; each closing <w:p> is a paragraph break.
        collect_xml_text(&xml, b"t", Some(b"p")).map_err(|detail| ExtractError::Parse {
            format: "docx",
            detail,
        })
    }

    fn pptx_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = Self::open_archive(bytes, "pptx")?;
        let mut slide_names: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        // slide10.xml must sort after slide2.xml.
        slide_names.sort_by_key(|n| slide_number(n));

        let mut parts = Vec::new();
        for name in &slide_names {
            if let Some(xml) = Self::read_entry(&mut archive, name) {
                let slide = collect_xml_text(&xml, b"t", None).map_err(|detail| {
                    ExtractError::Parse {
                        format: "pptx",
                        detail,
                    }
                })?;
                if !slide.trim().is_empty() {
                    parts.push(slide);
                }
            }
        }
        Ok(parts.join("\n\n"))
    }

    fn office_metadata(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ExtractedMetadata, ExtractError> {
        let format_name = format.as_str();
        let mut archive = Self::open_archive(
            bytes,
            match format {
                DocumentFormat::Docx => "docx",
                DocumentFormat::Pptx => "pptx",
                DocumentFormat::Pdf => unreachable!("pdf handled separately"),
            },
        )?;
        let mut meta = ExtractedMetadata::default();

        if let Some(core) = Self::read_entry(&mut archive, "docProps/core.xml") {
            meta.title = xml_element_text(&core, b"title");
            meta.author = xml_element_text(&core, b"creator");
        }
        if let Some(app) = Self::read_entry(&mut archive, "docProps/app.xml") {
            let counter = match format {
                DocumentFormat::Docx => b"Pages".as_slice(),
                _ => b"Slides".as_slice(),
            };
            meta.page_count = xml_element_text(&app, counter).and_then(|v| v.parse().ok());
        }
        tracing::debug!(format = format_name, ?meta, "extracted office metadata");
        Ok(meta)
    }
}

impl Default for FormatExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for FormatExtractor {
    async fn extract_text(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<String, ExtractError> {
        let raw = match format {
            DocumentFormat::Pdf => self.pdf_text(bytes)?,
            DocumentFormat::Docx => self.docx_text(bytes)?,
            DocumentFormat::Pptx => self.pptx_text(bytes)?,
        };
        let normalized = self.normalize(&raw);
        if normalized.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(normalized)
    }

    async fn extract_metadata(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ExtractedMetadata, ExtractError> {
        match format {
            DocumentFormat::Pdf => self.pdf_metadata(bytes),
            DocumentFormat::Docx | DocumentFormat::Pptx => self.office_metadata(bytes, format),
        }
    }
}

/// Concatenates the text content of every `<{text_tag}>` element. When
/// `paragraph_tag` is given, each closing tag of that name emits a newline.
fn collect_xml_text(
    xml: &str,
    text_tag: &[u8],
    paragraph_tag: Option<&[u8]>,
) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == text_tag => in_text = true,
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == text_tag {
                    in_text = false;
                    out.push(' ');
                } else if paragraph_tag == Some(e.local_name().as_ref()) {
                    out.push('\n');
                }
            }
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(out)
}

/// Returns the text of the first element with the given local name.
fn xml_element_text(xml: &str, tag: &[u8]) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_tag = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == tag => in_tag = true,
            Ok(Event::Text(e)) if in_tag => {
                return e.unescape().ok().map(|t| t.into_owned());
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == tag => in_tag = false,
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

fn pdf_info_string(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|obj| obj.as_str().ok())
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_xml_walk_joins_runs_and_paragraphs() {
        let xml = r#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t>world.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = collect_xml_text(xml, b"t", Some(b"p")).unwrap();
        assert!(text.contains("Hello"));
        assert!(text.contains("world."));
        assert!(text.contains('\n'));
    }

    #[test]
    fn metadata_reads_first_matching_element() {
        let core = r#"<cp:coreProperties xmlns:cp="c" xmlns:dc="d">
            <dc:title>Annual Report</dc:title>
            <dc:creator>J. Mouser</dc:creator>
        </cp:coreProperties>"#;
        assert_eq!(xml_element_text(core, b"title").as_deref(), Some("Annual Report"));
        assert_eq!(xml_element_text(core, b"creator").as_deref(), Some("J. Mouser"));
        assert_eq!(xml_element_text(core, b"subject"), None);
    }

    #[test]
    fn slides_sort_numerically() {
        let mut names = vec![
            "ppt/slides/slide10.xml".to_string(),
            "ppt/slides/slide2.xml".to_string(),
            "ppt/slides/slide1.xml".to_string(),
        ];
        names.sort_by_key(|n| slide_number(n));
        assert_eq!(names[0], "ppt/slides/slide1.xml");
        assert_eq!(names[2], "ppt/slides/slide10.xml");
    }

    #[test]
    fn normalize_collapses_whitespace_but_keeps_paragraphs() {
        let extractor = FormatExtractor::new();
        let raw = "A  line\twith    gaps\n\n\n\n\nNext paragraph  here";
        let clean = extractor.normalize(raw);
        assert_eq!(clean, "A line with gaps\n\nNext paragraph here");
    }

    #[test]
    fn docx_text_reads_through_the_archive_layer() {
        use std::io::Write;
        use zip::{write::SimpleFileOptions, ZipWriter};

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer
                .write_all(
                    br#"<w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Stored text.</w:t></w:r></w:p></w:body></w:document>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }
        let bytes = cursor.into_inner();

        let extractor = FormatExtractor::new();
        let text = extractor.docx_text(&bytes).unwrap();
        assert!(text.contains("Stored text."));
    }

    #[test]
    fn non_archive_bytes_are_a_parse_error() {
        let result = FormatExtractor::open_archive(b"definitely not a zip", "docx");
        assert!(matches!(result, Err(ExtractError::Parse { format: "docx", .. })));
    }

    #[test]
    fn corrupt_pdf_is_a_parse_error() {
        let extractor = FormatExtractor::new();
        let result = extractor.pdf_text(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractError::Parse { format: "pdf", .. })));
    }
}
