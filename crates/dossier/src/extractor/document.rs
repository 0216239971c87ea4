//! Document-text extractors: Office Open XML (docx, pptx) and PDF.

use super::{ExtractionError, TextExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};

/// Upper bound on a single decompressed XML part.
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Text runs (`<w:t>`, `<a:t>`) and paragraph ends (`</w:p>`, `</a:p>`).
static TEXT_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:w|a):t(?:\s[^>]*)?>([^<]*)</(?:w|a):t>|</(?:w|a):p>")
        .unwrap_or_else(|e| panic!("text run pattern: {e}"))
});

static SLIDE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap_or_else(|e| panic!("slide pattern: {e}"))
});

/// Word documents and PowerPoint decks.
pub struct OfficeXmlExtractor;

impl TextExtractor for OfficeXmlExtractor {
    fn name(&self) -> &'static str {
        "office-xml"
    }

    fn extensions(&self) -> &[&'static str] {
        &["docx", "pptx"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = open_archive(bytes, "office document")?;

        if archive.file_names().any(|name| name == "word/document.xml") {
            let xml = read_part(&mut archive, "word/document.xml", "docx")?;
            return Ok(xml_text(&xml));
        }

        let mut slides: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| {
                let number = SLIDE_NUMBER.captures(name)?.get(1)?.as_str().parse().ok()?;
                Some((number, name.to_string()))
            })
            .collect();
        if slides.is_empty() {
            return Err(ExtractionError::malformed(
                "office document",
                "no document body or slides",
            ));
        }
        slides.sort();

        let mut text = String::new();
        for (_, name) in slides {
            let xml = read_part(&mut archive, &name, "pptx")?;
            text.push_str(&xml_text(&xml));
        }
        Ok(text)
    }
}

/// Zip container read straight from the fetched bytes.
pub(crate) type PartArchive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive<'a>(bytes: &'a [u8], format: &'static str) -> Result<PartArchive<'a>, ExtractionError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractionError::malformed(format, e))
}

pub(crate) fn read_part(
    archive: &mut PartArchive<'_>,
    name: &str,
    format: &'static str,
) -> Result<String, ExtractionError> {
    let part = archive
        .by_name(name)
        .map_err(|e| ExtractionError::malformed(format, format!("{name}: {e}")))?;
    let mut raw = Vec::new();
    part.take(MAX_PART_BYTES)
        .read_to_end(&mut raw)
        .map_err(|e| ExtractionError::malformed(format, format!("{name}: {e}")))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Concatenated text runs, one line per paragraph.
fn xml_text(xml: &str) -> String {
    let mut text = String::new();
    for caps in TEXT_RUN.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => text.push('\n'),
        }
    }
    text
}

pub(crate) fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// PDF text via `pdf-extract` (feature `pdf`).
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    #[cfg(feature = "pdf")]
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed inputs.
        let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractionError::malformed("pdf", e)),
            Err(_) => Err(ExtractionError::malformed("pdf", "parser panicked")),
        }
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
        Err(ExtractionError::FeatureDisabled("pdf".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_text() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Annual</w:t></w:r><w:r><w:t xml:space="preserve"> Evaluation</w:t></w:r></w:p>
            <w:p><w:r><w:t>HoursSpent: 12 &amp; counting</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let bytes = build_zip(&[("word/document.xml", xml), ("[Content_Types].xml", "<Types/>")]);
        let text = OfficeXmlExtractor.extract(&bytes).unwrap();
        assert_eq!(text, "Annual Evaluation\nHoursSpent: 12 & counting\n");
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |t: &str| format!("<p:sld><a:p><a:r><a:t>{t}</a:t></a:r></a:p></p:sld>");
        let (s1, s2, s10) = (slide("one"), slide("two"), slide("ten"));
        let bytes = build_zip(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let text = OfficeXmlExtractor.extract(&bytes).unwrap();
        assert_eq!(text, "one\ntwo\nten\n");
    }

    #[test]
    fn test_not_a_zip_is_malformed() {
        let err = OfficeXmlExtractor.extract(b"plain text").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn test_zip_without_body_is_malformed() {
        let bytes = build_zip(&[("other.xml", "<x/>")]);
        assert!(OfficeXmlExtractor.extract(&bytes).is_err());
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_garbage_pdf_is_error() {
        assert!(PdfExtractor.extract(b"not a pdf").is_err());
    }
}
