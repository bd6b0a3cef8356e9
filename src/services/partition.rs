//! Turns raw document bytes into categorized text elements.
//!
//! Understood inputs:
//! - `.json`: a pre-partitioned element list (`[{"type": "Title", "text": ...}, ...]`),
//!   the shape produced by external partitioning services
//! - `.pdf`: extracted page text, then partitioned like plain text
//! - `.docx`: one element per paragraph, `Title`/`Heading*` styles become titles
//! - Markdown: ATX headings, list items, tables and fenced code
//! - anything else that decodes as UTF-8: blank-line paragraphs, where a short
//!   single-line paragraph without closing punctuation is taken as a heading

use std::io::{Cursor, Read};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use zip::ZipArchive;

use crate::error::ParseError;
use crate::models::{Element, ElementCategory};
use crate::utils::{file_extension, is_binary_extension, is_markdown_extension};

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{0,3}#{1,6}\s+(.*?)(?:\s+#+)?\s*$").expect("heading pattern is valid")
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d{1,3}[.)])\s+(.+)$").expect("list item pattern is valid")
});

const MAX_TITLE_WORDS: usize = 12;
const MAX_TITLE_CHARS: usize = 120;
const SNIFF_LEN: usize = 512;

/// Partition a document into elements, choosing the reader by file extension.
pub fn partition(bytes: &[u8], file_name: &str) -> Result<Vec<Element>, ParseError> {
    let ext = file_extension(file_name);
    match ext.as_deref() {
        Some(ext) if is_binary_extension(ext) => {
            Err(ParseError::UnsupportedFormat(ext.to_string()))
        }
        Some("json") => parse_element_list(bytes),
        Some("pdf") => partition_pdf(bytes),
        Some("docx") => partition_docx(bytes),
        Some(ext) if is_markdown_extension(ext) => Ok(partition_markdown(decode(bytes)?)),
        _ => Ok(partition_text(decode(bytes)?)),
    }
}

fn decode(bytes: &[u8]) -> Result<&str, ParseError> {
    if bytes[..bytes.len().min(SNIFF_LEN)].contains(&0) {
        return Err(ParseError::UnsupportedFormat("binary content".to_string()));
    }
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn parse_element_list(bytes: &[u8]) -> Result<Vec<Element>, ParseError> {
    serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidElements(e.to_string()))
}

/// Partition a PDF by its extracted text. Form feeds between pages become
/// paragraph breaks.
pub fn partition_pdf(bytes: &[u8]) -> Result<Vec<Element>, ParseError> {
    let extraction_error = |message: String| ParseError::Extraction {
        format: "pdf".to_string(),
        message,
    };

    // pdf-extract panics on some malformed files instead of returning an error.
    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| extraction_error("malformed document".to_string()))?
        .map_err(|e| extraction_error(e.to_string()))?;

    Ok(partition_text(&text.replace('\u{c}', "\n\n")))
}

/// Partition a Word document from the paragraphs of `word/document.xml`.
pub fn partition_docx(bytes: &[u8]) -> Result<Vec<Element>, ParseError> {
    let extraction_error = |message: String| ParseError::Extraction {
        format: "docx".to_string(),
        message,
    };

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| extraction_error(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| extraction_error(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| extraction_error(e.to_string()))?;

    docx_paragraphs(&xml).map_err(extraction_error)
}

fn docx_paragraphs(xml: &str) -> Result<Vec<Element>, String> {
    let mut reader = Reader::from_str(xml);
    let mut elements = Vec::new();
    let mut text = String::new();
    let mut category = ElementCategory::NarrativeText;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:numPr" if category != ElementCategory::Title => {
                    category = ElementCategory::ListItem
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:pStyle" if is_heading_style(e) => category = ElementCategory::Title,
                b"w:tab" | b"w:br" => text.push(' '),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let part = e.unescape().map_err(|e| e.to_string())?;
                text.push_str(&part);
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let paragraph = text.trim();
                    let kind = std::mem::replace(&mut category, ElementCategory::NarrativeText);
                    if !paragraph.is_empty() {
                        elements.push(Element::new(paragraph, kind));
                    }
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    Ok(elements)
}

fn is_heading_style(e: &BytesStart<'_>) -> bool {
    e.attributes().filter_map(|a| a.ok()).any(|attr| {
        let value = String::from_utf8_lossy(&attr.value);
        attr.key.as_ref() == b"w:val" && (value == "Title" || value.starts_with("Heading"))
    })
}

/// Partition Markdown source.
pub fn partition_markdown(text: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut table: Vec<&str> = Vec::new();
    let mut code: Option<Vec<&str>> = None;

    for line in text.lines() {
        if let Some(block) = code.as_mut() {
            if is_fence(line) {
                push_block(&mut elements, block, "\n", ElementCategory::NarrativeText);
                code = None;
            } else {
                block.push(line);
            }
            continue;
        }

        let trimmed = line.trim();
        if is_fence(line) {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
            push_block(&mut elements, &mut table, "\n", ElementCategory::Table);
            code = Some(Vec::new());
            continue;
        }
        if trimmed.is_empty() {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
            push_block(&mut elements, &mut table, "\n", ElementCategory::Table);
            continue;
        }
        if let Some(caps) = HEADING.captures(line) {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
            push_block(&mut elements, &mut table, "\n", ElementCategory::Table);
            elements.push(Element::title(&caps[1]));
            continue;
        }
        if trimmed.starts_with('|') {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
            table.push(trimmed);
            continue;
        }
        push_block(&mut elements, &mut table, "\n", ElementCategory::Table);

        if let Some(caps) = LIST_ITEM.captures(line) {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
            elements.push(Element::new(&caps[1], ElementCategory::ListItem));
            continue;
        }
        paragraph.push(trimmed);
    }

    // Unterminated fence: keep what was collected.
    if let Some(mut block) = code {
        push_block(&mut elements, &mut block, "\n", ElementCategory::NarrativeText);
    }
    push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
    push_block(&mut elements, &mut table, "\n", ElementCategory::Table);
    elements
}

/// Partition plain text into paragraphs and heading-like lines.
pub fn partition_text(text: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if !line.is_empty() {
            paragraph.push(line);
            continue;
        }
        if paragraph.len() == 1 && looks_like_title(paragraph[0]) {
            elements.push(Element::title(paragraph[0]));
            paragraph.clear();
        } else {
            push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
        }
    }

    if paragraph.len() == 1 && looks_like_title(paragraph[0]) {
        elements.push(Element::title(paragraph[0]));
    } else {
        push_block(&mut elements, &mut paragraph, " ", ElementCategory::NarrativeText);
    }
    elements
}

fn push_block(
    elements: &mut Vec<Element>,
    lines: &mut Vec<&str>,
    separator: &str,
    category: ElementCategory,
) {
    if lines.is_empty() {
        return;
    }
    elements.push(Element::new(lines.join(separator), category));
    lines.clear();
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn looks_like_title(line: &str) -> bool {
    let words = line.split_whitespace().count();
    words > 0
        && words <= MAX_TITLE_WORDS
        && line.chars().count() <= MAX_TITLE_CHARS
        && line.chars().any(char::is_alphabetic)
        && !line.ends_with(['.', '!', '?', ',', ';', ':'])
        && !LIST_ITEM.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_headings_lists_and_paragraphs() {
        let md = "# Cloud Computing\n\nElastic resources\nprovisioned on demand.\n\n## Service models ##\n\n- IaaS\n- PaaS\n1. SaaS\n";
        let elements = partition(md.as_bytes(), "alice/cc.md").unwrap();

        assert_eq!(
            elements,
            vec![
                Element::title("Cloud Computing"),
                Element::text("Elastic resources provisioned on demand."),
                Element::title("Service models"),
                Element::new("IaaS", ElementCategory::ListItem),
                Element::new("PaaS", ElementCategory::ListItem),
                Element::new("SaaS", ElementCategory::ListItem),
            ]
        );
    }

    #[test]
    fn test_markdown_fenced_code_is_not_a_heading() {
        let md = "# Shell\n```\n# not a heading\nls -la\n```\nAfter";
        let elements = partition_markdown(md);

        assert_eq!(
            elements,
            vec![
                Element::title("Shell"),
                Element::text("# not a heading\nls -la"),
                Element::text("After"),
            ]
        );
    }

    #[test]
    fn test_markdown_table_block() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n\ntext";
        let elements = partition_markdown(md);

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].category, ElementCategory::Table);
        assert_eq!(elements[0].text, "| a | b |\n|---|---|\n| 1 | 2 |");
    }

    #[test]
    fn test_plain_text_short_line_becomes_title() {
        let text = "Introduction\n\nThis course covers distributed systems.\nIt has two parts.\n\nGrading:\n\nExams count for 70%.";
        let elements = partition(text.as_bytes(), "notes.txt").unwrap();

        assert_eq!(
            elements,
            vec![
                Element::title("Introduction"),
                Element::text("This course covers distributed systems. It has two parts."),
                Element::text("Grading:"),
                Element::text("Exams count for 70%."),
            ]
        );
    }

    #[test]
    fn test_json_element_list() {
        let json = r#"[{"type": "Title", "text": "Intro"}, {"type": "NarrativeText", "text": "A"}, {"type": "Footer", "text": "page 1"}]"#;
        let elements = partition(json.as_bytes(), "alice/cc.json").unwrap();

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0], Element::title("Intro"));
        assert_eq!(
            elements[2].category,
            ElementCategory::Other("Footer".to_string())
        );
    }

    #[test]
    fn test_invalid_json_elements() {
        let result = partition(b"{not json", "x.json");
        assert!(matches!(result, Err(ParseError::InvalidElements(_))));
    }

    /// Single-page PDF with one line of Helvetica text.
    fn pdf_with_text(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>".to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn docx_with_body(body: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_pdf_text_is_extracted() {
        let pdf = pdf_with_text("Hypervisors isolate virtual machines.");
        let elements = partition(&pdf, "alice/cc.pdf").unwrap();

        let text: Vec<&str> = elements.iter().map(|e| e.text.as_str()).collect();
        assert!(text.join(" ").contains("Hypervisors isolate virtual machines."));
    }

    #[test]
    fn test_malformed_pdf_is_an_extraction_error() {
        assert!(matches!(
            partition(b"%PDF-1.7", "alice/cc.pdf"),
            Err(ParseError::Extraction { format, .. }) if format == "pdf"
        ));
    }

    #[test]
    fn test_docx_paragraphs_and_headings() {
        let body = concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Virtualization</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">Hypervisors </w:t></w:r><w:r><w:t>isolate guests &amp; hosts.</w:t></w:r></w:p>"#,
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>Type 1</w:t></w:r></w:p>"#,
            r#"<w:p/>"#,
        );
        let elements = partition(&docx_with_body(body), "alice/cc.docx").unwrap();

        assert_eq!(
            elements,
            vec![
                Element::title("Virtualization"),
                Element::text("Hypervisors isolate guests & hosts."),
                Element::new("Type 1", ElementCategory::ListItem),
            ]
        );
    }

    #[test]
    fn test_docx_without_document_part() {
        assert!(matches!(
            partition(b"not a zip", "alice/cc.docx"),
            Err(ParseError::Extraction { format, .. }) if format == "docx"
        ));
    }

    #[test]
    fn test_binary_formats_rejected() {
        assert!(matches!(
            partition(b"\x89PNG", "alice/scan.png"),
            Err(ParseError::UnsupportedFormat(ext)) if ext == "png"
        ));
        assert!(matches!(
            partition(&[0x41, 0x00, 0x42], "blob"),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(matches!(
            partition(&[0xff, 0xfe, 0x41], "notes.txt"),
            Err(ParseError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_bom_is_stripped() {
        let elements = partition("\u{feff}Hello there, world.".as_bytes(), "a.txt").unwrap();
        assert_eq!(elements, vec![Element::text("Hello there, world.")]);
    }

    #[test]
    fn test_empty_document_has_no_elements() {
        assert!(partition(b"", "empty.txt").unwrap().is_empty());
        assert!(partition(b"\n\n  \n", "empty.md").unwrap().is_empty());
    }
}
