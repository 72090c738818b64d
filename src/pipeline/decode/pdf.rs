//! PDF text-layer reader on lopdf.
//!
//! Pages come from the document's `/Pages` tree in reading order. Each
//! page's content streams are decoded into operations and the
//! text-showing operators are interpreted into lines. Image-only pages
//! come back as empty pages.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use super::{DecodeError, DecodedDocument, DecodedPage};
use crate::models::DocumentFormat;

/// TJ kerning below this (thousandths of an em) reads as a word gap.
const TJ_WORD_GAP: f64 = -200.0;

pub fn decode_pdf(bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(DecodeError::corrupt(DocumentFormat::Pdf, "missing %PDF header"));
    }
    let doc = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) if contains(bytes, b"/Encrypt") => return Err(DecodeError::EncryptedPdf),
        Err(e) => return Err(DecodeError::corrupt(DocumentFormat::Pdf, e.to_string())),
    };
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(DecodeError::EncryptedPdf);
    }

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(DecodeError::corrupt(DocumentFormat::Pdf, "no pages found"));
    }

    let pages = page_ids
        .into_iter()
        .enumerate()
        .map(|(i, page_id)| decode_page(&doc, page_id, i as u32 + 1))
        .collect();

    Ok(DecodedDocument {
        format: DocumentFormat::Pdf,
        pages,
        sheet_count: None,
    })
}

/// A page whose content cannot be read is kept as an empty page so the
/// numbering of the pages after it holds.
fn decode_page(doc: &Document, page_id: ObjectId, page_number: u32) -> DecodedPage {
    let content = doc
        .get_page_content(page_id)
        .and_then(|data| Content::decode(&data));
    match content {
        Ok(content) => interpret(&content.operations),
        Err(e) => {
            tracing::warn!(page = page_number, error = %e, "Unreadable page content");
            DecodedPage::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Content stream interpretation
// ═══════════════════════════════════════════════════════════

/// Interpret a page's operations into text and operator counts.
pub(crate) fn interpret(operations: &[Operation]) -> DecodedPage {
    let mut page = DecodedPage::default();
    let mut text = String::new();

    for op in operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "ET" | "T*" | "Tm" => push_line_break(&mut text),
            "Tj" => {
                if let Some(Object::String(s, _)) = operands.last() {
                    page.text_ops += 1;
                    push_pdf_string(&mut text, s);
                }
            }
            "'" | "\"" => {
                push_line_break(&mut text);
                if let Some(Object::String(s, _)) = operands.last() {
                    page.text_ops += 1;
                    push_pdf_string(&mut text, s);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.last() {
                    page.text_ops += 1;
                    for item in items {
                        match item {
                            Object::String(s, _) => push_pdf_string(&mut text, s),
                            other => {
                                if number(other).is_some_and(|n| n < TJ_WORD_GAP) {
                                    push_space(&mut text);
                                }
                            }
                        }
                    }
                }
            }
            "Td" | "TD" => {
                if let [.., tx, ty] = operands {
                    match (number(tx), number(ty)) {
                        (_, Some(ty)) if ty.abs() > f64::EPSILON => push_line_break(&mut text),
                        (Some(tx), _) if tx > 0.0 => push_space(&mut text),
                        _ => {}
                    }
                }
            }
            "re" => page.rect_ops += 1,
            _ => {}
        }
    }

    page.text = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    page
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn push_line_break(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

fn push_space(text: &mut String) {
    if !text.is_empty() && !text.ends_with([' ', '\n']) {
        text.push(' ');
    }
}

/// Decode a PDF string: UTF-16BE with BOM, otherwise Latin-1.
fn push_pdf_string(text: &mut String, raw: &[u8]) {
    if raw.starts_with(&[0xFE, 0xFF]) {
        let units = raw[2..]
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]));
        text.extend(char::decode_utf16(units).map(|r| r.unwrap_or('\u{FFFD}')));
        return;
    }
    for &b in raw {
        match b {
            b'\t' => text.push(' '),
            0x20..=0x7E | 0xA0..=0xFF => text.push(char::from(b)),
            _ => {}
        }
    }
}
