//! Spreadsheet text recovery.
//!
//! XLSX: shared strings plus numeric and inline cell values, one page per
//! worksheet, one line per row. XLS (BIFF inside OLE): no cell model, only
//! printable Latin-1 and UTF-16LE string runs.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{DecodeError, DecodedDocument, DecodedPage, MAX_INFLATED_BYTES};
use crate::models::DocumentFormat;

/// Shortest string run kept from a binary XLS stream.
const MIN_XLS_RUN: usize = 4;

static SHARED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<si>(.*?)</si>").expect("static regex"));
static TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").expect("static regex"));
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<row(?:\s[^>]*)?>(.*?)</row>").expect("static regex"));
static CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<c(\s[^>]*?)?(?:/>|>(.*?)</c>)").expect("static regex")
});
static CELL_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\st="([^"]*)""#).expect("static regex"));
static CELL_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<v>(.*?)</v>").expect("static regex"));

pub fn decode_xlsx(bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt_xlsx)?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    let shared = if names.iter().any(|n| n == "xl/sharedStrings.xml") {
        parse_shared_strings(&read_entry(&mut archive, "xl/sharedStrings.xml")?)
    } else {
        Vec::new()
    };

    let mut sheets: Vec<(u32, &str)> = names
        .iter()
        .filter_map(|n| worksheet_index(n).map(|i| (i, n.as_str())))
        .collect();
    sheets.sort_by_key(|(i, _)| *i);

    if sheets.is_empty() {
        return Err(DecodeError::corrupt(DocumentFormat::Xlsx, "workbook has no worksheets"));
    }

    let mut pages = Vec::with_capacity(sheets.len());
    for (_, name) in &sheets {
        let xml = read_entry(&mut archive, name)?;
        pages.push(DecodedPage {
            text: sheet_text(&xml, &shared),
            rect_ops: 0,
            text_ops: 0,
        });
    }

    Ok(DecodedDocument {
        format: DocumentFormat::Xlsx,
        sheet_count: Some(pages.len() as u32),
        pages,
    })
}

fn corrupt_xlsx(e: ZipError) -> DecodeError {
    DecodeError::corrupt(DocumentFormat::Xlsx, e.to_string())
}

/// Inflate one archive entry, bounded by `MAX_INFLATED_BYTES`.
fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, DecodeError> {
    let entry = archive.by_name(name).map_err(corrupt_xlsx)?;
    let mut raw = Vec::new();
    entry.take(MAX_INFLATED_BYTES).read_to_end(&mut raw)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn worksheet_index(name: &str) -> Option<u32> {
    name.strip_prefix("xl/worksheets/sheet")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    SHARED_ITEM
        .captures_iter(xml)
        .map(|item| {
            TEXT_RUN
                .captures_iter(&item[1])
                .map(|t| unescape_xml(&t[1]))
                .collect::<String>()
        })
        .collect()
}

fn sheet_text(xml: &str, shared: &[String]) -> String {
    let mut lines = Vec::new();
    for row in ROW.captures_iter(xml) {
        let mut cells = Vec::new();
        for cell in CELL.captures_iter(&row[1]) {
            let attrs = cell.get(1).map_or("", |m| m.as_str());
            let body = cell.get(2).map_or("", |m| m.as_str());
            let kind = CELL_TYPE
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map_or("n", |m| m.as_str());

            let value = match kind {
                "s" => CELL_VALUE
                    .captures(body)
                    .and_then(|v| v[1].trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned()),
                "inlineStr" => Some(
                    TEXT_RUN
                        .captures_iter(body)
                        .map(|t| unescape_xml(&t[1]))
                        .collect::<String>(),
                ),
                _ => CELL_VALUE.captures(body).map(|v| unescape_xml(v[1].trim())),
            };
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                cells.push(v.trim().to_string());
            }
        }
        if !cells.is_empty() {
            lines.push(cells.join(" "));
        }
    }
    lines.join("\n")
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn decode_xls(bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    if !bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return Err(DecodeError::corrupt(DocumentFormat::Xls, "missing OLE signature"));
    }
    let mut runs = latin1_runs(bytes);
    runs.extend(utf16_runs(bytes));
    let text = runs
        .into_iter()
        .filter(|r| r.chars().any(|c| c.is_alphabetic()))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(DecodedDocument {
        format: DocumentFormat::Xls,
        pages: vec![DecodedPage {
            text,
            rect_ops: 0,
            text_ops: 0,
        }],
        sheet_count: None,
    })
}

fn is_printable(b: u8) -> bool {
    (0x20..0x7F).contains(&b)
}

fn latin1_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if is_printable(b) {
            current.push(char::from(b));
        } else {
            if current.len() >= MIN_XLS_RUN {
                runs.push(current.trim().to_string());
            }
            current.clear();
        }
    }
    if current.len() >= MIN_XLS_RUN {
        runs.push(current.trim().to_string());
    }
    runs
}

fn utf16_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    for phase in 0..2 {
        let mut current = String::new();
        for pair in bytes[phase.min(bytes.len())..].chunks(2) {
            match pair {
                [lo, 0x00] if is_printable(*lo) => current.push(char::from(*lo)),
                _ => {
                    if current.len() >= MIN_XLS_RUN {
                        runs.push(current.trim().to_string());
                    }
                    current.clear();
                }
            }
        }
        if current.len() >= MIN_XLS_RUN {
            runs.push(current.trim().to_string());
        }
    }
    runs
}
