//! Fixture builders for unit tests: tiny but well-formed PDF and XLSX files.

use std::io::{Cursor, Write};

use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Borrower report used across stage tests: claimed −40% against a verified
/// +5%, no Scope 3, no assurance statement, an expired certification.
pub const GREENWASHING_REPORT: &str = "Sustainability Report 2024\n\
Our carbon emissions fell by 40% compared with last year.\n\
Verified data shows carbon emissions increased by 5%.\n\
Renewable energy share reached 85% of total consumption.\n\
Scope 1 emissions were 12,000 tCO2e and Scope 2 emissions were 8,500 tCO2e.\n\
We are proud to be carbon neutral across our operations.\n\
Our ISO 14001 certification expired in March 2023.";

pub fn pdf_document(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, 0, false, false)
}

pub fn compressed_pdf_document(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, 0, true, false)
}

/// Each page gets `rects` rectangle operators ahead of its text.
pub fn pdf_with_tables(pages: &[&str], rects: usize) -> Vec<u8> {
    build_pdf(pages, rects, false, false)
}

/// Standard-security trailer entry; the content itself is left readable.
pub fn encrypted_pdf_document(text: &str) -> Vec<u8> {
    build_pdf(&[text], 0, false, true)
}

/// Pages with no content streams, like a scan without a text layer.
pub fn image_only_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            })
            .into()
        })
        .collect();
    finish_pdf(doc, pages_id, kids)
}

fn build_pdf(pages: &[&str], rects: usize, compress: bool, encrypted: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let mut stream = Stream::new(dictionary! {}, content_stream(text, rects).into_bytes());
            if compress {
                stream.compress().unwrap();
            }
            let content_id = doc.add_object(stream);
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            })
            .into()
        })
        .collect();

    if encrypted {
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "P" => -44,
        });
        doc.trailer.set("Encrypt", encrypt_id);
    }
    finish_pdf(doc, pages_id, kids)
}

fn finish_pdf(mut doc: Document, pages_id: ObjectId, kids: Vec<Object>) -> Vec<u8> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn content_stream(text: &str, rects: usize) -> String {
    let mut s = String::new();
    for i in 0..rects {
        s.push_str(&format!("72 {} 468 14 re S\n", 700 - i * 14));
    }
    s.push_str("BT\n/F1 11 Tf\n72 720 Td\n");
    for line in text.lines() {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        s.push_str(&format!("({escaped}) Tj\n0 -14 Td\n"));
    }
    s.push_str("ET");
    s
}

/// Build an XLSX workbook: one worksheet per entry, rows of cells. Cells
/// that parse as numbers are written as numeric cells, the rest go to the
/// shared string table.
pub fn xlsx_workbook(sheets: &[&[&[&str]]]) -> Vec<u8> {
    let mut shared: Vec<String> = Vec::new();
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();

    entries.push((
        "[Content_Types].xml".into(),
        br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_vec(),
    ));
    entries.push((
        "xl/workbook.xml".into(),
        br#"<?xml version="1.0" encoding="UTF-8"?><workbook><sheets/></workbook>"#.to_vec(),
    ));

    for (index, rows) in sheets.iter().enumerate() {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet><sheetData>"#);
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
                if cell.parse::<f64>().is_ok() {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{cell}</v></c>"#));
                } else {
                    shared.push(cell.to_string());
                    xml.push_str(&format!(
                        r#"<c r="{reference}" t="s"><v>{}</v></c>"#,
                        shared.len() - 1
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        entries.push((format!("xl/worksheets/sheet{}.xml", index + 1), xml.into_bytes()));
    }

    let mut sst = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><sst>"#);
    for s in &shared {
        let escaped = s.replace('&', "&amp;").replace('<', "&lt;");
        sst.push_str(&format!("<si><t>{escaped}</t></si>"));
    }
    sst.push_str("</sst>");
    entries.push(("xl/sharedStrings.xml".into(), sst.into_bytes()));

    zip_archive(&entries)
}

/// Deflate-compressed ZIP archive.
pub fn zip_archive(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// OLE compound-file header followed by Latin-1 and UTF-16LE string runs.
pub fn xls_workbook(strings: &[&str]) -> Vec<u8> {
    let mut out = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    out.extend_from_slice(&[0u8; 24]);
    for (i, s) in strings.iter().enumerate() {
        if i % 2 == 0 {
            out.extend_from_slice(s.as_bytes());
        } else {
            for unit in s.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0x00, 0x03, 0x01, 0x00]);
    }
    out
}
