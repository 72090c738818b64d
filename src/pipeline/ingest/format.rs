use std::path::Path;

use super::IngestError;
use crate::models::DocumentFormat;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Map a declared mime type onto the allow-list. Empty or generic
/// declarations are resolved from the filename extension first.
pub fn resolve_declared_format(declared_mime: &str, filename: &str) -> Result<DocumentFormat, IngestError> {
    let declared = declared_mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let mime = if declared.is_empty() || declared == "application/octet-stream" {
        mime_guess::from_path(filename)
            .first_raw()
            .map(str::to_string)
            .unwrap_or(declared)
    } else {
        declared
    };

    DocumentFormat::ALL
        .iter()
        .copied()
        .find(|f| f.mime_type() == mime)
        .ok_or(IngestError::UnsupportedFormat(if mime.is_empty() {
            "unknown".into()
        } else {
            mime
        }))
}

/// Detect format from magic bytes (NOT file extensions).
pub fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    if bytes.starts_with(PDF_MAGIC) {
        Some(DocumentFormat::Pdf)
    } else if bytes.starts_with(ZIP_MAGIC) {
        Some(DocumentFormat::Xlsx)
    } else if bytes.starts_with(OLE_MAGIC) {
        Some(DocumentFormat::Xls)
    } else {
        None
    }
}

/// Resolve the declared type and require the bytes to agree with it.
pub fn detect_format(bytes: &[u8], declared_mime: &str, filename: &str) -> Result<DocumentFormat, IngestError> {
    let declared = resolve_declared_format(declared_mime, filename)?;
    match sniff_format(bytes) {
        Some(detected) if detected == declared => Ok(declared),
        Some(detected) => Err(IngestError::FormatMismatch {
            declared,
            detected: detected.as_str().to_string(),
        }),
        None => Err(IngestError::FormatMismatch {
            declared,
            detected: "unrecognised bytes".into(),
        }),
    }
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let normalized = original.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .take(255)
        .collect();

    if clean.trim().is_empty() {
        "document".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentFormat;

    #[test]
    fn allow_list_accepts_declared_types() {
        assert_eq!(
            resolve_declared_format("application/pdf", "x").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            resolve_declared_format(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "x"
            )
            .unwrap(),
            DocumentFormat::Xlsx
        );
        assert_eq!(
            resolve_declared_format("Application/Vnd.MS-Excel; charset=binary", "x").unwrap(),
            DocumentFormat::Xls
        );
    }

    #[test]
    fn generic_mime_falls_back_to_extension() {
        assert_eq!(
            resolve_declared_format("application/octet-stream", "report.pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            resolve_declared_format("", "kpis.xlsx").unwrap(),
            DocumentFormat::Xlsx
        );
    }

    #[test]
    fn rejects_types_outside_allow_list() {
        let err = resolve_declared_format("image/png", "scan.png").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ref m) if m == "image/png"));
        assert!(resolve_declared_format("", "notes.txt").is_err());
    }

    #[test]
    fn magic_bytes_must_match_declaration() {
        let err = detect_format(b"PK\x03\x04rest", "application/pdf", "a.pdf").unwrap_err();
        assert!(matches!(err, IngestError::FormatMismatch { .. }));
        assert_eq!(err.kind(), crate::models::ErrorKind::UnsupportedFormat);

        let ok = detect_format(b"%PDF-1.7", "application/pdf", "a.pdf").unwrap();
        assert_eq!(ok, DocumentFormat::Pdf);
    }

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("a\0b.pdf"), "ab.pdf");
        assert_eq!(sanitize_filename(""), "document");
    }

    #[test]
    fn sanitize_limits_length() {
        let long = "a".repeat(400) + ".pdf";
        assert_eq!(sanitize_filename(&long).chars().count(), 255);
    }
}
