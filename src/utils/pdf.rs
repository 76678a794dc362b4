// PDF classification used by every trigger before any network I/O.
// Keep this module pure: no network, no filesystem.

/// Returns true if the given URL (or content-type bearing string) looks like a PDF.
/// - ends with `.pdf`
/// - contains `.pdf?` (query-suffixed links)
/// - contains `application/pdf`
/// - starts with `data:application/pdf`
///
/// All checks are case-insensitive. Anything else, including `.pdfx`, is not a PDF.
pub fn is_pdf(url_or_content_type: Option<&str>) -> bool {
    let value = match url_or_content_type {
        Some(v) if !v.is_empty() => v.to_ascii_lowercase(),
        _ => return false,
    };

    value.ends_with(".pdf")
        || value.contains(".pdf?")
        || value.contains("application/pdf")
        || value.starts_with("data:application/pdf")
}

/// Strict check for a page's declared content type: exactly `application/pdf`.
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf")
}

#[cfg(test)]
mod tests {
    use super::{is_pdf, is_pdf_content_type};

    #[test]
    fn matches_pdf_suffix_in_any_case() {
        assert!(is_pdf(Some("https://example.com/doc.pdf")));
        assert!(is_pdf(Some("https://example.com/DOC.PDF")));
        assert!(is_pdf(Some("file:///tmp/Report.Pdf")));
    }

    #[test]
    fn matches_query_suffixed_links() {
        assert!(is_pdf(Some("https://example.com/doc.pdf?download=1")));
        assert!(is_pdf(Some("https://example.com/a.PDF?x=y#page=2")));
    }

    #[test]
    fn matches_mime_bearing_strings() {
        assert!(is_pdf(Some("application/pdf")));
        assert!(is_pdf(Some("https://cdn.example.com/get?type=Application/PDF")));
        assert!(is_pdf(Some("data:application/pdf;base64,JVBERi0xLjQK")));
    }

    #[test]
    fn rejects_empty_and_missing_input() {
        assert!(!is_pdf(None));
        assert!(!is_pdf(Some("")));
    }

    #[test]
    fn rejects_lookalike_extensions() {
        assert!(!is_pdf(Some("https://example.com/report.pdfx")));
        assert!(!is_pdf(Some("https://example.com/page.html")));
        assert!(!is_pdf(Some("https://example.com/pdf/index")));
    }

    #[test]
    fn strict_content_type_requires_exact_match() {
        assert!(is_pdf_content_type(Some("application/pdf")));
        assert!(!is_pdf_content_type(Some("application/pdf; charset=binary")));
        assert!(!is_pdf_content_type(Some("Application/PDF")));
        assert!(!is_pdf_content_type(Some("https://example.com/doc.pdf")));
        assert!(!is_pdf_content_type(Some("")));
        assert!(!is_pdf_content_type(None));
    }
}
