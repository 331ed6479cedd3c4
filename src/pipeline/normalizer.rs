//! Content normalizer — strips a raw email body down to clean,
//! boilerplate-free Markdown-ish text.
//!
//! Never fails: if HTML conversion errors out, the untouched input comes
//! back so one malformed email can't break the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Tag signatures used for HTML detection. Heuristic — an HTML email that
/// uses none of these tags in its first 1000 characters is treated as text.
const HTML_SIGNATURES: [&str; 6] = ["<html", "<body", "<div", "<p>", "<br", "<table"];

/// Render width for the HTML → text conversion.
const RENDER_WIDTH: usize = 400;

/// Strips comments plus script/style/meta/link elements. Their content must
/// never reach the output.
static STRIP_ELEMENTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<!--[\s\S]*?-->|<script[\s\S]*?</script>|<style[\s\S]*?</style>|<meta[^>]*>|<link[^>]*>",
    )
    .expect("invalid strip-elements regex")
});

/// Footer boilerplate lines, matched case-insensitively as prefixes.
static FOOTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(unsubscribe|to unsubscribe|click here to unsubscribe|manage your preferences|update your email preferences|copyright|all rights reserved|sent by|this email was sent to|powered by)",
    )
    .expect("invalid footer regex")
});

/// Normalizes raw email bodies (HTML or plain text).
#[derive(Debug, Clone, Default)]
pub struct ContentNormalizer;

impl ContentNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a raw email body into cleaned Markdown-ish text.
    ///
    /// Empty input yields empty output. Input with no recognizable structure
    /// comes back as near-verbatim cleaned text.
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        if is_html(raw) {
            let stripped = STRIP_ELEMENTS_RE.replace_all(raw, "");
            match html2text::from_read(stripped.as_bytes(), RENDER_WIDTH) {
                Ok(markdown) => clean_markdown(&markdown),
                Err(e) => {
                    warn!(error = %e, "HTML conversion failed, keeping raw content");
                    raw.to_string()
                }
            }
        } else {
            clean_text(raw)
        }
    }
}

/// Scan the first 1000 characters (case-insensitive) for tag signatures.
fn is_html(content: &str) -> bool {
    let head: String = content.chars().take(1000).collect::<String>().to_lowercase();
    HTML_SIGNATURES.iter().any(|sig| head.contains(sig))
}

fn is_footer_line(line: &str) -> bool {
    FOOTER_RE.is_match(line)
}

/// Line-clean the HTML-derived branch: trim lines, drop footer boilerplate,
/// collapse blank runs to one blank line, trim trailing blanks.
fn clean_markdown(markdown: &str) -> String {
    let mut cleaned: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();

        if line.is_empty() {
            if cleaned.last().is_some_and(|last| !last.is_empty()) {
                cleaned.push("");
            }
            continue;
        }

        if is_footer_line(line) {
            continue;
        }

        cleaned.push(line);
    }

    while cleaned.last() == Some(&"") {
        cleaned.pop();
    }

    cleaned.join("\n")
}

/// Line-clean the plain-text branch: trim lines, drop blanks and footer
/// boilerplate, rejoin with a blank line between survivors.
///
/// The double-newline separator is intentional and differs from the HTML
/// branch.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_footer_line(line))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        let normalizer = ContentNormalizer::new();
        assert_eq!(normalizer.normalize(""), "");
    }

    #[test]
    fn detects_html_by_tag_signature() {
        assert!(is_html("<html><body>hi</body></html>"));
        assert!(is_html("some text <DIV>block</DIV>"));
        assert!(is_html("line<br/>break"));
        assert!(!is_html("just plain text with a < sign"));
    }

    #[test]
    fn html_detection_only_scans_first_1000_chars() {
        let mut content = "x".repeat(1000);
        content.push_str("<div>late</div>");
        assert!(!is_html(&content));
    }

    #[test]
    fn script_content_never_reaches_output() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize("<p>Hello</p><script>evil()</script>");
        assert!(out.contains("Hello"));
        assert!(!out.contains("evil"));
    }

    #[test]
    fn style_and_meta_are_removed() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize(
            "<html><head><meta charset=\"utf-8\"><style>p { color: red }</style></head>\
             <body><p>Visible</p></body></html>",
        );
        assert!(out.contains("Visible"));
        assert!(!out.contains("color"));
        assert!(!out.contains("charset"));
    }

    #[test]
    fn footer_lines_are_dropped_from_plain_text() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize(
            "Important meeting notes\nUnsubscribe here\nCopyright 2025 Acme\nSee you there",
        );
        assert!(out.contains("Important meeting notes"));
        assert!(out.contains("See you there"));
        assert!(!out.to_lowercase().contains("unsubscribe"));
        assert!(!out.to_lowercase().contains("copyright"));
    }

    #[test]
    fn footer_match_is_case_insensitive_prefix() {
        assert!(is_footer_line("UNSUBSCRIBE here"));
        assert!(is_footer_line("This email was sent to you@example.com"));
        assert!(is_footer_line("Powered by Newsletters Inc"));
        // Mid-line mentions are kept.
        assert!(!is_footer_line("How to unsubscribe gracefully"));
    }

    #[test]
    fn plain_text_lines_rejoin_with_blank_line() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize("first\n\n\nsecond\nthird");
        assert_eq!(out, "first\n\nsecond\n\nthird");
    }

    #[test]
    fn html_branch_collapses_blank_runs() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize("<p>one</p><p>two</p>");
        // No run of more than one blank line, no trailing blanks.
        assert!(!out.contains("\n\n\n"));
        assert!(!out.ends_with('\n'));
        assert!(out.contains("one"));
        assert!(out.contains("two"));
    }

    #[test]
    fn unstructured_input_is_near_verbatim() {
        let normalizer = ContentNormalizer::new();
        let out = normalizer.normalize("   lone line   ");
        assert_eq!(out, "lone line");
    }
}
