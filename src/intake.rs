//! Raw message intake — parse an RFC 822 message into a [`NewEmail`] and
//! gate it on the sender allowlist.

use mail_parser::MessageParser;

use crate::error::IntakeError;
use crate::model::NewEmail;

/// Subject placeholder when the header is absent.
const NO_SUBJECT: &str = "No Subject";

/// Parse a raw RFC 822 message into the fields the pipeline stores.
///
/// The body keeps every `text/plain` and `text/html` part that is actually
/// present, in document order, joined with blank lines; content-type
/// detection happens later, in normalization.
pub fn parse_rfc822(raw: &[u8]) -> Result<NewEmail, IntakeError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| IntakeError::MimeParse("not a parseable MIME message".to_string()))?;

    let subject = parsed
        .subject()
        .map(str::to_string)
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let from = parsed.from().and_then(|addr| addr.first());
    let sender_email = from
        .and_then(|a| a.address())
        .map(str::to_string)
        .ok_or_else(|| IntakeError::MimeParse("message has no sender address".to_string()))?;
    let sender_name = from
        .and_then(|a| a.name())
        .map(|n| n.trim().trim_matches('"').to_string())
        .filter(|n| !n.is_empty());

    // Walk the real MIME parts; `body_text`/`body_html` would synthesize
    // the missing representation for single-part messages.
    let mut parts: Vec<String> = Vec::new();
    for part in &parsed.parts {
        if (part.is_text() || part.is_text_html())
            && let Some(text) = part.text_contents()
        {
            parts.push(text.to_string());
        }
    }

    Ok(NewEmail {
        subject,
        sender_email,
        sender_name,
        raw_content: parts.join("\n\n"),
    })
}

/// Sender allowlist check.
///
/// An empty list admits everyone. Entries match as case-insensitive
/// substrings of the sender address, so both full addresses and bare
/// domains work as entries.
pub fn is_sender_allowed(allowed: &[String], sender: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let sender = sender.to_lowercase();
    allowed
        .iter()
        .any(|entry| sender.contains(&entry.to_lowercase()))
}

/// [`is_sender_allowed`] as a gate returning [`IntakeError::SenderNotAllowed`].
pub fn check_sender(allowed: &[String], sender: &str) -> Result<(), IntakeError> {
    if is_sender_allowed(allowed, sender) {
        Ok(())
    } else {
        Err(IntakeError::SenderNotAllowed(sender.to_string()))
    }
}
