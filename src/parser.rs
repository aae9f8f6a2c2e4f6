//! Loading a digest message from raw RFC 5322 bytes

use crate::error::{Result, TransformError};
use crate::types::{EmailMessage, Headers};
use tracing::debug;

impl EmailMessage {
    /// Parse raw message bytes into the parts the rewriter works on.
    ///
    /// The first `text/plain` and `text/html` parts are taken as the bodies;
    /// every top-level header is kept in order.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| TransformError::Message(e.to_string()))?;

        let headers: Headers = parsed
            .headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect();
        let (mut text, mut html) = (None, None);
        collect_bodies(&parsed, &mut text, &mut html);

        debug!(
            "Loaded message with {} headers, html: {}, text: {}",
            headers.len(),
            html.is_some(),
            text.is_some()
        );

        Ok(Self {
            html_body: html,
            text_body: text,
            headers,
        })
    }
}

/// First `text/plain` and `text/html` leaves, depth first
fn collect_bodies(
    part: &mailparse::ParsedMail<'_>,
    text: &mut Option<String>,
    html: &mut Option<String>,
) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_bodies(sub, text, html);
        }
        return;
    }

    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    let slot = match mimetype.as_str() {
        "text/plain" => text,
        "text/html" => html,
        _ => return,
    };
    if slot.is_some() {
        return;
    }
    match part.get_body() {
        Ok(body) => *slot = Some(body),
        Err(e) => debug!("Skipping unreadable {mimetype} part: {e}"),
    }
}
