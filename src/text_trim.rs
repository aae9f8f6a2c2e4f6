//! Trimming of excerpt blocks in the plain-text part

use crate::config::DigestConfig;
use crate::dom::normalize_whitespace;
use crate::topics::{is_topic_url_block, split_blocks};
use crate::trim::{char_len, cut_at_whitespace, ends_sentence, with_ellipsis};
use tracing::debug;

/// Block directly follows a topic URL and holds nothing protected
#[must_use]
pub fn is_eligible_block(block: &str, previous: Option<&str>, config: &DigestConfig) -> bool {
    !block.trim().is_empty()
        && previous.is_some_and(is_topic_url_block)
        && !config.is_protected_text(block)
}

/// Shorten one block to `budget` characters, or `None` if it already fits
#[must_use]
pub fn trim_block(block: &str, budget: usize) -> Option<String> {
    let normalized = normalize_whitespace(block);
    if budget == 0 || char_len(&normalized) <= budget {
        return None;
    }

    let mut lines = block.trim().lines();
    let first = lines.next().map(normalize_whitespace).unwrap_or_default();
    let more = lines.any(|line| !line.trim().is_empty());
    let first_len = char_len(&first);
    if more && first_len > 0 && first_len < budget {
        return Some(if ends_sentence(&first) {
            first
        } else {
            with_ellipsis(&first)
        });
    }

    let kept = cut_at_whitespace(&normalized, budget - 1);
    Some(with_ellipsis(kept))
}

/// Trim every eligible over-budget block of a text body.
///
/// Blocks and the blank-line separators between them are otherwise kept
/// byte for byte. Returns the new body and the number of blocks trimmed.
#[must_use]
pub fn trim_text_body(text: &str, budget: usize, config: &DigestConfig) -> (String, usize) {
    let blocks = split_blocks(text);
    let mut out = String::with_capacity(text.len());
    let mut trimmed = 0;
    let mut previous: Option<&str> = None;

    for (block, separator) in &blocks {
        let replacement = if is_eligible_block(block, previous, config) {
            trim_block(block, budget)
        } else {
            None
        };
        match replacement {
            Some(new_block) => {
                out.push_str(&new_block);
                trimmed += 1;
            }
            None => out.push_str(block),
        }
        out.push_str(separator);
        previous = Some(*block);
    }

    debug!("Trimmed {trimmed} text blocks");
    (out, trimmed)
}
