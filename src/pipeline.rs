//! The digest rewriting pipeline

use crate::annotate::{LinkTracking, annotate_links, annotate_markup};
use crate::config::DigestConfig;
use crate::dom::{Document, NodeId};
use crate::domain_swap::DomainSwap;
use crate::error::Result;
use crate::redirect::{Redirector, redirect_excerpt_links};
use crate::text_trim::trim_text_body;
use crate::topics::{TopicScan, count_html_topics, count_text_topics};
use crate::trim::{TrimPolicy, is_protected_excerpt, trim_excerpts};
use crate::types::{EmailId, EmailMessage, Recipient, TransformReport};
use rand::Rng;
use tracing::{debug, warn};

/// Rewrite a built digest message in place before it is delivered.
///
/// Failures never propagate: a stage that cannot run is logged and its part
/// of the message is left as it was.
pub fn transform_digest(
    message: &mut EmailMessage,
    recipient: &Recipient,
    config: &DigestConfig,
) -> TransformReport {
    transform_digest_with_rng(message, recipient, config, &mut rand::rng())
}

/// [`transform_digest`] with an explicit random source for the email id and
/// the swap target
pub fn transform_digest_with_rng<R: Rng>(
    message: &mut EmailMessage,
    recipient: &Recipient,
    config: &DigestConfig,
    rng: &mut R,
) -> TransformReport {
    let email_id = EmailId::generate(rng);
    let swap = if config.any_swap_enabled() {
        DomainSwap::new(config, config.pick_target_domain(rng))
    } else {
        None
    };
    let mut report = TransformReport {
        swap_domain: swap.as_ref().map(|s| s.target().to_string()),
        ..TransformReport::default()
    };
    let run = MessageRun {
        recipient,
        config,
        email_id: &email_id,
        swap: swap.as_ref(),
    };

    let html = message
        .html_body
        .as_deref()
        .filter(|html| !html.trim().is_empty())
        .map(|html| run.html(html, &mut report));
    if let Some(outcome) = html {
        match outcome {
            Ok(new_html) => message.html_body = Some(new_html),
            Err(e) => {
                warn!("Leaving HTML body untouched: {e}");
                report.html_skipped = true;
            }
        }
    }

    if let Some(text) = message.text_body.as_deref() {
        let new_text = run.text(text, &mut report);
        message.text_body = Some(new_text);
    }

    if let Some(swap) = &swap {
        report.hosts_swapped += swap.swap_headers(&mut message.headers);
    }

    debug!("Digest {email_id} rewritten: {report:?}");
    report
}

/// Per-message state shared by the HTML and text sides
struct MessageRun<'a> {
    recipient: &'a Recipient,
    config: &'a DigestConfig,
    email_id: &'a EmailId,
    swap: Option<&'a DomainSwap<'a>>,
}

impl MessageRun<'_> {
    fn html(&self, html: &str, report: &mut TransformReport) -> Result<String> {
        let tracking = LinkTracking::new(self.recipient, self.email_id);
        if !self.config.dom_enabled {
            let (mut out, annotated) = annotate_markup(html, &tracking, self.config);
            report.links_annotated = annotated;
            if let Some(swap) = self.swap {
                let (swapped, count) = swap.swap_markup_links(&out);
                out = swapped;
                report.hosts_swapped += count;
            }
            return Ok(out);
        }

        let excerpt_selectors = self.config.excerpt_selector_list();
        let topic_selectors = self.config.topic_name_selector_list();
        let (mut doc, matches) = Document::parse(
            html,
            &[excerpt_selectors.as_slice(), topic_selectors.as_slice()],
        )?;
        let mut matches = matches.into_iter();
        let excerpts = matches.next().unwrap_or_default();
        let topic_names = matches.next().unwrap_or_default();

        let phrases = self.config.phrases();
        let topics = count_html_topics(&TopicScan {
            doc: &doc,
            excerpts: &excerpts,
            topic_names: &topic_names,
            phrases: &phrases,
        });
        report.html_topics = Some(topics);

        let protected: Vec<NodeId> = excerpts
            .iter()
            .copied()
            .filter(|id| is_protected_excerpt(&doc, *id, self.config))
            .collect();
        let open: Vec<NodeId> = excerpts
            .iter()
            .copied()
            .filter(|id| !protected.iter().any(|p| p == id || doc.is_ancestor(*p, *id)))
            .collect();
        debug!(
            "{} excerpts, {} protected, topic count {topics}",
            excerpts.len(),
            protected.len()
        );

        report.links_annotated = annotate_links(&mut doc, &protected, &tracking, self.config);

        match Redirector::new(self.config, self.recipient.id, Some(self.email_id.clone())) {
            Ok(Some(redirector)) => {
                report.links_redirected =
                    redirect_excerpt_links(&mut doc, &redirector, &open, &topic_names);
            }
            Ok(None) => {}
            Err(e) => warn!("Content redirects disabled: {e}"),
        }

        if topics.is_multiple()
            && let Some(policy) = TrimPolicy::from_config(self.config)
        {
            report.excerpts_trimmed = trim_excerpts(&mut doc, &open, policy);
        }

        if let Some(swap) = self.swap {
            report.hosts_swapped += swap.swap_document(&mut doc, &protected);
        }

        Ok(doc.serialize())
    }

    fn text(&self, text: &str, report: &mut TransformReport) -> String {
        let topics = count_text_topics(text, &self.config.phrases());
        report.text_topics = Some(topics);

        let mut out = text.to_string();
        if topics.is_multiple()
            && let Some(budget) = self.config.text_budget()
        {
            let (trimmed, count) = trim_text_body(&out, budget, self.config);
            out = trimmed;
            report.text_blocks_trimmed = count;
        }
        if let Some(swap) = self.swap
            && self.config.text_links_enabled
        {
            let (swapped, count) = swap.text(&out);
            out = swapped;
            report.hosts_swapped += count;
        }
        out
    }
}
