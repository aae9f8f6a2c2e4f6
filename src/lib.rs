// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Digest Rewriter
//!
//! Post-processes a generated forum digest email right before it is sent.
//! The host builds the message, hands it over once, and delivers whatever
//! comes back; nothing here can stop delivery.
//!
//! # Features
//!
//! - Tracking parameters on internal links
//! - Excerpt links routed through a first-party redirect endpoint
//! - Topic counting scoped above the "popular posts" section
//! - Markup-preserving forward trimming of excerpts when several topics are shown
//! - Block trimming of the plain-text part
//! - Per-message hostname substitution across HTML, text and headers
//!
//! # Example
//!
//! ```rust
//! use digest_rewrite::{DigestConfig, EmailMessage, Recipient, transform_digest};
//!
//! let config = DigestConfig {
//!     origin_domain: "forum.example.com".into(),
//!     ..DigestConfig::default()
//! };
//! let mut message = EmailMessage::new(
//!     Some(r#"<p><a href="/t/welcome/42">Welcome</a></p>"#.into()),
//!     None,
//! );
//! let report = transform_digest(&mut message, &Recipient::new(7, "a@b.com"), &config);
//!
//! assert_eq!(report.links_annotated, 1);
//! assert!(message.html_body.unwrap().contains("isdigest=1"));
//! ```

pub mod annotate;
mod config;
pub mod dom;
pub mod domain_swap;
mod error;
mod parser;
mod pipeline;
pub mod redirect;
pub mod text_trim;
pub mod topics;
pub mod trim;
mod types;
pub mod url_utils;

pub use config::DigestConfig;
pub use error::{Result, TransformError};
pub use pipeline::{transform_digest, transform_digest_with_rng};
pub use types::*;
