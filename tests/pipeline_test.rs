use digest_rewrite::url_utils::decode_token;
use digest_rewrite::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn long_words() -> String {
    (0..=50)
        .map(|i| format!("word{i:02}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn digest_config() -> DigestConfig {
    DigestConfig {
        origin_domain: "forum.example.com".into(),
        html_max_chars: 300,
        text_max_chars: 300,
        redirector_path: "/content-redirect".into(),
        tracking_param_names: vec!["digest_ref".into()],
        ..DigestConfig::default()
    }
}

fn digest_html() -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Digest</title></head><body>
<table>
<tr><td class="digest-topic-name"><a href="https://forum.example.com/t/first/11">First</a></td></tr>
<tr><td><div class="digest-post-excerpt"><p><a href="https://shop.example.org/item/&tag=aff">shop</a> {}</p></div></td></tr>
<tr><td class="digest-topic-name"><a href="https://forum.example.com/t/second/22">Second</a></td></tr>
<tr><td><div class="digest-post-excerpt">Short second excerpt.</div></td></tr>
<tr><td><h3>Popular Posts</h3></td></tr>
<tr><td class="digest-topic-name"><a href="https://forum.example.com/t/third/33">Third</a></td></tr>
</table>
<p><a href="https://forum.example.com/email/unsubscribe/abc">Unsubscribe</a></p>
</body></html>"#,
        long_words()
    )
}

fn digest_text() -> String {
    format!(
        "Your digest\n\n\
         https://forum.example.com/t/first/11\n\n\
         {}\n\n\
         https://forum.example.com/t/second/22\n\n\
         Short second excerpt.\n\n\
         Popular Posts\n\n\
         https://forum.example.com/t/third/33\n\n\
         Unsubscribe: https://forum.example.com/email/unsubscribe/abc\n",
        long_words()
    )
}

fn recipient() -> Recipient {
    Recipient::new(7, "a@b.com")
}

#[test]
fn test_full_digest() {
    let mut message = EmailMessage::new(Some(digest_html()), Some(digest_text()));
    let mut rng = StdRng::seed_from_u64(1);

    let report =
        transform_digest_with_rng(&mut message, &recipient(), &digest_config(), &mut rng);

    assert_eq!(report.html_topics, Some(TopicCount::Known(2)));
    assert_eq!(report.text_topics, Some(TopicCount::Known(2)));
    assert_eq!(report.links_annotated, 3);
    assert_eq!(report.links_redirected, 1);
    assert_eq!(report.excerpts_trimmed, 1);
    assert_eq!(report.text_blocks_trimmed, 1);
    assert!(report.swap_domain.is_none());
    assert_eq!(report.hosts_swapped, 0);
    assert!(!report.html_skipped);

    let html = message.html_body.unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("https://forum.example.com/t/first/11?isdigest=1&amp;u=7&amp;dayofweek=YUBiLmNvbQ&amp;email_id="));
    assert!(html.contains(r#"href="https://forum.example.com/email/unsubscribe/abc""#));
    assert!(html.contains("word41…"));
    assert!(!html.contains("word42"));
    assert!(html.contains("Short second excerpt."));

    let start = html.find("/content-redirect?url=").unwrap();
    let end = start + html[start..].find('"').unwrap();
    let token = &html[start + "/content-redirect?url=".len()..end];
    let destination = decode_token(token).unwrap();
    assert!(destination.starts_with("https://shop.example.org/item/?tag=aff&email_id="));
    assert!(destination.contains("&digest_ref=7-11-"));

    let text = message.text_body.unwrap();
    assert!(text.contains("word41…\n\nhttps://forum.example.com/t/second/22"));
    assert!(text.contains("Unsubscribe: https://forum.example.com/email/unsubscribe/abc\n"));
}

#[test]
fn test_email_id_shared_across_links() {
    let mut message = EmailMessage::new(Some(digest_html()), None);
    let mut rng = StdRng::seed_from_u64(9);

    transform_digest_with_rng(&mut message, &recipient(), &digest_config(), &mut rng);

    let html = message.html_body.unwrap();
    let marker = "email_id=";
    let start = html.find(marker).unwrap() + marker.len();
    let email_id = &html[start..start + EmailId::DIGITS];
    assert!(email_id.chars().all(|c| c.is_ascii_digit()));

    let token_start = html.find("/content-redirect?url=").unwrap() + "/content-redirect?url=".len();
    let token_end = token_start + html[token_start..].find('"').unwrap();
    let destination = decode_token(&html[token_start..token_end]).unwrap();
    assert!(destination.contains(&format!("email_id={email_id}")));
    assert!(destination.ends_with(&format!("digest_ref=7-11-{email_id}")));
}

#[test]
fn test_single_topic_is_not_trimmed() {
    let html = format!(
        r#"<div class="digest-topic-name"><a href="/t/only/5">Only</a></div><div class="digest-post-excerpt">{}</div>"#,
        long_words()
    );
    let mut message = EmailMessage::new(Some(html), None);

    let report = transform_digest(&mut message, &recipient(), &digest_config());

    assert_eq!(report.html_topics, Some(TopicCount::Known(1)));
    assert_eq!(report.excerpts_trimmed, 0);
    assert!(message.html_body.unwrap().contains("word50"));
}

#[test]
fn test_unknown_count_still_trims() {
    let html = format!(
        r#"<div class="digest-post-excerpt">{}</div><h3>Popular posts</h3><a href="/t/a/1">a</a>"#,
        long_words()
    );
    let mut message = EmailMessage::new(Some(html), None);

    let report = transform_digest(&mut message, &recipient(), &digest_config());

    assert_eq!(report.html_topics, Some(TopicCount::Unknown));
    assert_eq!(report.excerpts_trimmed, 1);
    assert!(message.html_body.unwrap().contains("word41…"));
}

#[test]
fn test_protected_excerpt_untouched() {
    let html = format!(
        r#"<a href="/t/a/1">a</a><a href="/t/b/2">b</a><div class="digest-post-excerpt"><a href="https://x.org/">x</a> {} <a href="/my/preferences">prefs</a></div>"#,
        long_words()
    );
    let mut message = EmailMessage::new(Some(html), None);

    let report = transform_digest(&mut message, &recipient(), &digest_config());

    assert_eq!(report.html_topics, Some(TopicCount::Known(2)));
    assert_eq!(report.links_redirected, 0);
    assert_eq!(report.excerpts_trimmed, 0);
    let html = message.html_body.unwrap();
    assert!(html.contains(r#"<a href="https://x.org/">x</a>"#));
    assert!(html.contains("word50"));
}

#[test]
fn test_domain_swap_across_message() {
    let config = DigestConfig {
        origin_domain: "example.com".into(),
        target_domains: vec!["mirror.example.net".into()],
        html_links_enabled: true,
        text_links_enabled: true,
        headers_enabled: true,
        ..DigestConfig::default()
    };
    let mut message = EmailMessage::new(
        Some(r#"<p><a href="https://example.com/t/a/1">A</a> <a href="https://example.com/email/unsubscribe/x">U</a></p>"#.into()),
        Some("Read https://example.com/t/a/1 now".into()),
    );
    message
        .headers
        .set("List-Unsubscribe", "<https://example.com/email/unsubscribe/x>");

    let report = transform_digest(&mut message, &recipient(), &config);

    assert_eq!(report.swap_domain.as_deref(), Some("mirror.example.net"));
    assert_eq!(report.hosts_swapped, 3);
    let html = message.html_body.unwrap();
    assert!(html.contains(r#"href="https://mirror.example.net/t/a/1?isdigest=1"#));
    assert!(html.contains(r#"href="https://example.com/email/unsubscribe/x""#));
    assert_eq!(
        message.text_body.as_deref(),
        Some("Read https://mirror.example.net/t/a/1 now")
    );
    assert_eq!(
        message.headers.get("List-Unsubscribe"),
        Some("<https://mirror.example.net/email/unsubscribe/x>")
    );
}

#[test]
fn test_parser_switched_off() {
    let config = DigestConfig {
        dom_enabled: false,
        ..digest_config()
    };
    let html = format!(
        "<div class='digest-post-excerpt'><a href='/t/a/1'>a</a> {}</div>",
        long_words()
    );
    let mut message = EmailMessage::new(Some(html), None);

    let report = transform_digest(&mut message, &recipient(), &config);

    assert_eq!(report.links_annotated, 1);
    assert!(report.html_topics.is_none());
    assert_eq!(report.excerpts_trimmed, 0);
    let html = message.html_body.unwrap();
    assert!(html.contains("href='/t/a/1?isdigest=1&amp;u=7"));
    assert!(html.contains("word50"));
}

#[test]
fn test_empty_html_left_alone() {
    let mut message = EmailMessage::new(Some("   ".into()), None);
    let report = transform_digest(&mut message, &recipient(), &digest_config());

    assert_eq!(message.html_body.as_deref(), Some("   "));
    assert!(report.html_topics.is_none());
    assert!(!report.html_skipped);
}

#[test]
fn test_seeded_runs_are_deterministic() {
    let run = |seed| {
        let mut message = EmailMessage::new(Some(digest_html()), Some(digest_text()));
        let mut rng = StdRng::seed_from_u64(seed);
        transform_digest_with_rng(&mut message, &recipient(), &digest_config(), &mut rng);
        message.html_body
    };
    assert_eq!(run(4), run(4));
}

#[test]
fn test_unconfigured_pipeline_changes_nothing_visible() {
    let html = r#"<p><a href="/t/a/1">a</a></p>"#;
    let mut message = EmailMessage::new(Some(html.into()), Some("text".into()));

    let report = transform_digest(&mut message, &recipient(), &DigestConfig::default());

    assert_eq!(report.links_annotated, 0);
    assert_eq!(message.html_body.as_deref(), Some(html));
    assert_eq!(message.text_body.as_deref(), Some("text"));
}
