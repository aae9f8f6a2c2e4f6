use digest_rewrite::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

// --- EmailId ---

#[test]
fn test_email_id_from_number_is_zero_padded() {
    let id = EmailId::from_number(42);
    assert_eq!(id.as_str(), "00000000000000000042");
    assert_eq!(id.as_str().len(), EmailId::DIGITS);
}

#[test]
fn test_email_id_generate_digits() {
    let mut rng = StdRng::seed_from_u64(7);
    let id = EmailId::generate(&mut rng);
    assert_eq!(id.as_str().len(), 20);
    assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_email_id_generate_is_seeded() {
    let a = EmailId::generate(&mut StdRng::seed_from_u64(3));
    let b = EmailId::generate(&mut StdRng::seed_from_u64(3));
    assert_eq!(a, b);
}

#[test]
fn test_email_id_display() {
    assert_eq!(EmailId::from_number(5).to_string(), "00000000000000000005");
}

// --- TopicCount ---

#[test]
fn test_topic_count_is_multiple() {
    assert!(!TopicCount::Known(0).is_multiple());
    assert!(!TopicCount::Known(1).is_multiple());
    assert!(TopicCount::Known(2).is_multiple());
    assert!(TopicCount::Unknown.is_multiple());
}

#[test]
fn test_topic_count_display() {
    assert_eq!(TopicCount::Known(3).to_string(), "3");
    assert_eq!(TopicCount::Unknown.to_string(), "unknown");
}

#[test]
fn test_topic_keys_dedupe() {
    let keys: TopicKeys = [
        TopicKey::Id(11),
        TopicKey::Id(11),
        TopicKey::Title("hello".into()),
    ]
    .into_iter()
    .collect();
    assert_eq!(keys.len(), 2);
    assert_eq!(TopicKey::Id(11).to_string(), "id:11");
}

// --- TrackingContext ---

#[test]
fn test_tracking_value_with_topic() {
    let context = TrackingContext {
        user_id: 7,
        topic_id: Some(42),
        email_id: Some(EmailId::from_number(1)),
    };
    assert_eq!(
        context.value().as_deref(),
        Some("7-42-00000000000000000001")
    );
}

#[test]
fn test_tracking_value_without_topic() {
    let context = TrackingContext {
        user_id: 7,
        topic_id: None,
        email_id: Some(EmailId::from_number(1)),
    };
    assert_eq!(context.value().as_deref(), Some("7--00000000000000000001"));
}

#[test]
fn test_tracking_value_requires_email_id() {
    let context = TrackingContext {
        user_id: 7,
        topic_id: Some(42),
        email_id: None,
    };
    assert!(context.value().is_none());
}

// --- Headers ---

#[test]
fn test_headers_case_insensitive() {
    let mut headers: Headers = [("Message-ID", "<a@b>"), ("Subject", "Hi")]
        .into_iter()
        .collect();
    assert_eq!(headers.get("message-id"), Some("<a@b>"));

    headers.set("SUBJECT", "Hello");
    assert_eq!(headers.get("Subject"), Some("Hello"));
    assert_eq!(headers.len(), 2);

    headers.set("List-Unsubscribe", "<https://x/u>");
    assert_eq!(headers.len(), 3);
}

#[test]
fn test_headers_values_mut_visits_all() {
    let mut headers: Headers = [("X-Tag", "a"), ("Other", "b"), ("x-tag", "c")]
        .into_iter()
        .collect();
    for value in headers.values_mut("X-Tag") {
        value.push('!');
    }
    assert_eq!(headers.all[0].1, "a!");
    assert_eq!(headers.all[1].1, "b");
    assert_eq!(headers.all[2].1, "c!");
}

// --- DigestConfig ---

#[test]
fn test_config_defaults() {
    let config = DigestConfig::default();
    assert!(config.dom_enabled);
    assert_eq!(config.redirector_param, "url");
    assert_eq!(config.topic_id_attribute, "data-topic-id");
    assert!(config.html_budget().is_none());
    assert!(config.origin().is_none());
    assert!(!config.any_swap_enabled());
}

#[test]
fn test_config_from_json() {
    let config = DigestConfig::from_json(
        r#"{"origin_domain": "Forum.Example.com.", "html_max_chars": 250, "html_links_enabled": true}"#,
    )
    .unwrap();
    assert_eq!(config.origin().as_deref(), Some("forum.example.com"));
    assert_eq!(config.html_budget(), Some(250));
    assert!(config.any_swap_enabled());
    assert_eq!(config.excerpt_selectors, DigestConfig::default().excerpt_selectors);
}

#[test]
fn test_config_wrong_shapes_fall_back() {
    let config = DigestConfig::from_json(
        r#"{"html_max_chars": "abc", "target_domains": "mirror.net", "dom_enabled": "yes", "headers_enabled": 1}"#,
    )
    .unwrap();
    assert_eq!(config.html_max_chars, 0);
    assert!(config.html_budget().is_none());
    assert!(config.target_domains.is_empty());
    assert!(config.dom_enabled);
    assert!(!config.headers_enabled);
}

#[test]
fn test_config_negative_budget_disables_trimming() {
    let config = DigestConfig {
        html_max_chars: -5,
        text_max_chars: 0,
        ..DigestConfig::default()
    };
    assert!(config.html_budget().is_none());
    assert!(config.text_budget().is_none());
}

#[test]
fn test_config_invalid_json() {
    let result = DigestConfig::from_json("{");
    assert!(matches!(result, Err(TransformError::Config(_))));
}

#[test]
fn test_config_invalid_selector_skipped() {
    let config = DigestConfig {
        excerpt_selectors: vec!["..bad".into(), ".ok".into(), String::new()],
        ..DigestConfig::default()
    };
    assert_eq!(config.excerpt_selector_list().len(), 1);
}

#[test]
fn test_config_never_touch_case_insensitive() {
    let config = DigestConfig::default();
    assert!(config.is_never_touch("https://x.com/Email/Unsubscribe/abc"));
    assert!(!config.is_never_touch("https://x.com/t/topic/1"));
    assert!(config.is_protected_text("Manage your Preferences here"));
}

#[test]
fn test_pick_target_domain() {
    let config = DigestConfig {
        origin_domain: "example.com".into(),
        target_domains: vec!["a.net".into(), " B.net. ".into(), String::new()],
        ..DigestConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let picked = config.pick_target_domain(&mut rng).unwrap();
        assert!(picked == "a.net" || picked == "b.net");
    }
}

#[test]
fn test_pick_target_domain_needs_origin() {
    let config = DigestConfig {
        target_domains: vec!["a.net".into()],
        ..DigestConfig::default()
    };
    assert!(config.pick_target_domain(&mut StdRng::seed_from_u64(1)).is_none());
}
