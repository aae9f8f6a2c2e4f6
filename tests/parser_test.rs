use digest_rewrite::{DigestConfig, EmailMessage, Recipient, transform_digest};

#[test]
fn test_parse_multipart_digest() {
    let raw = b"From: Forum <digest@forum.example.com>\r\n\
                To: a@b.com\r\n\
                Subject: Your weekly digest\r\n\
                Message-ID: <digest-1@forum.example.com>\r\n\
                List-Unsubscribe: <https://forum.example.com/email/unsubscribe/k>\r\n\
                MIME-Version: 1.0\r\n\
                Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
                \r\n\
                --XYZ\r\n\
                Content-Type: text/plain; charset=utf-8\r\n\
                \r\n\
                Plain digest body\r\n\
                --XYZ\r\n\
                Content-Type: text/html; charset=utf-8\r\n\
                \r\n\
                <p>Html digest body</p>\r\n\
                --XYZ--\r\n";

    let message = EmailMessage::parse(raw).unwrap();

    assert!(message.text_body.as_deref().unwrap().contains("Plain digest body"));
    assert!(message.html_body.as_deref().unwrap().contains("<p>Html digest body</p>"));
    assert_eq!(message.headers.get("subject"), Some("Your weekly digest"));
    assert_eq!(
        message.headers.get("Message-ID"),
        Some("<digest-1@forum.example.com>")
    );
    assert_eq!(message.headers.len(), 7);
}

#[test]
fn test_parse_single_html_part() {
    let raw = b"From: digest@forum.example.com\r\n\
                Subject: Digest\r\n\
                Content-Type: text/html; charset=utf-8\r\n\
                \r\n\
                <p><a href=\"/t/welcome/42\">Welcome</a></p>";

    let message = EmailMessage::parse(raw).unwrap();

    assert!(message.text_body.is_none());
    assert!(message.html_body.as_deref().unwrap().contains("/t/welcome/42"));
}

#[test]
fn test_parse_plain_message() {
    let raw = b"From: digest@forum.example.com\r\n\
                Subject: Digest\r\n\
                \r\n\
                Just text";

    let message = EmailMessage::parse(raw).unwrap();

    assert!(message.html_body.is_none());
    assert_eq!(message.text_body.as_deref(), Some("Just text"));
}

#[test]
fn test_parsed_message_feeds_pipeline() {
    let raw = b"From: digest@forum.example.com\r\n\
                Subject: Digest\r\n\
                Content-Type: text/html; charset=utf-8\r\n\
                \r\n\
                <p><a href=\"/t/welcome/42\">Welcome</a></p>";
    let config = DigestConfig {
        origin_domain: "forum.example.com".into(),
        ..DigestConfig::default()
    };

    let mut message = EmailMessage::parse(raw).unwrap();
    let report = transform_digest(&mut message, &Recipient::new(7, "a@b.com"), &config);

    assert_eq!(report.links_annotated, 1);
    assert!(message.html_body.unwrap().contains("u=7"));
}
