//! Email templates.
//!
//! Rendering is a pure function of kind, message and metadata. Missing
//! metadata keys render as empty strings.

use pulldown_cmark_escape::{escape_href, escape_html};

use crate::database::models::{Metadata, NotificationKind, metadata_str};

const FOOTER: &str = "This is an automated notification from your RSS aggregator.";

/// Subject and bodies for one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Escape text for an HTML element body.
fn html_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    escape_html(&mut out, input).expect("writing to a String cannot fail");
    out
}

/// Escape a URL for an `href` attribute.
fn html_href(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    escape_href(&mut out, input).expect("writing to a String cannot fail");
    out
}

fn wrap_html(heading: &str, paragraphs: &[String]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("        <p>{p}</p>\n"))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<body>
    <div>
        <h2>{heading}</h2>
{body}        <hr>
        <p><small>{FOOTER}</small></p>
    </div>
</body>
</html>"#
    )
}

/// Render the email for a notification.
pub fn render_email(kind: &NotificationKind, message: &str, metadata: &Metadata) -> RenderedEmail {
    match kind {
        NotificationKind::NewPost => {
            let post_title = metadata_str(metadata, "post_title");
            let feed_name = metadata_str(metadata, "feed_name");
            let post_url = metadata_str(metadata, "post_url");

            let mut paragraphs = vec![
                format!(
                    "A new post titled <strong>{}</strong> is available in the feed <strong>{}</strong> that you follow.",
                    html_text(post_title),
                    html_text(feed_name)
                ),
                format!("Message: {}", html_text(message)),
            ];
            let mut text_body = format!(
                "A new post titled \"{post_title}\" is available in the feed \"{feed_name}\" that you follow.\n\nMessage: {message}\n"
            );
            if !post_url.is_empty() {
                let url = html_href(post_url);
                paragraphs.push(format!(r#"<a href="{url}">Read the post</a>"#));
                text_body.push_str(&format!("\nRead the post: {post_url}\n"));
            }
            text_body.push_str(&format!("\n{FOOTER}\n"));

            RenderedEmail {
                subject: format!("New Post in {feed_name}"),
                html_body: wrap_html("New Post Available", &paragraphs),
                text_body,
            }
        }
        NotificationKind::FeedStarred => {
            let follow_up = "You will now receive notifications when new posts are available in this feed.";
            RenderedEmail {
                subject: "Feed Starred Confirmation".to_string(),
                html_body: wrap_html(
                    "Feed Starred",
                    &[html_text(message), follow_up.to_string()],
                ),
                text_body: format!("{message}\n\n{follow_up}\n\n{FOOTER}\n"),
            }
        }
        NotificationKind::Other(_) => RenderedEmail {
            subject: "RSS Aggregator Notification".to_string(),
            html_body: wrap_html("Notification", &[html_text(message)]),
            text_body: format!("{message}\n\n{FOOTER}\n"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_new_post_template() {
        let md = metadata(&[
            ("post_title", "Breaking News"),
            ("feed_name", "Daily <Times>"),
            ("post_url", "https://example.com/p/1"),
        ]);
        let email = render_email(&NotificationKind::NewPost, "New post: Breaking News", &md);

        assert_eq!(email.subject, "New Post in Daily <Times>");
        assert!(email.html_body.contains("<strong>Breaking News</strong>"));
        assert!(email.html_body.contains("Daily &lt;Times&gt;"));
        assert!(email.html_body.contains(r#"href="https://example.com/p/1""#));
        assert!(email.text_body.contains("Read the post: https://example.com/p/1"));
        assert!(email.html_body.contains(FOOTER));
    }

    #[test]
    fn test_markup_in_metadata_is_escaped() {
        let md = metadata(&[
            ("post_title", "<script>alert(1)</script>"),
            ("feed_name", "Tom & Jerry"),
            ("post_url", r#"https://example.com/a b"onmouseover="x"#),
        ]);
        let email = render_email(&NotificationKind::NewPost, "New post: <b>", &md);

        assert!(email.html_body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!email.html_body.contains("<script>"));
        assert!(email.html_body.contains("Tom &amp; Jerry"));
        assert!(email.html_body.contains("Message: New post: &lt;b&gt;"));
        assert!(email.html_body.contains(r#"href="https://example.com/a%20b%22onmouseover=%22x""#));
        // Plain text keeps the raw values.
        assert!(email.text_body.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn test_new_post_missing_metadata() {
        let email = render_email(&NotificationKind::NewPost, "New post: ?", &Metadata::new());
        assert_eq!(email.subject, "New Post in ");
        assert!(email.html_body.contains("<strong></strong>"));
        assert!(!email.html_body.contains("href="));
    }

    #[test]
    fn test_feed_starred_template() {
        let email = render_email(
            &NotificationKind::FeedStarred,
            "You have starred the feed: Rust Blog",
            &Metadata::new(),
        );
        assert_eq!(email.subject, "Feed Starred Confirmation");
        assert!(email.html_body.contains("You have starred the feed: Rust Blog"));
        assert!(email.text_body.contains("You will now receive notifications"));
    }

    #[test]
    fn test_unknown_kind_uses_generic_template() {
        let email = render_email(
            &NotificationKind::Other("digest".to_string()),
            "Your weekly digest",
            &metadata(&[("unexpected", "value")]),
        );
        assert_eq!(email.subject, "RSS Aggregator Notification");
        assert!(email.html_body.contains("<h2>Notification</h2>"));
        assert!(email.text_body.ends_with(&format!("{FOOTER}\n")));
    }
}
