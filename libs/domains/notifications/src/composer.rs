//! Plain-text message composition.
//!
//! Rendering is pure: the same snapshot and kind always yield the same
//! subject, body and recipient list.

use crate::config::NotificationConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::{EventKind, NotificationMessage};
use domain_blog::{BlogPost, PostSnapshot};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

const RECORD_TEMPLATE: &str = "record_change";
const DIGEST_TEMPLATE: &str = "daily_digest";

/// Builds notification messages from post snapshots.
pub struct NotificationComposer {
    handlebars: Handlebars<'static>,
    sender: String,
    digest_size: usize,
}

impl NotificationComposer {
    /// Create a composer with all templates registered.
    pub fn new(config: &NotificationConfig) -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_template_string(RECORD_TEMPLATE, RECORD_CHANGE_TEXT_TEMPLATE)?;
        handlebars.register_template_string(DIGEST_TEMPLATE, DAILY_DIGEST_TEXT_TEMPLATE)?;

        Ok(Self {
            handlebars,
            sender: config.default_sender.clone(),
            digest_size: config.digest_size.max(1),
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn digest_size(&self) -> usize {
        self.digest_size
    }

    /// Compose the message for a change to a single post.
    ///
    /// `Digest` is rejected; use [`compose_digest`](Self::compose_digest).
    pub fn compose(&self, kind: EventKind, snapshot: &PostSnapshot) -> NotificationResult<NotificationMessage> {
        let post = &snapshot.post;
        let (subject, headline, review, holders) = match kind {
            EventKind::Created => (
                format!("New Blog Post Created: {}", post.title),
                "A new blog post has been created and requires your attention:".to_string(),
                true,
                [&snapshot.publisher, &snapshot.editor],
            ),
            EventKind::Updated => (
                format!("Blog Post Updated: {}", post.title),
                "A blog post has been updated and requires your attention:".to_string(),
                true,
                [&snapshot.publisher, &snapshot.author],
            ),
            EventKind::Deleted => (
                format!("Blog Post Deleted: {}", post.title),
                format!("A blog post has been deleted by {}:", snapshot.publisher.username),
                false,
                [&snapshot.editor, &snapshot.author],
            ),
            EventKind::Published => (
                format!("Blog Post Published: {}", post.title),
                "A blog post has been published and is now live on the site:".to_string(),
                false,
                [&snapshot.author, &snapshot.editor],
            ),
            EventKind::Digest => return Err(NotificationError::UnsupportedEvent(kind)),
        };

        let recipients = recipient_set(holders.iter().map(|user| user.email.as_str()));
        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients(kind));
        }

        let body = self.render(
            RECORD_TEMPLATE,
            &json!({
                "headline": headline,
                "title": post.title,
                "category": post.category.label(),
                "author": snapshot.author.display_name(),
                "editor": snapshot.editor.display_name(),
                "review": review,
            }),
        )?;

        debug!(%kind, post_id = %post.id, recipients = recipients.len(), "Composed notification");

        Ok(NotificationMessage {
            kind,
            subject,
            body,
            sender: self.sender.clone(),
            recipients,
        })
    }

    /// Compose the daily digest.
    ///
    /// Lists at most `digest_size` posts, newest first by creation time,
    /// whatever order `posts` arrives in.
    pub fn compose_digest(&self, posts: &[BlogPost], recipients: &[String]) -> NotificationResult<NotificationMessage> {
        let recipients = recipient_set(recipients.iter().map(String::as_str));
        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients(EventKind::Digest));
        }

        let mut newest: Vec<&BlogPost> = posts.iter().collect();
        newest.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        newest.truncate(self.digest_size);

        let titles: Vec<&str> = newest.iter().map(|post| post.title.as_str()).collect();
        let body = self.render(DIGEST_TEMPLATE, &json!({ "titles": titles }))?;

        Ok(NotificationMessage {
            kind: EventKind::Digest,
            subject: "Exciting new blogs".to_string(),
            body,
            sender: self.sender.clone(),
            recipients,
        })
    }

    fn render<T: Serialize>(&self, template: &str, data: &T) -> NotificationResult<String> {
        Ok(self.handlebars.render(template, data)?)
    }
}

/// Trim, drop empties and dedupe case-insensitively, keeping first-seen order.
fn recipient_set<'a>(addresses: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut set: Vec<String> = Vec::new();
    for address in addresses.into_iter().map(str::trim) {
        if address.is_empty() || set.iter().any(|seen| seen.eq_ignore_ascii_case(address)) {
            continue;
        }
        set.push(address.to_string());
    }
    set
}

// ============================================================================
// Templates
// ============================================================================

const RECORD_CHANGE_TEXT_TEMPLATE: &str = r#"{{headline}}

Title: {{title}}
Category: {{category}}
Author: {{author}}
Editor: {{editor}}
{{#if review}}

Please review the content at your earliest convenience.
{{/if}}"#;

const DAILY_DIGEST_TEXT_TEMPLATE: &str = r#"Hi Users,

We're thrilled to share that some exciting new blog posts are now live on our website! Whether you're looking for insights, tips, or a dose of inspiration, there's something for everyone.

Check out the latest content and stay up to date with what's new:

{{#each titles}}
👉 {{this}}
{{/each}}

We'd love to hear your thoughts. Feel free to leave a comment or share with others who might find them helpful.

Happy reading!
Blog App
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain_blog::{Category, CreateBlogPost, CreateUser, Role, User};
    use uuid::Uuid;

    fn user(username: &str, first: &str, last: &str, role: Role) -> User {
        User::new(CreateUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            first_name: first.into(),
            last_name: last.into(),
            roles: vec![role],
        })
    }

    fn post(title: &str) -> BlogPost {
        BlogPost::new(CreateBlogPost {
            title: title.into(),
            content: "content".into(),
            image: "uploads/cover.png".into(),
            category: Category::PowerBi,
            author_id: Uuid::now_v7(),
            editor_id: Uuid::now_v7(),
            publisher_id: Uuid::now_v7(),
            publish_at: None,
        })
    }

    fn snapshot() -> PostSnapshot {
        PostSnapshot {
            post: post("Dashboards in practice"),
            author: user("ada", "Ada", "Lovelace", Role::Author),
            editor: user("ed", "", "", Role::Editor),
            publisher: user("pat", "Pat", "", Role::Publisher),
        }
    }

    fn composer() -> NotificationComposer {
        NotificationComposer::new(&NotificationConfig::new("blog@example.com")).unwrap()
    }

    #[test]
    fn test_recipient_table() {
        let composer = composer();
        let snapshot = snapshot();
        let cases = [
            (EventKind::Created, ["pat@example.com", "ed@example.com"]),
            (EventKind::Updated, ["pat@example.com", "ada@example.com"]),
            (EventKind::Deleted, ["ed@example.com", "ada@example.com"]),
            (EventKind::Published, ["ada@example.com", "ed@example.com"]),
        ];

        for (kind, expected) in cases {
            let message = composer.compose(kind, &snapshot).unwrap();
            assert_eq!(message.recipients, expected, "recipients for {kind}");
            assert_eq!(message.kind, kind);
            assert_eq!(message.sender, "blog@example.com");
        }
    }

    #[test]
    fn test_created_body() {
        let message = composer().compose(EventKind::Created, &snapshot()).unwrap();

        assert_eq!(message.subject, "New Blog Post Created: Dashboards in practice");
        assert!(message.body.starts_with("A new blog post has been created and requires your attention:"));
        assert!(message.body.contains("Title: Dashboards in practice"));
        assert!(message.body.contains("Category: PowerBI"));
        assert!(message.body.contains("Author: Ada Lovelace"));
        assert!(message.body.contains("Editor: ed"));
        assert!(message.body.contains("Please review the content at your earliest convenience."));
    }

    #[test]
    fn test_deleted_body_names_publisher() {
        let message = composer().compose(EventKind::Deleted, &snapshot()).unwrap();

        assert_eq!(message.subject, "Blog Post Deleted: Dashboards in practice");
        assert!(message.body.contains("deleted by pat"));
        assert!(!message.body.contains("Please review"));
    }

    #[test]
    fn test_published_body() {
        let message = composer().compose(EventKind::Published, &snapshot()).unwrap();
        assert_eq!(message.subject, "Blog Post Published: Dashboards in practice");
        assert!(message.body.contains("now live"));
    }

    #[test]
    fn test_shared_holder_is_deduplicated() {
        let mut snapshot = snapshot();
        snapshot.editor = snapshot.author.clone();
        snapshot.editor.email = "ADA@example.com ".into();

        let message = composer().compose(EventKind::Published, &snapshot).unwrap();
        assert_eq!(message.recipients, vec!["ada@example.com"]);
    }

    #[test]
    fn test_empty_addresses_fail_composition() {
        let mut snapshot = snapshot();
        snapshot.author.email = String::new();
        snapshot.editor.email = "  ".into();

        let err = composer().compose(EventKind::Published, &snapshot).unwrap_err();
        assert!(matches!(err, NotificationError::NoRecipients(EventKind::Published)));
    }

    #[test]
    fn test_digest_kind_rejected_for_single_post() {
        let err = composer().compose(EventKind::Digest, &snapshot()).unwrap_err();
        assert!(matches!(err, NotificationError::UnsupportedEvent(EventKind::Digest)));
        assert!(err.is_composition());
    }

    #[test]
    fn test_digest_lists_three_newest() {
        let base = Utc::now();
        let mut posts: Vec<BlogPost> = (0..5)
            .map(|i| {
                let mut p = post(&format!("Post {i}"));
                p.created_at = base + Duration::minutes(i);
                p
            })
            .collect();
        posts.swap(0, 4);
        posts.swap(1, 3);

        let recipients = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let message = composer().compose_digest(&posts, &recipients).unwrap();

        assert_eq!(message.subject, "Exciting new blogs");
        assert_eq!(message.kind, EventKind::Digest);
        assert_eq!(message.recipients, recipients);
        assert_eq!(message.body.matches("👉").count(), 3);

        let p4 = message.body.find("👉 Post 4").unwrap();
        let p3 = message.body.find("👉 Post 3").unwrap();
        let p2 = message.body.find("👉 Post 2").unwrap();
        assert!(p4 < p3 && p3 < p2);
        assert!(!message.body.contains("Post 1"));
        assert!(!message.body.contains("Post 0"));
    }

    #[test]
    fn test_digest_without_recipients() {
        let err = composer().compose_digest(&[post("Lonely")], &[String::new()]).unwrap_err();
        assert!(matches!(err, NotificationError::NoRecipients(EventKind::Digest)));
    }
}
