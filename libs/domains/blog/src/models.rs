use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Blog post categories
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "python")]
    Python,
    #[sea_orm(string_value = "django")]
    Django,
    #[sea_orm(string_value = "powerbi")]
    PowerBi,
    #[sea_orm(string_value = "scrapy")]
    Scrapy,
}

impl Category {
    /// Human readable name used in emails.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Python => "Python",
            Category::Django => "Django",
            Category::PowerBi => "PowerBI",
            Category::Scrapy => "Scrapy",
        }
    }
}

/// Role groups. A user may belong to several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Author,
    Editor,
    Publisher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(input: CreateUser) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: input.username,
            email: input.email,
            first_name: input.first_name,
            last_name: input.last_name,
            roles: input.roles,
            created_at: Utc::now(),
        }
    }

    /// Full name when one is set, otherwise the username.
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_string()
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// A blog post and its publication state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Stored image path, e.g. `uploads/cover.png`
    pub image: String,
    pub category: Category,
    pub author_id: Uuid,
    pub editor_id: Uuid,
    pub publisher_id: Uuid,
    pub published: bool,
    pub publish_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn new(input: CreateBlogPost) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            content: input.content,
            image: input.image,
            category: input.category,
            author_id: input.author_id,
            editor_id: input.editor_id,
            publisher_id: input.publisher_id,
            published: false,
            publish_at: input.publish_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unpublished with a publication time at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.published && self.publish_at.is_some_and(|at| at <= now)
    }

    /// Apply a partial update. Never touches `published`.
    pub fn apply_update(&mut self, update: UpdateBlogPost) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(image) = update.image {
            self.image = image;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(author_id) = update.author_id {
            self.author_id = author_id;
        }
        if let Some(editor_id) = update.editor_id {
            self.editor_id = editor_id;
        }
        if let Some(publisher_id) = update.publisher_id {
            self.publisher_id = publisher_id;
        }
        if let Some(publish_at) = update.publish_at {
            self.publish_at = Some(publish_at);
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct CreateBlogPost {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(min = 1, max = 255))]
    pub image: String,
    pub category: Category,
    pub author_id: Uuid,
    pub editor_id: Uuid,
    pub publisher_id: Uuid,
    pub publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct UpdateBlogPost {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub image: Option<String>,
    pub category: Option<Category>,
    pub author_id: Option<Uuid>,
    pub editor_id: Option<Uuid>,
    pub publisher_id: Option<Uuid>,
    pub publish_at: Option<DateTime<Utc>>,
}

/// Query filters for listing posts
#[derive(Debug, Clone, Deserialize)]
pub struct BlogFilter {
    pub category: Option<Category>,
    pub published: Option<bool>,
    pub author_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for BlogFilter {
    fn default() -> Self {
        Self {
            category: None,
            published: None,
            author_id: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl BlogFilter {
    pub fn matches(&self, post: &BlogPost) -> bool {
        self.category.is_none_or(|c| post.category == c)
            && self.published.is_none_or(|p| post.published == p)
            && self.author_id.is_none_or(|a| post.author_id == a)
    }
}

/// Content changes that produce notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentEvent {
    Created,
    Updated,
    Deleted,
    Published,
}

/// A post with its role holders resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSnapshot {
    pub post: BlogPost,
    pub author: User,
    pub editor: User,
    pub publisher: User,
}
