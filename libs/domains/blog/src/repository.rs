use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{BlogError, BlogResult};
use crate::models::{BlogFilter, BlogPost, CreateBlogPost, UpdateBlogPost};

/// Repository trait for blog post persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, input: CreateBlogPost) -> BlogResult<BlogPost>;

    async fn get_by_id(&self, id: Uuid) -> BlogResult<Option<BlogPost>>;

    /// Newest first
    async fn list(&self, filter: BlogFilter) -> BlogResult<Vec<BlogPost>>;

    /// Apply a partial update. Fails with `NotFound` for unknown ids.
    async fn update(&self, id: Uuid, input: UpdateBlogPost) -> BlogResult<BlogPost>;

    async fn delete(&self, id: Uuid) -> BlogResult<bool>;

    /// Unpublished posts whose `publish_at` is at or before `now`, oldest schedule first.
    async fn list_due(&self, now: DateTime<Utc>) -> BlogResult<Vec<BlogPost>>;

    /// Flip `published` to true, but only while the post is still unpublished
    /// and due at `now`.
    ///
    /// Returns `false` when no row changed, e.g. another sweep got there first.
    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> BlogResult<bool>;

    /// The `limit` most recently created posts, newest first.
    async fn recent(&self, limit: usize) -> BlogResult<Vec<BlogPost>>;
}

/// In-memory implementation of BlogRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlogRepository {
    posts: Arc<RwLock<HashMap<Uuid, BlogPost>>>,
}

impl InMemoryBlogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fully formed post as-is. Handy for seeding timestamps in tests.
    pub async fn insert(&self, post: BlogPost) {
        self.posts.write().await.insert(post.id, post);
    }
}

fn newest_first(posts: &mut [BlogPost]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[async_trait]
impl BlogRepository for InMemoryBlogRepository {
    async fn create(&self, input: CreateBlogPost) -> BlogResult<BlogPost> {
        let post = BlogPost::new(input);
        self.posts.write().await.insert(post.id, post.clone());

        tracing::info!(post_id = %post.id, "Created blog post");
        Ok(post)
    }

    async fn get_by_id(&self, id: Uuid) -> BlogResult<Option<BlogPost>> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: BlogFilter) -> BlogResult<Vec<BlogPost>> {
        let posts = self.posts.read().await;
        let mut result: Vec<BlogPost> = posts.values().filter(|p| filter.matches(p)).cloned().collect();
        newest_first(&mut result);

        Ok(result
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn update(&self, id: Uuid, input: UpdateBlogPost) -> BlogResult<BlogPost> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&id).ok_or(BlogError::NotFound(id))?;
        post.apply_update(input);

        tracing::info!(post_id = %id, "Updated blog post");
        Ok(post.clone())
    }

    async fn delete(&self, id: Uuid) -> BlogResult<bool> {
        let removed = self.posts.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(post_id = %id, "Deleted blog post");
        }
        Ok(removed)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> BlogResult<Vec<BlogPost>> {
        let posts = self.posts.read().await;
        let mut due: Vec<BlogPost> = posts.values().filter(|p| p.is_due(now)).cloned().collect();
        due.sort_by_key(|p| (p.publish_at, p.id));
        Ok(due)
    }

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> BlogResult<bool> {
        let mut posts = self.posts.write().await;
        match posts.get_mut(&id) {
            Some(post) if post.is_due(now) => {
                post.published = true;
                post.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recent(&self, limit: usize) -> BlogResult<Vec<BlogPost>> {
        let posts = self.posts.read().await;
        let mut result: Vec<BlogPost> = posts.values().cloned().collect();
        newest_first(&mut result);
        result.truncate(limit);
        Ok(result)
    }
}
