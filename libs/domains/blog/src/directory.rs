use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{BlogError, BlogResult};
use crate::models::{BlogPost, CreateUser, PostSnapshot, User};

/// Lookup of user identities, emails and role membership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>>;

    /// Every known user, oldest first.
    async fn list_users(&self) -> BlogResult<Vec<User>>;

    async fn create_user(&self, input: CreateUser) -> BlogResult<User>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_users(&self) -> BlogResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn create_user(&self, input: CreateUser) -> BlogResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == input.username) {
            return Err(BlogError::Validation(format!(
                "username '{}' is already taken",
                input.username
            )));
        }

        let user = User::new(input);
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

async fn role_holder<D: UserDirectory + ?Sized>(directory: &D, post_id: Uuid, user_id: Uuid) -> BlogResult<User> {
    directory
        .get_user(user_id)
        .await?
        .ok_or(BlogError::MissingRoleHolder { post_id, user_id })
}

/// Load the author, editor and publisher of `post`.
pub async fn resolve_snapshot<D: UserDirectory + ?Sized>(directory: &D, post: BlogPost) -> BlogResult<PostSnapshot> {
    let author = role_holder(directory, post.id, post.author_id).await?;
    let editor = role_holder(directory, post.id, post.editor_id).await?;
    let publisher = role_holder(directory, post.id, post.publisher_id).await?;

    Ok(PostSnapshot {
        post,
        author,
        editor,
        publisher,
    })
}
