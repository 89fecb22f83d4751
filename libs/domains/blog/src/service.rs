use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::directory::{UserDirectory, resolve_snapshot};
use crate::error::{BlogError, BlogResult};
use crate::models::{
    BlogFilter, BlogPost, ContentEvent, CreateBlogPost, PostSnapshot, Role, UpdateBlogPost, User,
};
use crate::notifier::ChangeNotifier;
use crate::repository::BlogRepository;

const ANY_ROLE: &[Role] = &[Role::Author, Role::Editor, Role::Publisher];
const REVIEWERS: &[Role] = &[Role::Editor, Role::Publisher];

/// Role-gated CRUD over blog posts.
///
/// Every successful mutation is reported to the `ChangeNotifier` after the
/// repository call returns.
pub struct BlogService<R, D, N>
where
    R: BlogRepository,
    D: UserDirectory,
    N: ChangeNotifier,
{
    repository: Arc<R>,
    directory: Arc<D>,
    notifier: Arc<N>,
}

impl<R, D, N> Clone for BlogService<R, D, N>
where
    R: BlogRepository,
    D: UserDirectory,
    N: ChangeNotifier,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            directory: Arc::clone(&self.directory),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<R, D, N> BlogService<R, D, N>
where
    R: BlogRepository,
    D: UserDirectory,
    N: ChangeNotifier,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            directory,
            notifier,
        }
    }

    /// Any role may create. The editor and publisher must hold those roles.
    pub async fn create_post(&self, actor: &User, input: CreateBlogPost) -> BlogResult<BlogPost> {
        require_role(actor, ANY_ROLE, "create")?;
        input.validate()?;

        let author = self.load_holder(input.author_id, None).await?;
        let editor = self.load_holder(input.editor_id, Some(Role::Editor)).await?;
        let publisher = self.load_holder(input.publisher_id, Some(Role::Publisher)).await?;

        let post = self.repository.create(input).await?;

        self.notifier.notify(
            ContentEvent::Created,
            &PostSnapshot {
                post: post.clone(),
                author,
                editor,
                publisher,
            },
        );
        Ok(post)
    }

    pub async fn get_post(&self, id: Uuid) -> BlogResult<BlogPost> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(BlogError::NotFound(id))
    }

    pub async fn list_posts(&self, filter: BlogFilter) -> BlogResult<Vec<BlogPost>> {
        self.repository.list(filter).await
    }

    /// Editors and publishers may update. A published post can't be rescheduled.
    pub async fn update_post(&self, actor: &User, id: Uuid, input: UpdateBlogPost) -> BlogResult<BlogPost> {
        require_role(actor, REVIEWERS, "update")?;
        input.validate()?;

        let existing = self.get_post(id).await?;
        if existing.published && input.publish_at.is_some() {
            return Err(BlogError::Validation(format!(
                "blog post {id} is already published and can't be rescheduled"
            )));
        }

        let author = match input.author_id {
            Some(author_id) => self.load_holder(author_id, None).await?,
            None => self.load_holder(existing.author_id, None).await?,
        };
        let editor = match input.editor_id {
            Some(editor_id) => self.load_holder(editor_id, Some(Role::Editor)).await?,
            None => self.load_holder(existing.editor_id, None).await?,
        };
        let publisher = match input.publisher_id {
            Some(publisher_id) => self.load_holder(publisher_id, Some(Role::Publisher)).await?,
            None => self.load_holder(existing.publisher_id, None).await?,
        };

        let post = self.repository.update(id, input).await?;

        self.notifier.notify(
            ContentEvent::Updated,
            &PostSnapshot {
                post: post.clone(),
                author,
                editor,
                publisher,
            },
        );
        Ok(post)
    }

    /// Publishers only. Role holders are resolved before the row disappears.
    pub async fn delete_post(&self, actor: &User, id: Uuid) -> BlogResult<()> {
        require_role(actor, &[Role::Publisher], "delete")?;

        let existing = self.get_post(id).await?;
        let snapshot = match resolve_snapshot(self.directory.as_ref(), existing).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(post_id = %id, error = %e, "Deleting blog post without notification");
                None
            }
        };

        if !self.repository.delete(id).await? {
            return Err(BlogError::NotFound(id));
        }

        tracing::info!(post_id = %id, actor = %actor.username, "Blog post deleted");
        if let Some(snapshot) = snapshot {
            self.notifier.notify(ContentEvent::Deleted, &snapshot);
        }
        Ok(())
    }

    async fn load_holder(&self, user_id: Uuid, required: Option<Role>) -> BlogResult<User> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or(BlogError::UserNotFound(user_id))?;

        if let Some(role) = required
            && !user.has_role(role)
        {
            return Err(BlogError::Validation(format!(
                "user '{}' does not hold the {role} role",
                user.username
            )));
        }
        Ok(user)
    }
}

fn require_role(actor: &User, allowed: &[Role], action: &'static str) -> BlogResult<()> {
    if actor.has_any_role(allowed) {
        Ok(())
    } else {
        Err(BlogError::Forbidden {
            username: actor.username.clone(),
            action,
        })
    }
}
