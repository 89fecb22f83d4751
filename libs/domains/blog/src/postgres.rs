use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    directory::UserDirectory,
    entity::{blog_post, user},
    error::{BlogError, BlogResult},
    models::{BlogFilter, BlogPost, CreateBlogPost, CreateUser, UpdateBlogPost, User},
    repository::BlogRepository,
};

pub struct PgBlogRepository {
    db: DatabaseConnection,
}

impl PgBlogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlogRepository for PgBlogRepository {
    async fn create(&self, input: CreateBlogPost) -> BlogResult<BlogPost> {
        let active_model: blog_post::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        tracing::info!(post_id = %model.id, "Created blog post");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> BlogResult<Option<BlogPost>> {
        let model = blog_post::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self, filter: BlogFilter) -> BlogResult<Vec<BlogPost>> {
        let mut query = blog_post::Entity::find();

        if let Some(category) = filter.category {
            query = query.filter(blog_post::Column::Category.eq(category));
        }

        if let Some(published) = filter.published {
            query = query.filter(blog_post::Column::Published.eq(published));
        }

        if let Some(author_id) = filter.author_id {
            query = query.filter(blog_post::Column::AuthorId.eq(author_id));
        }

        let models = query
            .order_by_desc(blog_post::Column::CreatedAt)
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: Uuid, input: UpdateBlogPost) -> BlogResult<BlogPost> {
        let model = blog_post::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(BlogError::NotFound(id))?;

        let mut post: BlogPost = model.clone().into();
        post.apply_update(input);

        let mut active: blog_post::ActiveModel = model.into();
        active.title = Set(post.title);
        active.content = Set(post.content);
        active.image = Set(post.image);
        active.category = Set(post.category);
        active.author_id = Set(post.author_id);
        active.editor_id = Set(post.editor_id);
        active.publisher_id = Set(post.publisher_id);
        active.publish_at = Set(post.publish_at.map(Into::into));
        active.updated_at = Set(post.updated_at.into());

        let updated = active.update(&self.db).await?;

        tracing::info!(post_id = %id, "Updated blog post");
        Ok(updated.into())
    }

    async fn delete(&self, id: Uuid) -> BlogResult<bool> {
        let result = blog_post::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            tracing::info!(post_id = %id, "Deleted blog post");
        }
        Ok(result.rows_affected > 0)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> BlogResult<Vec<BlogPost>> {
        let models = blog_post::Entity::find()
            .filter(blog_post::Column::Published.eq(false))
            .filter(blog_post::Column::PublishAt.lte(now))
            .order_by_asc(blog_post::Column::PublishAt)
            .order_by_asc(blog_post::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_published(&self, id: Uuid, now: DateTime<Utc>) -> BlogResult<bool> {
        // Only an unpublished row that is still due changes.
        let result = blog_post::Entity::update_many()
            .col_expr(blog_post::Column::Published, Expr::value(true))
            .col_expr(blog_post::Column::UpdatedAt, Expr::value(now))
            .filter(blog_post::Column::Id.eq(id))
            .filter(blog_post::Column::Published.eq(false))
            .filter(blog_post::Column::PublishAt.lte(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn recent(&self, limit: usize) -> BlogResult<Vec<BlogPost>> {
        let models = blog_post::Entity::find()
            .order_by_desc(blog_post::Column::CreatedAt)
            .limit(limit as u64)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

pub struct PgUserDirectory {
    db: DatabaseConnection,
}

impl PgUserDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user(&self, id: Uuid) -> BlogResult<Option<User>> {
        let model = user::Entity::find_by_id(id).one(&self.db).await?;
        model.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> BlogResult<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&self.db)
            .await?;

        models.into_iter().map(User::try_from).collect()
    }

    async fn create_user(&self, input: CreateUser) -> BlogResult<User> {
        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(input.username.as_str()))
            .one(&self.db)
            .await?
            .is_some();

        if taken {
            return Err(BlogError::Validation(format!(
                "username '{}' is already taken",
                input.username
            )));
        }

        let active_model: user::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;
        User::try_from(model)
    }
}
