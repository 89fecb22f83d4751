use crate::models::{BlogPost, Category, CreateBlogPost};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blog_posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub image: String,
    pub category: Category,
    pub author_id: Uuid,
    pub editor_id: Uuid,
    pub publisher_id: Uuid,
    pub published: bool,
    pub publish_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for BlogPost {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            image: model.image,
            category: model.category,
            author_id: model.author_id,
            editor_id: model.editor_id,
            publisher_id: model.publisher_id,
            published: model.published,
            publish_at: model.publish_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<CreateBlogPost> for ActiveModel {
    fn from(input: CreateBlogPost) -> Self {
        let post = BlogPost::new(input);
        ActiveModel {
            id: Set(post.id),
            title: Set(post.title),
            content: Set(post.content),
            image: Set(post.image),
            category: Set(post.category),
            author_id: Set(post.author_id),
            editor_id: Set(post.editor_id),
            publisher_id: Set(post.publisher_id),
            published: Set(false),
            publish_at: Set(post.publish_at.map(Into::into)),
            created_at: Set(post.created_at.into()),
            updated_at: Set(post.updated_at.into()),
        }
    }
}
