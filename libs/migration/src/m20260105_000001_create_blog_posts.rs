use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260105_000000_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BlogPosts::Table)
                    .if_not_exists()
                    .col(pk_uuid(BlogPosts::Id))
                    .col(string_len(BlogPosts::Title, 100))
                    .col(text(BlogPosts::Content))
                    .col(string_len(BlogPosts::Image, 255))
                    .col(text(BlogPosts::Category))
                    .col(uuid(BlogPosts::AuthorId))
                    .col(uuid(BlogPosts::EditorId))
                    .col(uuid(BlogPosts::PublisherId))
                    .col(boolean(BlogPosts::Published).default(false))
                    .col(timestamp_with_time_zone_null(BlogPosts::PublishAt))
                    .col(
                        timestamp_with_time_zone(BlogPosts::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(BlogPosts::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_posts_author")
                            .from(BlogPosts::Table, BlogPosts::AuthorId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_posts_editor")
                            .from(BlogPosts::Table, BlogPosts::EditorId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_blog_posts_publisher")
                            .from(BlogPosts::Table, BlogPosts::PublisherId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Publication sweep lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_blog_posts_due")
                    .table(BlogPosts::Table)
                    .col(BlogPosts::Published)
                    .col(BlogPosts::PublishAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_blog_posts_created_at")
                    .table(BlogPosts::Table)
                    .col(BlogPosts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BlogPosts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum BlogPosts {
    Table,
    Id,
    Title,
    Content,
    Image,
    Category,
    AuthorId,
    EditorId,
    PublisherId,
    Published,
    PublishAt,
    CreatedAt,
    UpdatedAt,
}
