//! Sea-ORM entities for the `blog_posts` and `users` tables.

pub mod blog_post;
pub mod user;
