//! Blog Domain
//!
//! Blog posts, the users that write, edit and publish them, and the
//! role-gated service that mutates posts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────────┐
//! │ BlogService │ ──► │ ChangeNotifier │  ← called after each committed mutation
//! └──────┬──────┘     └────────────────┘
//!        │
//! ┌──────▼──────────────────────────┐
//! │ BlogRepository / UserDirectory  │  ← traits + in-memory and Postgres impls
//! └──────┬──────────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← posts, users, roles, events
//! └─────────────┘
//! ```
//!
//! # Roles
//!
//! | action | allowed roles               |
//! |--------|-----------------------------|
//! | create | author, editor, publisher   |
//! | update | editor, publisher           |
//! | delete | publisher                   |

pub mod directory;
pub mod entity;
pub mod error;
pub mod models;
pub mod notifier;
pub mod postgres;
pub mod repository;
pub mod service;

pub use directory::{InMemoryUserDirectory, UserDirectory, resolve_snapshot};
pub use error::{BlogError, BlogResult};
pub use models::{
    BlogFilter, BlogPost, Category, ContentEvent, CreateBlogPost, CreateUser, PostSnapshot, Role,
    UpdateBlogPost, User,
};
pub use notifier::ChangeNotifier;
pub use postgres::{PgBlogRepository, PgUserDirectory};
pub use repository::{BlogRepository, InMemoryBlogRepository};
pub use service::BlogService;
