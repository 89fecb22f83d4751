use crate::error::BlogError;
use crate::models::{CreateUser, Role, User};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// JSON array of role names
    pub roles: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for User {
    type Error = BlogError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let roles: Vec<Role> = serde_json::from_value(model.roles).map_err(|e| {
            warn!(user_id = %model.id, error = %e, "Malformed roles column");
            BlogError::Database(format!("malformed roles for user {}: {}", model.id, e))
        })?;

        Ok(Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            roles,
            created_at: model.created_at.into(),
        })
    }
}

impl From<CreateUser> for ActiveModel {
    fn from(input: CreateUser) -> Self {
        let user = User::new(input);
        let roles = user
            .roles
            .iter()
            .map(|role| serde_json::Value::String(role.to_string()))
            .collect();

        ActiveModel {
            id: Set(user.id),
            username: Set(user.username),
            email: Set(user.email),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            roles: Set(serde_json::Value::Array(roles)),
            created_at: Set(user.created_at.into()),
        }
    }
}
