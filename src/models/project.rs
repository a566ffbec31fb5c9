//! Project entity model
//!
//! This module contains the SeaORM entity model for the projects table. Each row
//! mirrors one GitHub repository, keyed by its numeric repository id, and carries the
//! locally-managed mentor and interested-user lists alongside cached GitHub data.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Project entity as stored in the database
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// GitHub repository id (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub repository_id: String,

    /// JSON array of mentor user ids; may be NULL for legacy rows
    #[sea_orm(column_type = "Json", nullable)]
    pub mentor_ids: Option<JsonValue>,

    /// JSON array of interested user ids; may be NULL for legacy rows
    #[sea_orm(column_type = "Json", nullable)]
    pub interested_user_ids: Option<JsonValue>,

    /// Length of `mentor_ids`, recomputed on every save
    pub num_mentors: i32,

    /// Length of `interested_user_ids`, recomputed on every save
    pub num_interested_users: i32,

    /// Contributor count reported by GitHub at the last sync
    pub num_contributors: Option<i32>,

    /// Epoch milliseconds of the last successful GitHub sync
    pub time_synced_with_github: Option<i64>,

    /// Timestamp when the project was first stored
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the project was last stored
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
