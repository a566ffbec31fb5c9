//! Migration to create the projects table.
//!
//! One row per GitHub repository. Membership lists are JSON arrays; the derived
//! counts and the cached GitHub fields are indexed because project queries filter
//! on them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const INDEXED: [(&str, Projects); 4] = [
    ("idx_projects_num_mentors", Projects::NumMentors),
    ("idx_projects_num_interested_users", Projects::NumInterestedUsers),
    ("idx_projects_num_contributors", Projects::NumContributors),
    ("idx_projects_time_synced_with_github", Projects::TimeSyncedWithGithub),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::RepositoryId)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::MentorIds).json().null())
                    .col(ColumnDef::new(Projects::InterestedUserIds).json().null())
                    .col(
                        ColumnDef::new(Projects::NumMentors)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Projects::NumInterestedUsers)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Projects::NumContributors).integer().null())
                    .col(
                        ColumnDef::new(Projects::TimeSyncedWithGithub)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in INDEXED {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Projects::Table)
                        .col(column)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Projects {
    Table,
    RepositoryId,
    MentorIds,
    InterestedUserIds,
    NumMentors,
    NumInterestedUsers,
    NumContributors,
    TimeSyncedWithGithub,
    CreatedAt,
    UpdatedAt,
}
