use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One durable subscription row per application user; writes are
        // full-replace upserts keyed on user_id.
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::Provider)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::ProviderCustomerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::Plan)
                            .text()
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::Status)
                            .text()
                            .not_null()
                            .default("none"),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::CurrentPeriodStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::CurrentPeriodEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index on user_id is what makes reconcile an upsert target.
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_records_user_id")
                    .table(SubscriptionRecords::Table)
                    .col(SubscriptionRecords::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubscriptionRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SubscriptionRecords {
    Table,
    Id,
    UserId,
    Provider,
    ProviderCustomerId,
    Plan,
    Status,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    SyncedAt,
    CreatedAt,
    UpdatedAt,
}
