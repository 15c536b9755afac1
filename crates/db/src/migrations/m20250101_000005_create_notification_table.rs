//! Create notification table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notification::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Notification::Timestamp).double().not_null())
                    .col(ColumnDef::new(Notification::PayloadJson).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notification::Table, Notification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, name) - replace-on-add lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_name")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_name")
                    .table(Notification::Table)
                    .col(Notification::Name)
                    .to_owned(),
            )
            .await?;

        // Index: timestamp (polling since a given time)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_timestamp")
                    .table(Notification::Table)
                    .col(Notification::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    UserId,
    Name,
    Timestamp,
    PayloadJson,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
