use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_items_table::Migration),
            Box::new(m20240301_000003_create_memorandums_table::Migration),
            Box::new(m20240301_000004_create_requests_table::Migration),
            Box::new(m20240301_000005_create_request_items_table::Migration),
            Box::new(m20240301_000006_create_attachments_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_email")
                        .table(Users::Table)
                        .col(Users::Email)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(
                            ColumnDef::new(Items::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Items::Unit).string_len(50).not_null())
                        .col(
                            ColumnDef::new(Items::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Items::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Items::IsArchived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Items::ImageUrl).string().null())
                        .col(ColumnDef::new(Items::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Items::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_name")
                        .table(Items::Table)
                        .col(Items::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_items_status")
                        .table(Items::Table)
                        .col(Items::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        Name,
        Quantity,
        Unit,
        ReorderPoint,
        Status,
        IsArchived,
        ImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_memorandums_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_memorandums_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Memorandums::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Memorandums::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Memorandums::Title).string().not_null())
                        .col(
                            ColumnDef::new(Memorandums::ReferenceNo)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Memorandums::Body).text().null())
                        .col(ColumnDef::new(Memorandums::AttachmentUrl).string().null())
                        .col(ColumnDef::new(Memorandums::IssuedOn).date().not_null())
                        .col(ColumnDef::new(Memorandums::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Memorandums::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Memorandums::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_memorandums_reference_no")
                        .table(Memorandums::Table)
                        .col(Memorandums::ReferenceNo)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Memorandums::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Memorandums {
        Table,
        Id,
        Title,
        ReferenceNo,
        Body,
        AttachmentUrl,
        IssuedOn,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_requests_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Requests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Requests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Requests::RequesterName).string().not_null())
                        .col(
                            ColumnDef::new(Requests::RequesterEmail)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Requests::Division).string().not_null())
                        .col(ColumnDef::new(Requests::Section).string().not_null())
                        .col(ColumnDef::new(Requests::Kind).string_len(32).not_null())
                        .col(ColumnDef::new(Requests::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Requests::IsReceived)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Requests::ReceivedAt).timestamp().null())
                        .col(ColumnDef::new(Requests::ApproverId).uuid().null())
                        .col(ColumnDef::new(Requests::Notes).text().null())
                        .col(ColumnDef::new(Requests::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Requests::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_status")
                        .table(Requests::Table)
                        .col(Requests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_created_at")
                        .table(Requests::Table)
                        .col(Requests::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Requests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Requests {
        Table,
        Id,
        RequesterName,
        RequesterEmail,
        Division,
        Section,
        Kind,
        Status,
        IsReceived,
        ReceivedAt,
        ApproverId,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_request_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_request_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestItems::RequestId).uuid().not_null())
                        .col(ColumnDef::new(RequestItems::ItemId).uuid().not_null())
                        .col(ColumnDef::new(RequestItems::Quantity).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_items_request")
                                .from(RequestItems::Table, RequestItems::RequestId)
                                .to(Requests::Table, Requests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_items_item")
                                .from(RequestItems::Table, RequestItems::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_request_items_request_id")
                        .table(RequestItems::Table)
                        .col(RequestItems::RequestId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_request_items_item_id")
                        .table(RequestItems::Table)
                        .col(RequestItems::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequestItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RequestItems {
        Table,
        Id,
        RequestId,
        ItemId,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum Requests {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
    }
}

mod m20240301_000006_create_attachments_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_attachments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Attachments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Attachments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Attachments::ObjectKey)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Attachments::Url).string().not_null())
                        .col(
                            ColumnDef::new(Attachments::ContentType)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Attachments::SizeBytes)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Attachments::UploadedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Attachments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Attachments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Attachments {
        Table,
        Id,
        ObjectKey,
        Url,
        ContentType,
        SizeBytes,
        UploadedBy,
        CreatedAt,
    }
}
