use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

const CONTENT_TYPES: [ContentType; 8] = [
    ContentType::ProjectDescription,
    ContentType::ProjectDocumentation,
    ContentType::CodeSnippet,
    ContentType::UserProfile,
    ContentType::CommitMessage,
    ContentType::IssueDescription,
    ContentType::PullRequestDescription,
    ContentType::Comment,
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Vectors are stored as text and cast to `vector` by similarity queries
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(ContentType::Enum)
                    .values(CONTENT_TYPES)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Embeddings::Table)
                    .if_not_exists()
                    .col(pk_uuid(Embeddings::Id))
                    .col(uuid(Embeddings::ContentId))
                    .col(
                        ColumnDef::new(Embeddings::ContentType)
                            .enumeration(ContentType::Enum, CONTENT_TYPES)
                            .not_null(),
                    )
                    .col(text(Embeddings::ContentText))
                    .col(text_null(Embeddings::EmbeddingVector))
                    .col(
                        string_len(Embeddings::EmbeddingModel, 100)
                            .default("text-embedding-ada-002"),
                    )
                    .col(integer(Embeddings::ChunkIndex).default(0))
                    .col(integer(Embeddings::ChunkTotal).default(1))
                    .col(json_binary(Embeddings::Metadata).default("{}"))
                    .col(
                        timestamp_with_time_zone(Embeddings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Embeddings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                ALTER TABLE embeddings
                    ADD CONSTRAINT embeddings_chunk_range
                    CHECK (chunk_index >= 0 AND chunk_index < chunk_total)
                "#,
            )
            .await?;

        // Not unique: a replaced chunk set is deleted and re-inserted in one transaction
        manager
            .create_index(
                Index::create()
                    .name("idx_embeddings_content")
                    .table(Embeddings::Table)
                    .col(Embeddings::ContentId)
                    .col(Embeddings::ContentType)
                    .col(Embeddings::ChunkIndex)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_embeddings_model")
                    .table(Embeddings::Table)
                    .col(Embeddings::EmbeddingModel)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_embeddings_created_at")
                    .table(Embeddings::Table)
                    .col(Embeddings::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX IF NOT EXISTS idx_embeddings_content_text_fts
                    ON embeddings USING GIN (to_tsvector('english', content_text))
                "#,
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_embeddings_metadata ON embeddings USING GIN (metadata)",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER embeddings_touch_updated_at
                    BEFORE UPDATE ON embeddings
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS embeddings_touch_updated_at ON embeddings")
            .await?;

        manager
            .drop_table(Table::drop().table(Embeddings::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(ContentType::Enum).to_owned())
            .await?;

        // The vector extension is left installed

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Embeddings {
    Table,
    Id,
    ContentId,
    ContentType,
    ContentText,
    EmbeddingVector,
    EmbeddingModel,
    ChunkIndex,
    ChunkTotal,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
enum ContentType {
    #[sea_orm(iden = "embedding_content_type")]
    Enum,
    #[sea_orm(iden = "project_description")]
    ProjectDescription,
    #[sea_orm(iden = "project_documentation")]
    ProjectDocumentation,
    #[sea_orm(iden = "code_snippet")]
    CodeSnippet,
    #[sea_orm(iden = "user_profile")]
    UserProfile,
    #[sea_orm(iden = "commit_message")]
    CommitMessage,
    #[sea_orm(iden = "issue_description")]
    IssueDescription,
    #[sea_orm(iden = "pull_request_description")]
    PullRequestDescription,
    #[sea_orm(iden = "comment")]
    Comment,
}
