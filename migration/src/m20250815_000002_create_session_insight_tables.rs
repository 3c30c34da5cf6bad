use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS pgcrypto;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE copilot_platform.users (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    email text,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz NOT NULL DEFAULT now()
                );

                CREATE TABLE copilot_platform.sessions (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id uuid NOT NULL REFERENCES copilot_platform.users(id) ON DELETE CASCADE,
                    name text,
                    started_at timestamptz NOT NULL DEFAULT now(),
                    ended_at timestamptz,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz NOT NULL DEFAULT now()
                );

                CREATE TABLE copilot_platform.snippets (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    session_id uuid NOT NULL REFERENCES copilot_platform.sessions(id) ON DELETE CASCADE,
                    captured_at timestamptz NOT NULL,
                    duration_seconds integer NOT NULL,
                    transcript text,
                    language text,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz NOT NULL DEFAULT now()
                );

                CREATE TABLE copilot_platform.insights (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    session_id uuid NOT NULL REFERENCES copilot_platform.sessions(id) ON DELETE CASCADE,
                    content text NOT NULL,
                    bullets jsonb NOT NULL DEFAULT '[]'::jsonb,
                    llm_updated_at timestamptz,
                    user_edited_at timestamptz,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz NOT NULL DEFAULT now()
                );
            "#,
            )
            .await?;

        // Indexes backing the hot queries: transcript collection ordered by
        // capture time, newness checks against updated_at, the
        // current-document lookup, and the newest-first session list.
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX snippets_session_captured_idx
                    ON copilot_platform.snippets (session_id, captured_at);
                CREATE INDEX snippets_session_updated_idx
                    ON copilot_platform.snippets (session_id, updated_at);
                CREATE INDEX insights_session_updated_idx
                    ON copilot_platform.insights (session_id, updated_at DESC);
                CREATE INDEX sessions_user_started_idx
                    ON copilot_platform.sessions (user_id, started_at DESC);
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS copilot_platform.insights;
                DROP TABLE IF EXISTS copilot_platform.snippets;
                DROP TABLE IF EXISTS copilot_platform.sessions;
                DROP TABLE IF EXISTS copilot_platform.users;
            "#,
            )
            .await?;

        Ok(())
    }
}
