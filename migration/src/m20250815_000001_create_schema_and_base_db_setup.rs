use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create the platform's schema
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS copilot_platform;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO copilot_platform, public;")
            .await?;

        // Grant the base DB user that executes all platform queries
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    GRANT ALL PRIVILEGES ON DATABASE copilot TO copilot;
                    GRANT ALL ON SCHEMA copilot_platform TO copilot;

                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform GRANT ALL ON TABLES TO copilot;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform GRANT ALL ON SEQUENCES TO copilot;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform GRANT ALL ON FUNCTIONS TO copilot;
                END $$;
            "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Revoke default privileges first
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform REVOKE ALL ON FUNCTIONS FROM copilot;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform REVOKE ALL ON SEQUENCES FROM copilot;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA copilot_platform REVOKE ALL ON TABLES FROM copilot;
                    REVOKE ALL ON SCHEMA copilot_platform FROM copilot;
                    REVOKE ALL PRIVILEGES ON DATABASE copilot FROM copilot;
                END $$;
            "#,
            )
            .await?;

        // Drop the schema (CASCADE will remove all objects in it)
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS copilot_platform CASCADE;")
            .await?;

        Ok(())
    }
}
