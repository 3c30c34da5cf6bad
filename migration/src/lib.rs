pub use sea_orm_migration::prelude::*;

mod m20250815_000001_create_schema_and_base_db_setup;
mod m20250815_000002_create_session_insight_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250815_000001_create_schema_and_base_db_setup::Migration),
            Box::new(m20250815_000002_create_session_insight_tables::Migration),
        ]
    }
}
