use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("editorial_db")]
pub struct EditorialDb(sqlx::PgPool);

/// Embedded schema migrations, shared by the server, the CLI and tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
