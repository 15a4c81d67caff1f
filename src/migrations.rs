use sqlx::{Executor, Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_users.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_conversations.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_conversation_members.sql");
const MIG_0004: &str = include_str!("../migrations/0004_create_messages.sql");

pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003, MIG_0004]
        .into_iter()
        .enumerate()
    {
        let label = i + 1;
        // raw &str goes over the simple query protocol, so a migration may
        // contain several statements
        match db.execute(sql).await {
            Ok(_) => tracing::info!(migration = %label, "chat-relay migration applied"),
            Err(e) => {
                // If it fails due to already exists, continue; otherwise log
                tracing::warn!(migration = %label, error = %e, "migration may have been applied already");
            }
        }
    }
    Ok(())
}
