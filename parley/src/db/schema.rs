use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection, embedding_dims: usize) -> Result<()> {
    let ddl = format!(
        r#"
        -- Conversations table
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT,
            system_instruction TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user_id ON conversations(user_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations(updated_at);

        -- Turns table: the authoritative timeline, ordered by position
        CREATE TABLE IF NOT EXISTS turns (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_turns_conversation_position
            ON turns(conversation_id, position);

        -- Vector records: append-only, partitioned by conversation_id
        CREATE TABLE IF NOT EXISTS vector_records (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding F32_BLOB({embedding_dims}),
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_vector_records_conversation_id
            ON vector_records(conversation_id);
        "#
    );

    conn.execute_batch(&ddl).await?;

    Ok(())
}
