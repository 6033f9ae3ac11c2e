use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{VectorMatch, VectorRecord};

pub struct VectorRepository;

impl VectorRepository {
    // Keyed by record id only. Re-indexing the same source appends new
    // records rather than replacing earlier ones.
    pub async fn upsert(conn: &Connection, record: &VectorRecord) -> Result<()> {
        let embedding_json = serde_json::to_string(&record.embedding)?;

        conn.execute(
            r#"
            INSERT INTO vector_records (
                id, conversation_id, chunk_index, content, embedding, created_at
            ) VALUES (?1, ?2, ?3, ?4, vector32(?5), ?6)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                created_at = excluded.created_at
            "#,
            params![
                record.id.clone(),
                record.conversation_id.clone(),
                record.chunk_index as i64,
                record.content.clone(),
                embedding_json,
                record.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn upsert_batch(conn: &Connection, records: &[VectorRecord]) -> Result<()> {
        for record in records {
            Self::upsert(conn, record).await?;
        }
        Ok(())
    }

    pub async fn search_similar(
        conn: &Connection,
        embedding: &[f32],
        top_k: u32,
        conversation_id: &str,
    ) -> Result<Vec<VectorMatch>> {
        let embedding_json = serde_json::to_string(embedding)?;

        let mut rows = conn
            .query(
                r#"
                SELECT
                    conversation_id,
                    chunk_index,
                    content,
                    1 - vector_distance_cos(embedding, vector32(?1)) as score
                FROM vector_records
                WHERE conversation_id = ?2
                  AND embedding IS NOT NULL
                ORDER BY score DESC
                LIMIT ?3
                "#,
                params![embedding_json, conversation_id, top_k as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(VectorMatch {
                conversation_id: row.get(0)?,
                chunk_index: row.get::<i64>(1)? as u32,
                content: row.get(2)?,
                score: row.get::<f64>(3)? as f32,
            });
        }

        Ok(results)
    }

    pub async fn delete_by_conversation(conn: &Connection, conversation_id: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM vector_records WHERE conversation_id = ?1",
            params![conversation_id],
        )
        .await?;

        Ok(())
    }
}
