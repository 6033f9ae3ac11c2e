use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{ParleyError, Result};
use crate::models::{Conversation, ConversationPage, ConversationSummary, ConversationTurn};

pub struct ConversationRepository;

impl ConversationRepository {
    pub async fn create(conn: &Connection, conversation: &Conversation) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO conversations (
                id, user_id, title, system_instruction, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                conversation.id.clone(),
                conversation.user_id.clone(),
                conversation.title.clone(),
                conversation.system_instruction.clone(),
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Conversation>> {
        let mut rows = conn
            .query(
                "SELECT id, user_id, title, system_instruction, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_conversation(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn get_turns(conn: &Connection, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let mut rows = conn
            .query(
                "SELECT role, content, created_at FROM turns
                 WHERE conversation_id = ?1 ORDER BY position ASC",
                params![conversation_id],
            )
            .await?;

        let mut turns = Vec::new();
        while let Some(row) = rows.next().await? {
            let role: String = row.get(0)?;
            turns.push(ConversationTurn {
                role: role
                    .parse()
                    .map_err(|e: String| ParleyError::Internal(e))?,
                content: row.get(1)?,
                created_at: parse_timestamp(&row.get::<String>(2)?)?,
            });
        }

        Ok(turns)
    }

    pub async fn save_exchange(
        conn: &Connection,
        conversation_id: &str,
        prompt: &ConversationTurn,
        response: &ConversationTurn,
    ) -> Result<()> {
        let mut rows = conn
            .query(
                "SELECT COALESCE(MAX(position), -1) FROM turns WHERE conversation_id = ?1",
                params![conversation_id],
            )
            .await?;
        let next_position: i64 = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? + 1,
            None => 0,
        };

        for (offset, turn) in [prompt, response].into_iter().enumerate() {
            conn.execute(
                r#"
                INSERT INTO turns (id, conversation_id, role, content, position, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    conversation_id,
                    turn.role.to_string(),
                    turn.content.clone(),
                    next_position + offset as i64,
                    turn.created_at.to_rfc3339(),
                ],
            )
            .await?;
        }

        conn.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![conversation_id, Utc::now().to_rfc3339()],
        )
        .await?;

        Ok(())
    }

    pub async fn list(
        conn: &Connection,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let offset = page as i64 * page_size as i64;
        let mut rows = conn
            .query(
                r#"
                SELECT c.id, c.user_id, c.title, c.updated_at, COUNT(t.id)
                FROM conversations c
                LEFT JOIN turns t ON t.conversation_id = c.id
                WHERE c.user_id = ?1
                GROUP BY c.id
                ORDER BY c.updated_at DESC
                LIMIT ?2 OFFSET ?3
                "#,
                params![user_id, page_size as i64, offset],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_summary(&row)?);
        }

        let mut count_rows = conn
            .query(
                "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                params![user_id],
            )
            .await?;
        let total = match count_rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        Ok(ConversationPage {
            items,
            page,
            page_size,
            total,
        })
    }

    pub async fn search(
        conn: &Connection,
        user_id: &str,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        // LIKE pattern stays a bound parameter so the term is always literal
        let pattern = format!("%{term}%");
        let offset = page as i64 * page_size as i64;

        let mut rows = conn
            .query(
                r#"
                SELECT c.id, c.user_id, c.title, c.updated_at,
                       (SELECT COUNT(*) FROM turns t WHERE t.conversation_id = c.id)
                FROM conversations c
                WHERE c.user_id = ?1
                  AND (c.title LIKE ?2 OR EXISTS (
                      SELECT 1 FROM turns t
                      WHERE t.conversation_id = c.id AND t.content LIKE ?2
                  ))
                ORDER BY c.updated_at DESC
                LIMIT ?3 OFFSET ?4
                "#,
                params![user_id, pattern.clone(), page_size as i64, offset],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_summary(&row)?);
        }

        let mut count_rows = conn
            .query(
                r#"
                SELECT COUNT(*) FROM conversations c
                WHERE c.user_id = ?1
                  AND (c.title LIKE ?2 OR EXISTS (
                      SELECT 1 FROM turns t
                      WHERE t.conversation_id = c.id AND t.content LIKE ?2
                  ))
                "#,
                params![user_id, pattern],
            )
            .await?;
        let total = match count_rows.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };

        Ok(ConversationPage {
            items,
            page,
            page_size,
            total,
        })
    }

    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        conn.execute("DELETE FROM turns WHERE conversation_id = ?1", params![id])
            .await?;
        let affected = conn
            .execute("DELETE FROM conversations WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    fn row_to_conversation(row: &Row) -> Result<Conversation> {
        Ok(Conversation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            system_instruction: row.get(3)?,
            created_at: parse_timestamp(&row.get::<String>(4)?)?,
            updated_at: parse_timestamp(&row.get::<String>(5)?)?,
        })
    }

    fn row_to_summary(row: &Row) -> Result<ConversationSummary> {
        Ok(ConversationSummary {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            updated_at: parse_timestamp(&row.get::<String>(3)?)?,
            turn_count: row.get::<i64>(4)? as u32,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ParleyError::Internal(format!("Invalid timestamp '{raw}': {e}")))
}
