//! Repository for conversation message storage.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parley_conversation::{
    CollaboratorResult, ConversationScope, HistoryReader, Message, MessageId, MessageWriter,
    SenderKind,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::transport::BroadcastTransport;
use crate::types::{DatabaseError, DatabaseResult};

/// Stores messages in `chat_messages` and announces every write on the
/// live transport.
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
    transport: BroadcastTransport,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool, transport: BroadcastTransport) -> Self {
        Self { pool, transport }
    }

    pub fn transport(&self) -> &BroadcastTransport {
        &self.transport
    }

    /// All messages of a conversation, oldest first
    pub async fn find_by_scope(&self, scope: &ConversationScope) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, scope, content, sender_type, created_at
             FROM chat_messages WHERE scope = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(scope.as_str())
        .fetch_all(&self.pool)
        .await?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<DatabaseResult<Vec<_>>>()?;

        debug!(%scope, count = messages.len(), "loaded conversation messages");
        Ok(messages)
    }

    /// Store a new message with a fresh id and announce it
    pub async fn create(
        &self,
        scope: &ConversationScope,
        content: &str,
        sender: SenderKind,
    ) -> DatabaseResult<Message> {
        let mut message = Message::new(scope.clone(), content, sender);
        // Stored precision; the announced copy must match what a later read returns.
        message.created_at = message.created_at.trunc_subsecs(6);

        self.record(&message).await?;
        Ok(message)
    }

    /// Store an already-built message (e.g. an assistant reply) and announce it
    pub async fn record(&self, message: &Message) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, scope, content, sender_type, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id.as_str())
        .bind(message.scope.as_str())
        .bind(&message.content)
        .bind(message.sender.as_str())
        .bind(encode_timestamp(&message.created_at))
        .execute(&self.pool)
        .await?;

        let listeners = self.transport.publish(message.clone());
        info!(
            id = %message.id,
            scope = %message.scope,
            sender = message.sender.as_str(),
            listeners,
            "stored message"
        );
        Ok(())
    }

    /// Delete every message of a conversation. Returns the number removed.
    pub async fn clear(&self, scope: &ConversationScope) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE scope = ?")
            .bind(scope.as_str())
            .execute(&self.pool)
            .await?;

        info!(%scope, removed = result.rows_affected(), "cleared conversation");
        Ok(result.rows_affected())
    }

    pub async fn count(&self, scope: &ConversationScope) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE scope = ?")
            .bind(scope.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl HistoryReader for MessageRepository {
    async fn list_messages(&self, scope: &ConversationScope) -> CollaboratorResult<Vec<Message>> {
        Ok(self.find_by_scope(scope).await?)
    }
}

#[async_trait]
impl MessageWriter for MessageRepository {
    async fn insert(
        &self,
        scope: &ConversationScope,
        content: &str,
        sender: SenderKind,
    ) -> CollaboratorResult<Message> {
        Ok(self.create(scope, content, sender).await?)
    }
}

fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidRow(format!("created_at {raw:?}: {e}")))
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<Message> {
    let sender: String = row.try_get("sender_type")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Message {
        id: MessageId::new(row.try_get::<String, _>("id")?),
        scope: ConversationScope::new(row.try_get::<String, _>("scope")?),
        content: row.try_get("content")?,
        sender: sender
            .parse()
            .map_err(|e| DatabaseError::InvalidRow(format!("{e}")))?,
        created_at: decode_timestamp(&created_at)?,
    })
}
