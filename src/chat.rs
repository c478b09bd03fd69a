use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{ChatMessage, ChatRole, ChatSession, MessageId, SessionId};
use crate::portal::{require_account, Caller, Portal};

pub const SYSTEM_PROMPT: &str = "You are a helpful VTU (Visvesvaraya Technological University) academic assistant.
Help students with:
- Academic queries about VTU curriculum, syllabus, and exam patterns
- Study guidance and preparation strategies
- Career advice and placement preparation
- University procedures and regulations
- Technical concepts and problem-solving

Keep responses concise, helpful, and focused on VTU academic context.";

pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again later.";

/// Number of most recent messages sent to the completion provider.
pub const CONTEXT_WINDOW: usize = 10;

impl Portal {
    pub async fn chat_sessions(&self, caller: Caller) -> PortalResult<Vec<ChatSession>> {
        match caller {
            Some(account) => self.store.sessions_for_account(account).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn create_chat_session(&self, caller: Caller, title: &str) -> PortalResult<SessionId> {
        let account = require_account(caller)?;
        if title.trim().is_empty() {
            return Err(PortalError::invalid("title", "must not be empty"));
        }

        let session = ChatSession {
            id: Uuid::new_v4(),
            account,
            title: title.trim().to_string(),
            last_message: None,
            created_at: Utc::now(),
        };
        self.store.insert_session(&session).await?;
        Ok(session.id)
    }

    pub async fn chat_messages(&self, session: SessionId) -> PortalResult<Vec<ChatMessage>> {
        self.store.messages(session).await
    }

    /// Stores the user's message and schedules the assistant reply.
    ///
    /// The reply job is enqueued only after the user message is stored, so
    /// the reply always lands after it in the history. Callers observe the
    /// reply by re-reading the session.
    pub async fn send_message(
        &self,
        caller: Caller,
        session_id: SessionId,
        content: &str,
    ) -> PortalResult<MessageId> {
        let account = require_account(caller)?;
        if content.trim().is_empty() {
            return Err(PortalError::invalid("content", "must not be empty"));
        }
        self.store
            .session(session_id)
            .await?
            .filter(|session| session.account == account)
            .ok_or(PortalError::NotFound("chat session"))?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            account,
            content: content.to_string(),
            role: ChatRole::User,
            timestamp: Utc::now(),
        };
        self.store.insert_message(&message).await?;
        self.store.set_last_message(session_id, content).await?;

        let portal = self.clone();
        self.tasks.enqueue_after(
            Duration::ZERO,
            Box::pin(async move {
                if let Err(e) = portal.generate_reply(session_id).await {
                    error!(%session_id, "assistant reply was not stored: {e}");
                }
            }),
        );

        Ok(message.id)
    }

    /// Asks the completion provider for a reply to the recent history and
    /// appends it. Provider failures are replaced by [`FALLBACK_REPLY`].
    pub async fn generate_reply(&self, session_id: SessionId) -> PortalResult<ChatMessage> {
        let history = self.store.recent_messages(session_id, CONTEXT_WINDOW).await?;

        let content = match self.completions.complete(SYSTEM_PROMPT, &history).await {
            Ok(text) => text,
            Err(e) => {
                error!(%session_id, "AI response error: {e}");
                FALLBACK_REPLY.to_string()
            }
        };

        self.add_assistant_message(session_id, content).await
    }

    async fn add_assistant_message(
        &self,
        session_id: SessionId,
        content: String,
    ) -> PortalResult<ChatMessage> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(PortalError::NotFound("chat session"))?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            account: session.account,
            content,
            role: ChatRole::Assistant,
            timestamp: Utc::now(),
        };
        self.store.insert_message(&message).await?;
        self.store.set_last_message(session_id, &message.content).await?;
        info!(%session_id, "assistant reply stored");
        Ok(message)
    }
}
