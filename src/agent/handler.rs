use async_trait::async_trait;

use super::role::SystemRole;
use crate::providers::Provider;
use crate::sessions::{ChatSession, Message, SessionStore, TEMP_SESSION_ID};

/// Turns a prompt into a reply.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The messages this handler contributes for `prompt`, before any stored history.
    async fn make_messages(&self, prompt: &str) -> Vec<Message>;

    async fn handle(&self, prompt: &str) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}

/// Model settings shared by every handler.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f64,
}

/// Stateless handler: every call is a fresh `[system, user]` exchange.
pub struct DefaultHandler<'a> {
    provider: &'a dyn Provider,
    role: SystemRole,
    settings: CompletionSettings,
}

impl<'a> DefaultHandler<'a> {
    pub fn new(provider: &'a dyn Provider, role: SystemRole, settings: CompletionSettings) -> Self {
        Self {
            provider,
            role,
            settings,
        }
    }
}

#[async_trait]
impl Handler for DefaultHandler<'_> {
    async fn make_messages(&self, prompt: &str) -> Vec<Message> {
        vec![
            Message::system(self.role.prompt()),
            Message::user(prompt.trim()),
        ]
    }

    async fn handle(&self, prompt: &str) -> anyhow::Result<String> {
        let messages = self.make_messages(prompt).await;
        self.provider
            .chat_with_history(&messages, &self.settings.model, self.settings.temperature)
            .await
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// Handler that replays and extends a named chat session.
pub struct ChatHandler<'a> {
    provider: &'a dyn Provider,
    role: SystemRole,
    settings: CompletionSettings,
    chat_id: String,
    session: ChatSession<'a>,
}

impl<'a> ChatHandler<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        store: &'a dyn SessionStore,
        role: SystemRole,
        settings: CompletionSettings,
        chat_id: impl Into<String>,
    ) -> Self {
        let session = ChatSession::new(store, settings.model.clone());
        Self {
            provider,
            role,
            settings,
            chat_id: chat_id.into(),
            session,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Whether the session already carries history (and thus a system prompt).
    async fn initiated(&self) -> bool {
        self.chat_id != TEMP_SESSION_ID && self.session.store().exists(&self.chat_id).await
    }
}

#[async_trait]
impl Handler for ChatHandler<'_> {
    async fn make_messages(&self, prompt: &str) -> Vec<Message> {
        let user = Message::user(prompt.trim());
        if self.initiated().await {
            vec![user]
        } else {
            vec![Message::system(self.role.prompt()), user]
        }
    }

    async fn handle(&self, prompt: &str) -> anyhow::Result<String> {
        let messages = self.make_messages(prompt).await;
        let provider = self.provider;
        let model = self.settings.model.as_str();
        let temperature = self.settings.temperature;

        let reply = self
            .session
            .complete(&self.chat_id, messages, |transcript| async move {
                provider
                    .chat_with_history(&transcript, model, temperature)
                    .await
                    .map(Message::assistant)
            })
            .await?;
        Ok(reply.content)
    }

    fn name(&self) -> &str {
        "chat"
    }
}
