use async_trait::async_trait;

use crate::sessions::Message;

/// A chat completion backend.
///
/// Providers are stateless with respect to conversations: every call carries
/// the full transcript it should answer.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete `messages`, returning the assistant's reply text.
    async fn chat_with_history(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}
