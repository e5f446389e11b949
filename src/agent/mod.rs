//! Request orchestration: pick a role and a handler, then answer one prompt.

pub mod handler;
pub mod role;

pub use handler::{ChatHandler, CompletionSettings, DefaultHandler, Handler};
pub use role::{Environment, RoleKind, SystemRole};

use anyhow::{Context, Result};
use std::io::Write;

use crate::config::Config;
use crate::providers::{self, create_provider};
use crate::sessions::{create_session_store, SessionStore};

/// A single prompt as collected by the CLI.
#[derive(Debug, Clone)]
pub struct Request {
    pub prompt: String,
    pub role: RoleKind,
    /// Provider name overriding `default_provider` (the `--platform` flag).
    pub provider: Option<String>,
    /// Chat session to replay and extend. `None` runs statelessly.
    pub chat_id: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

impl Request {
    fn provider<'a>(&'a self, config: &'a Config) -> &'a str {
        self.provider.as_deref().unwrap_or_else(|| config.provider())
    }

    /// Model precedence: `--model`, then `default_model`, then the provider's default.
    fn settings(&self, config: &Config) -> CompletionSettings {
        let model = self
            .model
            .as_deref()
            .or(config.default_model.as_deref())
            .unwrap_or_else(|| providers::default_model(self.provider(config)));
        CompletionSettings {
            model: model.to_string(),
            temperature: self.temperature.unwrap_or(config.default_temperature),
        }
    }
}

/// Answer `request` with the configured provider and return the reply text.
pub async fn run(config: &Config, request: Request) -> Result<String> {
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        anyhow::bail!("Prompt is empty. Pass it as an argument or pipe it on stdin.");
    }

    let provider = create_provider(
        request.provider(config),
        config.api_key.as_deref(),
        config.api_url.as_deref(),
    )?;
    let role = SystemRole::new(request.role, &Environment::detect());
    let settings = request.settings(config);
    tracing::info!(
        provider = provider.name(),
        model = %settings.model,
        role = role.name(),
        chat = request.chat_id.as_deref().unwrap_or(""),
        "handling prompt"
    );

    match request.chat_id.as_deref().filter(|id| !id.is_empty()) {
        Some(chat_id) => {
            let store = create_session_store(config).await?;
            let handler =
                ChatHandler::new(provider.as_ref(), store.as_ref(), role, settings, chat_id);
            handler.handle(prompt).await
        }
        None => {
            DefaultHandler::new(provider.as_ref(), role, settings)
                .handle(prompt)
                .await
        }
    }
}

/// Print every stored chat id, most recent first.
pub async fn list_chats<W: Write>(store: &dyn SessionStore, out: &mut W) -> Result<()> {
    let sessions = store.list().await?;
    for session in sessions {
        match session.modified {
            Some(modified) => writeln!(
                out,
                "{}\t{}",
                session.id,
                modified.format("%Y-%m-%d %H:%M:%S")
            )?,
            None => writeln!(out, "{}", session.id)?,
        }
    }
    Ok(())
}

/// Print the transcript of one chat.
pub async fn show_chat<W: Write>(store: &dyn SessionStore, id: &str, out: &mut W) -> Result<()> {
    let record = store
        .read(id)
        .await
        .with_context(|| format!("Failed to load chat {id}"))?;
    if record.is_empty() {
        anyhow::bail!("No chat named {id}");
    }
    for message in &record.messages {
        writeln!(out, "{}: {}", message.role, message.content)?;
    }
    Ok(())
}

/// Print the supported providers with their default model.
pub fn list_providers<W: Write>(out: &mut W) -> Result<()> {
    for provider in providers::list_providers() {
        writeln!(
            out,
            "{}\t{}\t{}",
            provider.name, provider.display_name, provider.default_model
        )?;
    }
    Ok(())
}

pub async fn delete_chat(store: &dyn SessionStore, id: &str) -> Result<()> {
    store.invalidate(id).await?;
    tracing::info!(chat = id, "deleted chat");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{InMemorySessionStore, Message, SessionRecord};

    async fn seeded_store() -> InMemorySessionStore {
        let store = InMemorySessionStore::new();
        store
            .write(
                "proj1",
                &SessionRecord::new(
                    vec![
                        Message::system("You are ShellGPT"),
                        Message::user("what is Go"),
                        Message::assistant("A language."),
                    ],
                    "gpt-4o",
                ),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn run_rejects_blank_prompt() {
        let config = Config::default();
        let err = run(
            &config,
            Request {
                prompt: "  \n ".into(),
                role: RoleKind::Default,
                provider: None,
                chat_id: None,
                model: None,
                temperature: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Prompt is empty"));
    }

    #[test]
    fn request_overrides_config_settings() {
        let config = Config::default();
        let request = Request {
            prompt: "hi".into(),
            role: RoleKind::Code,
            provider: None,
            chat_id: None,
            model: Some("gpt-4o-mini".into()),
            temperature: Some(0.0),
        };
        let settings = request.settings(&config);
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!(settings.temperature.abs() < f64::EPSILON);

        let fallback = Request {
            model: None,
            temperature: None,
            ..request
        }
        .settings(&config);
        assert_eq!(fallback.model, config.model());
    }

    #[test]
    fn platform_selects_provider_and_its_default_model() {
        let config = Config::default();
        let request = Request {
            prompt: "hi".into(),
            role: RoleKind::Default,
            provider: Some("gemini".into()),
            chat_id: None,
            model: None,
            temperature: None,
        };
        assert_eq!(request.provider(&config), "gemini");
        assert_eq!(request.settings(&config).model, "gemini-2.0-flash");

        let mut pinned = Config::default();
        pinned.default_model = Some("gemini-1.5-pro".into());
        assert_eq!(request.settings(&pinned).model, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn run_rejects_unknown_platform() {
        let err = run(
            &Config::default(),
            Request {
                prompt: "hi".into(),
                role: RoleKind::Default,
                provider: Some("mistral".into()),
                chat_id: None,
                model: None,
                temperature: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Unknown provider: mistral"));
    }

    #[test]
    fn list_providers_prints_name_and_default_model() {
        let mut out = Vec::new();
        list_providers(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "openai\tOpenAI\tgpt-4o\ngemini\tGoogle Gemini\tgemini-2.0-flash\n"
        );
    }

    #[tokio::test]
    async fn show_chat_prints_role_prefixed_lines() {
        let store = seeded_store().await;
        let mut out = Vec::new();
        show_chat(&store, "proj1", &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "system: You are ShellGPT\nuser: what is Go\nassistant: A language.\n"
        );
    }

    #[tokio::test]
    async fn show_chat_of_unknown_id_errors() {
        let store = InMemorySessionStore::new();
        let mut out = Vec::new();
        let err = show_chat(&store, "ghost", &mut out).await.unwrap_err();
        assert!(err.to_string().contains("No chat named ghost"));
    }

    #[tokio::test]
    async fn list_then_delete_chat() {
        let store = seeded_store().await;
        let mut out = Vec::new();
        list_chats(&store, &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("proj1\t"));

        delete_chat(&store, "proj1").await.unwrap();
        let mut out = Vec::new();
        list_chats(&store, &mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
