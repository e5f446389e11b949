#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps
)]


use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use std::io::{IsTerminal, Read};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use shellchat::agent::{self, Request, RoleKind};
use shellchat::sessions::create_session_store;
use shellchat::Config;

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

/// `shellchat` - ask a language model from the shell, with optional persistent chats.
#[derive(Parser, Debug)]
#[command(name = "shellchat")]
#[command(version)]
#[command(about = "Command-line productivity tool powered by large language models.", long_about = None)]
#[command(group(ArgGroup::new("role").args(["shell", "describe_shell", "code"])))]
#[command(after_help = "\
Examples:
  shellchat \"what is the capital of France\"
  shellchat -s \"find all files larger than 1G\"
  git diff | shellchat \"write a commit message\"
  shellchat --chat proj1 \"what is Go\"
  shellchat --chat proj1 \"give an example\"")]
struct Cli {
    /// Prompt text. Piped stdin is appended on a new line.
    prompt: Option<String>,

    /// Generate a shell command
    #[arg(short, long)]
    shell: bool,

    /// Describe a shell command
    #[arg(short = 'd', long)]
    describe_shell: bool,

    /// Generate code only
    #[arg(short, long)]
    code: bool,

    /// Continue (or start) the named chat session. `temp` always starts fresh.
    #[arg(long, value_name = "ID")]
    chat: Option<String>,

    /// Model to use (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Provider to ask (overrides config and SHELLCHAT_PROVIDER)
    #[arg(long, value_parser = ["openai", "gemini"])]
    platform: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long, value_parser = parse_temperature)]
    temperature: Option<f64>,

    /// Directory holding config.toml
    #[arg(long)]
    config_dir: Option<String>,

    /// List supported providers and their default models
    #[arg(long, conflicts_with_all = ["prompt", "chat", "list_chats", "show_chat", "delete_chat"])]
    list_providers: bool,

    /// List stored chat sessions
    #[arg(long, conflicts_with_all = ["prompt", "chat", "show_chat", "delete_chat"])]
    list_chats: bool,

    /// Print the transcript of a chat session
    #[arg(long, value_name = "ID", conflicts_with_all = ["prompt", "chat", "delete_chat"])]
    show_chat: Option<String>,

    /// Delete a chat session
    #[arg(long, value_name = "ID", conflicts_with_all = ["prompt", "chat"])]
    delete_chat: Option<String>,
}

impl Cli {
    fn role(&self) -> RoleKind {
        RoleKind::from_flags(self.shell, self.describe_shell, self.code)
    }
}

/// Join the prompt argument and piped input, trimming the piped part.
fn build_prompt(arg: Option<&str>, piped: Option<&str>) -> String {
    let piped = piped.map(str::trim).filter(|s| !s.is_empty());
    match (arg, piped) {
        (Some(arg), Some(piped)) => format!("{arg}\n{piped}"),
        (Some(arg), None) => arg.to_string(),
        (None, Some(piped)) => piped.to_string(),
        (None, None) => String::new(),
    }
}

/// How long to wait for the first piped byte when a prompt argument is present.
const STDIN_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

type StdinChunk = std::io::Result<Vec<u8>>;

/// Read stdin on a detached thread so a silent, never-closed pipe cannot
/// block runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<StdinChunk> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 8192];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Collect piped input until the writer closes it.
///
/// With `idle` set, returns `None` when no data arrives within that time.
/// Once the first chunk arrives the rest is read to the end.
async fn collect_piped(
    mut chunks: mpsc::UnboundedReceiver<StdinChunk>,
    idle: Option<Duration>,
) -> Result<Option<String>> {
    let first = match idle {
        Some(idle) => match tokio::time::timeout(idle, chunks.recv()).await {
            Ok(first) => first,
            Err(_) => {
                tracing::debug!(?idle, "no piped input arrived, ignoring stdin");
                return Ok(None);
            }
        },
        None => chunks.recv().await,
    };
    let Some(first) = first else {
        return Ok(None);
    };

    let mut bytes = first.context("Failed to read prompt from stdin")?;
    while let Some(chunk) = chunks.recv().await {
        bytes.extend(chunk.context("Failed to read prompt from stdin")?);
    }
    String::from_utf8(bytes)
        .map(Some)
        .context("Piped input is not valid UTF-8")
}

async fn read_piped_stdin(has_prompt: bool) -> Result<Option<String>> {
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let idle = has_prompt.then_some(STDIN_IDLE_TIMEOUT);
    collect_piped(spawn_stdin_reader(), idle).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("SHELLCHAT_CONFIG_DIR", config_dir);
    }

    // Logs go to stderr so stdout carries only the reply. Respects RUST_LOG, defaults to WARN.
    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    if cli.list_providers {
        return agent::list_providers(&mut std::io::stdout().lock());
    }

    let config = Config::load_or_init().await?;

    if cli.list_chats {
        let store = create_session_store(&config).await?;
        return agent::list_chats(store.as_ref(), &mut std::io::stdout().lock()).await;
    }
    if let Some(id) = &cli.show_chat {
        let store = create_session_store(&config).await?;
        return agent::show_chat(store.as_ref(), id, &mut std::io::stdout().lock()).await;
    }
    if let Some(id) = &cli.delete_chat {
        let store = create_session_store(&config).await?;
        return agent::delete_chat(store.as_ref(), id).await;
    }

    let piped = read_piped_stdin(cli.prompt.is_some()).await?;
    let request = Request {
        prompt: build_prompt(cli.prompt.as_deref(), piped.as_deref()),
        role: cli.role(),
        provider: cli.platform.clone(),
        chat_id: cli.chat.clone(),
        model: cli.model.clone(),
        temperature: cli.temperature,
    };

    // An interrupted request drops the in-flight completion, so nothing is persisted.
    let reply = tokio::select! {
        reply = agent::run(&config, request) => reply?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted before a reply arrived");
            std::process::exit(130);
        }
    };

    println!("{reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn role_flags_map_to_role_kind() {
        let cases = [
            (vec!["shellchat", "-s", "x"], RoleKind::Shell),
            (vec!["shellchat", "--describe-shell", "x"], RoleKind::DescribeShell),
            (vec!["shellchat", "-c", "x"], RoleKind::Code),
            (vec!["shellchat", "x"], RoleKind::Default),
        ];
        for (args, expected) in cases {
            let cli = Cli::try_parse_from(args.clone()).unwrap();
            assert_eq!(cli.role(), expected, "{args:?}");
        }
    }

    #[test]
    fn role_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["shellchat", "-s", "-c", "x"]).is_err());
        assert!(Cli::try_parse_from(["shellchat", "-d", "--shell", "x"]).is_err());
    }

    #[test]
    fn chat_and_model_flags_parse() {
        let cli = Cli::try_parse_from([
            "shellchat",
            "--chat",
            "proj1",
            "--model",
            "gpt-4o-mini",
            "-t",
            "0.3",
            "what is Go",
        ])
        .unwrap();
        assert_eq!(cli.chat.as_deref(), Some("proj1"));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.temperature, Some(0.3));
        assert_eq!(cli.prompt.as_deref(), Some("what is Go"));
    }

    #[test]
    fn platform_flag_accepts_known_providers_only() {
        let cli = Cli::try_parse_from(["shellchat", "--platform", "gemini", "x"]).unwrap();
        assert_eq!(cli.platform.as_deref(), Some("gemini"));
        assert!(Cli::try_parse_from(["shellchat", "--platform", "mistral", "x"]).is_err());

        assert!(Cli::try_parse_from(["shellchat", "--list-providers"]).is_ok());
        assert!(Cli::try_parse_from(["shellchat", "--list-providers", "hello"]).is_err());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["shellchat", "-t", "2.5", "x"]).is_err());
    }

    #[test]
    fn session_management_flags_conflict_with_prompt() {
        assert!(Cli::try_parse_from(["shellchat", "--list-chats"]).is_ok());
        assert!(Cli::try_parse_from(["shellchat", "--list-chats", "hello"]).is_err());
        assert!(Cli::try_parse_from(["shellchat", "--show-chat", "a", "--chat", "b"]).is_err());
        let cli = Cli::try_parse_from(["shellchat", "--delete-chat", "proj1"]).unwrap();
        assert_eq!(cli.delete_chat.as_deref(), Some("proj1"));
    }

    #[test]
    fn build_prompt_joins_argument_and_piped_input() {
        assert_eq!(
            build_prompt(Some("explain"), Some("  ls -la \n\n")),
            "explain\nls -la"
        );
        assert_eq!(build_prompt(Some("hello"), None), "hello");
        assert_eq!(build_prompt(Some("hello"), Some("   ")), "hello");
        assert_eq!(build_prompt(None, Some("piped\n")), "piped");
        assert_eq!(build_prompt(None, None), "");
    }

    #[tokio::test]
    async fn piped_chunks_are_joined_until_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(b"git diff ".to_vec())).unwrap();
        tx.send(Ok(b"output\n".to_vec())).unwrap();
        drop(tx);

        let piped = collect_piped(rx, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(piped.as_deref(), Some("git diff output\n"));
    }

    #[tokio::test]
    async fn silent_open_pipe_is_ignored_after_idle_timeout() {
        let (tx, rx) = mpsc::unbounded_channel::<StdinChunk>();

        let piped = collect_piped(rx, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(piped, None);
        drop(tx);
    }

    #[tokio::test]
    async fn without_idle_timeout_late_input_is_awaited() {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(Ok(b"late".to_vec())).unwrap();
        });

        let piped = collect_piped(rx, None).await.unwrap();
        assert_eq!(piped.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn empty_or_failed_pipe() {
        let (tx, rx) = mpsc::unbounded_channel::<StdinChunk>();
        drop(tx);
        assert_eq!(collect_piped(rx, None).await.unwrap(), None);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Err(std::io::Error::other("broken pipe"))).unwrap();
        drop(tx);
        let err = collect_piped(rx, None).await.unwrap_err();
        assert!(format!("{err:#}").contains("broken pipe"));
    }
}
