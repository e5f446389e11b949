//! Provider subsystem for model inference backends.
//!
//! Each backend implements the [`Provider`] trait defined in [`traits`] and is
//! registered in [`create_provider`] by its canonical string key.

pub mod compatible;
pub mod gemini;
#[cfg(test)]
pub(crate) mod test_server;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use gemini::GeminiProvider;
pub use traits::Provider;

const MAX_API_ERROR_CHARS: usize = 200;

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts tokens with prefixes like `sk-`, `AIza`, `xoxb-`, `xoxp-`, `ghp_`,
/// `gho_`, `ghu_`, and `github_pat_`.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 8] = [
        "sk-",
        "AIza",
        "xoxb-",
        "xoxp-",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Information about a supported provider for display purposes.
#[derive(Debug, Clone, Copy)]
pub struct ProviderInfo {
    /// Canonical name used in config and `--platform` (e.g. `"openai"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    /// Model used when neither the request nor the config names one
    pub default_model: &'static str,
    /// Provider-specific key variables, checked in order after `SHELLCHAT_API_KEY`
    pub key_env: &'static [&'static str],
}

const PROVIDERS: [ProviderInfo; 2] = [
    ProviderInfo {
        name: "openai",
        display_name: "OpenAI",
        default_model: crate::sessions::DEFAULT_MODEL,
        key_env: &["OPENAI_API_KEY", "SGPT_OPENAI_API_KEY"],
    },
    ProviderInfo {
        name: "gemini",
        display_name: "Google Gemini",
        default_model: "gemini-2.0-flash",
        key_env: &["GEMINI_API_KEY", "SGPT_GEMINI_API_KEY"],
    },
];

pub fn list_providers() -> Vec<ProviderInfo> {
    PROVIDERS.to_vec()
}

pub fn provider_info(name: &str) -> Option<ProviderInfo> {
    PROVIDERS.iter().find(|p| p.name == name).copied()
}

/// Default model for `name`, falling back to the OpenAI default for unknown names.
pub fn default_model(name: &str) -> &'static str {
    provider_info(name).map_or(crate::sessions::DEFAULT_MODEL, |p| p.default_model)
}

/// Resolve API key for a provider from config and environment variables.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    resolve_provider_credential_with(name, credential_override, |var| std::env::var(var).ok())
}

/// Credential order: the explicit key (config `api_key`, which
/// `SHELLCHAT_API_KEY` already overrides), then the provider's own variables.
fn resolve_provider_credential_with(
    name: &str,
    credential_override: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env_candidates = provider_info(name).map_or(&[] as &[&str], |p| p.key_env);
    provider_env_candidates.iter().find_map(|env_var| {
        lookup(env_var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn custom_url(api_url: Option<&str>) -> Option<&str> {
    api_url.map(str::trim).filter(|url| !url.is_empty())
}

/// Factory: create the right provider from config with optional custom base URL.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let key = resolve_provider_credential(name, api_key);

    match name {
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            name,
            custom_url(api_url).unwrap_or(compatible::OPENAI_BASE_URL),
            key.as_deref(),
        ))),
        "gemini" => Ok(Box::new(GeminiProvider::new(
            custom_url(api_url).unwrap_or(gemini::GEMINI_BASE_URL),
            key.as_deref(),
        ))),
        _ => {
            let supported: Vec<&str> = PROVIDERS.iter().map(|p| p.name).collect();
            anyhow::bail!(
                "Unknown provider: {name}. Supported: {}",
                supported.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_openai() {
        let provider = create_provider("openai", Some("provider-test-credential"), None).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn factory_gemini() {
        let provider = create_provider("gemini", Some("provider-test-credential"), None).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn factory_unknown_provider_errors() {
        let p = create_provider("nonexistent", None, None);
        let msg = p.err().unwrap().to_string();
        assert!(msg.contains("Unknown provider"));
        assert!(msg.contains("Supported: openai, gemini"), "{msg}");
    }

    #[test]
    fn factory_empty_name_errors() {
        assert!(create_provider("", None, None).is_err());
    }

    #[test]
    fn factory_honors_custom_url() {
        assert!(create_provider("openai", Some("k"), Some("http://localhost:8080/v1")).is_ok());
        assert!(create_provider("openai", Some("k"), Some("   ")).is_ok());
    }

    #[test]
    fn listed_providers_are_constructible() {
        let mut ids = std::collections::HashSet::new();
        for provider in list_providers() {
            assert!(ids.insert(provider.name), "duplicate id {}", provider.name);
            assert!(!provider.display_name.is_empty());
            assert!(!provider.default_model.is_empty());
            assert!(!provider.key_env.is_empty());
            assert!(
                create_provider(provider.name, Some("provider-test-credential"), None).is_ok(),
                "Canonical provider id should be constructible: {}",
                provider.name
            );
        }
    }

    // ── API error sanitization ───────────────────────────────

    #[test]
    fn sanitize_scrubs_sk_prefix() {
        let input = "request failed: sk-1234567890abcdef";
        let out = sanitize_api_error(input);
        assert!(!out.contains("sk-1234567890abcdef"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_scrubs_multiple_prefixes() {
        let input = "keys sk-abcdef xoxb-12345 xoxp-67890";
        let out = sanitize_api_error(input);
        assert!(!out.contains("sk-abcdef"));
        assert!(!out.contains("xoxb-12345"));
        assert!(!out.contains("xoxp-67890"));
    }

    #[test]
    fn sanitize_truncates_long_error() {
        let long = "a".repeat(400);
        let result = sanitize_api_error(&long);
        assert!(result.len() <= 203);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn sanitize_no_secret_no_change() {
        let input = "simple upstream timeout";
        let result = sanitize_api_error(input);
        assert_eq!(result, input);
    }

    #[test]
    fn scrub_github_personal_access_token() {
        let input = "auth failed with token ghp_abc123def456";
        let result = scrub_secret_patterns(input);
        assert_eq!(result, "auth failed with token [REDACTED]");
    }

    #[test]
    fn scrub_github_fine_grained_pat() {
        let input = "failed: github_pat_11AABBC_xyzzy789";
        let result = scrub_secret_patterns(input);
        assert_eq!(result, "failed: [REDACTED]");
    }

    #[test]
    fn scrub_google_api_key() {
        let input = "API key not valid: AIzaSyA1b2C3-d4_e5";
        assert_eq!(scrub_secret_patterns(input), "API key not valid: [REDACTED]");
    }

    #[test]
    fn default_model_follows_provider() {
        assert_eq!(default_model("openai"), "gpt-4o");
        assert_eq!(default_model("gemini"), "gemini-2.0-flash");
        assert_eq!(default_model("unknown"), "gpt-4o");
        assert!(provider_info("unknown").is_none());
    }

    fn env_of(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn resolve_provider_credential_prefers_explicit_argument() {
        let resolved = resolve_provider_credential("openai", Some("  explicit-key  "));
        assert_eq!(resolved, Some("explicit-key".to_string()));

        let resolved = resolve_provider_credential_with(
            "openai",
            Some("explicit-key"),
            env_of(&[("OPENAI_API_KEY", "env-key")]),
        );
        assert_eq!(resolved.as_deref(), Some("explicit-key"));
    }

    #[test]
    fn resolve_provider_credential_checks_provider_then_legacy_env() {
        let both = env_of(&[
            ("OPENAI_API_KEY", "openai-key"),
            ("SGPT_OPENAI_API_KEY", "legacy-key"),
        ]);
        assert_eq!(
            resolve_provider_credential_with("openai", None, both).as_deref(),
            Some("openai-key")
        );

        let legacy = env_of(&[("OPENAI_API_KEY", "  "), ("SGPT_OPENAI_API_KEY", "legacy-key")]);
        assert_eq!(
            resolve_provider_credential_with("openai", Some(""), legacy).as_deref(),
            Some("legacy-key")
        );
    }

    #[test]
    fn resolve_provider_credential_is_per_provider() {
        let env = env_of(&[
            ("SGPT_OPENAI_API_KEY", "openai-legacy"),
            ("SGPT_GEMINI_API_KEY", "gemini-legacy"),
        ]);
        assert_eq!(
            resolve_provider_credential_with("gemini", None, &env).as_deref(),
            Some("gemini-legacy")
        );
        assert_eq!(
            resolve_provider_credential_with("openai", None, &env).as_deref(),
            Some("openai-legacy")
        );
        assert_eq!(resolve_provider_credential_with("other", None, &env), None);
    }
}
