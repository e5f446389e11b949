//! System roles: the instruction prompt sent ahead of every fresh conversation.

use std::path::Path;

const SHELL_ROLE: &str = "Provide only {shell} commands for {os} without any description.\n\
If there is a lack of details, provide most logical solution.\n\
Ensure the output is a valid shell command.\n\
If multiple steps required try to combine them together using &&.\n\
Provide only plain text without Markdown formatting.\n\
Do not provide markdown formatting such as ```.";

const DESCRIBE_SHELL_ROLE: &str = "Provide a terse, single sentence description of the given shell command.\n\
Describe each argument and option of the command.\n\
Provide short responses in about 80 words.\n\
APPLY MARKDOWN formatting when possible.";

const CODE_ROLE: &str = "Provide only code as output without any description.\n\
Provide only code in plain text format without Markdown formatting.\n\
Do not include symbols such as ``` or ```python.\n\
If there is a lack of details, provide most logical solution.\n\
You are not allowed to ask for more details.\n\
For example if the prompt is \"Hello world Python\", you should return \"print('Hello world')\".";

const DEFAULT_ROLE: &str = "You are programming and system administration assistant.\n\
You are managing {os} operating system with {shell} shell.\n\
Provide short responses in about 100 words, unless you are specifically asked for more details.\n\
If you need to store any data, assume it will be stored in the conversation.\n\
APPLY MARKDOWN formatting when possible.";

/// Which built-in role a request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleKind {
    Shell,
    DescribeShell,
    Code,
    #[default]
    Default,
}

impl RoleKind {
    /// Resolve the role from the mutually exclusive CLI switches.
    ///
    /// Precedence when more than one is set: shell, describe-shell, code.
    pub fn from_flags(shell: bool, describe_shell: bool, code: bool) -> Self {
        if shell {
            Self::Shell
        } else if describe_shell {
            Self::DescribeShell
        } else if code {
            Self::Code
        } else {
            Self::Default
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Shell => "Shell Command Generator",
            Self::DescribeShell => "Shell Command Descriptor",
            Self::Code => "Code Generator",
            Self::Default => "ShellGPT",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Self::Shell => SHELL_ROLE,
            Self::DescribeShell => DESCRIBE_SHELL_ROLE,
            Self::Code => CODE_ROLE,
            Self::Default => DEFAULT_ROLE,
        }
    }
}

/// Host details substituted into role templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: String,
    pub shell: String,
}

impl Environment {
    pub fn new(os: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            shell: shell.into(),
        }
    }

    /// Detect the running OS and the basename of `$SHELL`.
    pub fn detect() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .and_then(|path| {
                Path::new(&path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let env = Self::new(std::env::consts::OS, shell);
        tracing::debug!(os = %env.os, shell = %env.shell, "detected environment");
        env
    }
}

/// A rendered system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRole {
    kind: RoleKind,
    prompt: String,
}

impl SystemRole {
    pub fn new(kind: RoleKind, env: &Environment) -> Self {
        let body = kind
            .template()
            .replace("{os}", &env.os)
            .replace("{shell}", &env.shell);
        Self {
            kind,
            prompt: format!("You are {}\n{body}", kind.display_name()),
        }
    }

    pub fn kind(&self) -> RoleKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}
