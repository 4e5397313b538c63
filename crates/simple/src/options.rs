use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PREFIX: &str = "/nunja";
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Overrides the interpreter `*.py` CGI scripts are run with.
pub const INTERPRETER_ENV: &str = "MOLDSERVE_PYTHON";

/// Where the simple server listens and what it serves besides the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub bind: String,
    pub port: u16,
    /// Path prefix the provider is mounted under; everything else falls
    /// back to `root`.
    pub prefix: String,
    /// Directory served for static files and CGI scripts.
    pub root: PathBuf,
    /// Program running `*.py` CGI scripts as `{interpreter} -u {script}`.
    pub interpreter: String,
}

/// `$MOLDSERVE_PYTHON`, or `python3`.
pub fn default_interpreter() -> String {
    std::env::var(INTERPRETER_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            prefix: DEFAULT_PREFIX.to_string(),
            root: PathBuf::from("."),
            interpreter: default_interpreter(),
        }
    }
}
