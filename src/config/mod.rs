use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the per-upload directory that holds chunks before reassembly.
pub const CHUNK_DIR_NAME: &str = "chunks";

/// Decides when an upload counts as complete and gets reassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Combine once every part `0..total_parts` is present in the staging area.
    AllParts,
    /// Combine as soon as the chunk with the highest part index is stored,
    /// without checking that the other parts arrived.
    LastIndex,
}

impl FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all-parts" | "all_parts" | "count" => Ok(Self::AllParts),
            "last-index" | "last_index" | "index" => Ok(Self::LastIndex),
            other => Err(format!("unknown completion policy: {other}")),
        }
    }
}

impl fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllParts => f.write_str("all-parts"),
            Self::LastIndex => f.write_str("last-index"),
        }
    }
}

/// Configuration for the upload endpoints and the storage engine behind them
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum declared file size in bytes, 0 for unlimited (default: 0)
    pub max_file_size: u64,

    /// Root directory for staged chunks and assembled files (default: "tmp")
    pub upload_dir: PathBuf,

    /// Port the HTTP server listens on (default: 8000)
    pub port: u16,

    /// Multipart field carrying the chunk bytes (default: "qqfile")
    pub file_input_name: String,

    /// Directory served for every unmatched GET (default: "_build")
    pub public_dir: PathBuf,

    /// When to trigger reassembly (default: all-parts)
    pub completion_policy: CompletionPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 0,
            upload_dir: PathBuf::from("tmp"),
            port: 8000,
            file_input_name: "qqfile".to_string(),
            public_dir: PathBuf::from("_build"),
            completion_policy: CompletionPolicy::AllParts,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source. Unparseable values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            max_file_size: lookup("MAX_FILE_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.max_file_size),

            upload_dir: lookup("UPLOAD_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            port: lookup("SERVER_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.port),

            file_input_name: lookup("FILE_INPUT_NAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.file_input_name),

            public_dir: lookup("PUBLIC_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.public_dir),

            completion_policy: lookup("COMPLETION_POLICY")
                .and_then(|v| match v.parse() {
                    Ok(policy) => Some(policy),
                    Err(e) => {
                        tracing::warn!("Ignoring COMPLETION_POLICY: {}", e);
                        None
                    }
                })
                .unwrap_or(default.completion_policy),
        }
    }

    /// Config rooted in `dir` with no size limit, for local runs and tests
    pub fn development(dir: &Path) -> Self {
        Self {
            upload_dir: dir.join("uploads"),
            public_dir: dir.join("public"),
            ..Self::default()
        }
    }

    /// Request body ceiling for the upload route; `None` disables the limit.
    pub fn body_limit(&self) -> Option<usize> {
        if self.max_file_size == 0 {
            return None;
        }
        // multipart framing and form fields ride on top of the chunk bytes
        usize::try_from(self.max_file_size)
            .ok()
            .map(|max| max.saturating_add(10 * 1024 * 1024))
    }
}
