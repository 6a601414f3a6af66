use crate::error::{GraderError, GraderResult};
use crate::executor::DEFAULT_TIMEOUT_MS;
use std::path::PathBuf;

pub const SCRATCH_DIR_VAR: &str = "GRADER_SCRATCH_DIR";
pub const TIMEOUT_VAR: &str = "GRADER_TIMEOUT_MS";

/// Engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct GraderConfig {
    /// Shared parent of every execution's scratch directory
    pub scratch_root: PathBuf,
    /// Used when a request names no timeout of its own
    pub default_timeout_ms: u64,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl GraderConfig {
    pub fn from_env() -> GraderResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> GraderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());

        if let Some(dir) = get(SCRATCH_DIR_VAR) {
            config.scratch_root = PathBuf::from(dir);
        }
        if let Some(raw) = get(TIMEOUT_VAR) {
            config.default_timeout_ms = match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(GraderError::InvalidConfig {
                        key: TIMEOUT_VAR,
                        value: raw,
                    })
                }
            };
        }
        Ok(config)
    }
}

fn default_scratch_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("code-grader")
}
