// Errors for the fallible edges of the engine.
//
// The steering core itself never fails: bad geometry degrades to a zero
// force and out-of-range tiles wrap. Only loading and checking tunables can
// go wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Problems encountered while loading or validating a `GameConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid RON for `GameConfig`.
    #[error("failed to parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// A value parsed fine but is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
