// Typed errors for the collection and computation steps.
// Store, config and scheduler errors propagate as anyhow.

use std::time::Duration;

use crate::models::ProbeType;
use crate::probe_repo::Platform;

/// A probe could not be read. Fatal for the cycle; never retried.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawning `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` did not complete within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with {status}: {output}")]
    Status {
        command: String,
        status: String,
        output: String,
    },
    #[error("unparsable {source_name}: {detail}")]
    Parse { source_name: String, detail: String },
    #[error("probe type {0} requires a device")]
    MissingDevice(ProbeType),
    #[error("probe type {probe} is not supported on {platform}")]
    Unsupported { probe: ProbeType, platform: Platform },
}

impl CollectError {
    pub(crate) fn parse(source_name: &str, detail: impl Into<String>) -> Self {
        CollectError::Parse {
            source_name: source_name.to_string(),
            detail: detail.into(),
        }
    }
}

/// Two raw samples of different kinds were paired. A programming error, not a runtime condition.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("cannot map a {current} sample against a {previous} sample")]
    Mismatch {
        current: &'static str,
        previous: &'static str,
    },
}
