use std::time::Duration;

use thiserror::Error;

use crate::identifier::SinkIdentifier;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("sink resource {identifier} did not appear within {waited:?}")]
    ResourceNotFound {
        identifier: SinkIdentifier,
        waited: Duration,
    },
    #[error("sink resource {identifier} became unavailable: {reason}")]
    ResourceUnavailable {
        identifier: SinkIdentifier,
        reason: String,
    },
    #[error(
        "timed out after {waited:?} waiting for {requested} record(s) from {identifier} \
         (buffered={}): {buffered:?}",
        .buffered.len()
    )]
    Timeout {
        identifier: SinkIdentifier,
        requested: usize,
        buffered: Vec<String>,
        waited: Duration,
    },
    #[error("destination has no sink identifier or IO backend bound")]
    Unbound,
    #[error("failed to bind sink listener {identifier}: {source}")]
    Bind {
        identifier: SinkIdentifier,
        source: std::io::Error,
    },
    #[error("internal error: join failure: {0}")]
    Join(String),
}

impl HarvestError {
    pub(crate) fn unavailable(identifier: &SinkIdentifier, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            identifier: identifier.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable_io(identifier: &SinkIdentifier, err: &std::io::Error) -> Self {
        Self::unavailable(identifier, format!("{:?}: {err}", err.kind()))
    }

    /// Number of records that were buffered when a pop timed out.
    pub fn buffered_count(&self) -> Option<usize> {
        match self {
            Self::Timeout { buffered, .. } => Some(buffered.len()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_buffered_content() {
        let err = HarvestError::Timeout {
            identifier: SinkIdentifier::from("out.log"),
            requested: 3,
            buffered: vec!["foo".to_string()],
            waited: Duration::from_millis(20),
        };
        let text = err.to_string();
        assert!(text.contains("3 record(s)"));
        assert!(text.contains("buffered=1"));
        assert!(text.contains("\"foo\""));
        assert_eq!(err.buffered_count(), Some(1));
        assert!(err.is_timeout());
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = HarvestError::unavailable_io(&SinkIdentifier::from("x"), &io);
        match err {
            HarvestError::ResourceUnavailable { reason, .. } => {
                assert!(reason.starts_with("NotFound"));
                assert!(reason.contains("gone"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
