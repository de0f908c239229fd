use std::fmt;

use thiserror::Error;

use crate::model::WorkflowId;

/// Network or HTTP failure reported by the remote client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RequestError {
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|status| (400..500).contains(&status))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "request failed ({status}): {}", self.message),
            None => write!(f, "request failed: {}", self.message),
        }
    }
}

/// A client-side guard rejected a command before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("select a script before approving")]
    NoScriptSelected,
    #[error("select a thumbnail before finalizing")]
    NoThumbnailSelected,
    #[error("the A/B test is not running")]
    TestNotRunning,
    #[error("{0} is not one of the available variants")]
    UnknownVariant(String),
    #[error("{action} is not available while the workflow is {status}")]
    ActionUnavailable { action: &'static str, status: String },
    #[error("another command is still in flight for workflow {0}")]
    CommandInFlight(WorkflowId),
    #[error("a workflow is already being started")]
    StartInFlight,
    #[error("no workflow is open")]
    NoSubject,
    #[error("workflow data has not loaded yet")]
    NotLoaded,
    #[error("topic is required")]
    EmptyTopic,
    #[error("topic must be at most {max} characters")]
    TopicTooLong { max: usize },
}

/// A result arrived for an identifier or generation that is no longer current.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleDataError {
    #[error("result issued under generation {issued}, current is {current}")]
    Generation { issued: u64, current: u64 },
    #[error("result for workflow {received} does not match {expected}")]
    Subject {
        expected: WorkflowId,
        received: WorkflowId,
    },
    #[error("result superseded by a newer request")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
