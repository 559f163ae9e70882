// src/core/error.rs

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Classification of why a probe could not produce a payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Connection,
    Protocol,
    InvalidInput,
    Unknown,
}

/// A classified probe failure. Probes build these with `?` internally and the
/// probe boundary turns them into `ProbeResult::Failure`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Protocol, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }
}

impl From<reqwest::Error> for ProbeFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeFailure::timeout(format!("HTTP request timed out: {}", e))
        } else if e.is_connect() {
            ProbeFailure::connection(format!("HTTP connection failed: {}", e))
        } else if e.is_status() {
            ProbeFailure::protocol(format!("HTTP error status: {}", e))
        } else if e.is_builder() {
            ProbeFailure::invalid_input(format!("Invalid HTTP request: {}", e))
        } else {
            ProbeFailure::protocol(format!("HTTP request failed: {}", e))
        }
    }
}

impl From<std::io::Error> for ProbeFailure {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                ProbeFailure::timeout(format!("Connection timed out: {}", e))
            }
            _ => ProbeFailure::connection(format!("Connection failed: {}", e)),
        }
    }
}
