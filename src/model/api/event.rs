//! Messages exchanged over the realtime channel.
//!
//! Every message is a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::api::{is_blank, lunch_crew::DestinationSpec};

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to a crew, creating it if necessary.
    #[serde(rename = "join room")]
    JoinRoom(String),
    /// Draw a new winner for a crew.
    #[serde(rename = "pull lever")]
    PullLever(String),
    /// Propose a destination for a crew.
    #[serde(rename = "add destination")]
    AddDestination(DestinationSpec),
}

impl ClientEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join room",
            Self::PullLever(_) => "pull lever",
            Self::AddDestination(_) => "add destination",
        }
    }

    /// The crew this event is addressed to.
    pub fn crew_name(&self) -> &str {
        match self {
            Self::JoinRoom(name) | Self::PullLever(name) => name,
            Self::AddDestination(spec) => &spec.lunch_crew_name,
        }
    }

    /// Apply the same checks as the equivalent HTTP bodies.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::JoinRoom(name) | Self::PullLever(name) if is_blank(name) => {
                Err(Error::invalid_payload(self))
            }
            Self::AddDestination(spec) => spec.validate(),
            _ => Ok(()),
        }
    }
}

/// An event sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "destination options")]
    DestinationOptions(Vec<String>),
    #[serde(rename = "winning option")]
    WinningOption(String),
    /// Sent only to the client whose event failed.
    #[serde(rename = "error")]
    Error(EventError),
}

/// Details of a failed client event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    /// The event that failed, if it could be parsed at all.
    pub event: Option<String>,
    pub message: String,
}

impl ServerEvent {
    pub fn error(event: Option<&str>, message: impl Into<String>) -> Self {
        Self::Error(EventError {
            event: event.map(str::to_string),
            message: message.into(),
        })
    }
}
