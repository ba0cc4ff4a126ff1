//! Broker error types

use thiserror::Error;

/// Error returned by [`super::Broker`] registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("topic '{0}' already exists")]
    NameInUse(String),
    #[error("topic '{0}' not found")]
    NotFound(String),
    #[error("topic capacity exceeded (max {0})")]
    CapacityExceeded(usize),
    #[error("topic name must not be empty")]
    EmptyName,
}

/// Error returned by [`super::Topic`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("subscriber capacity exceeded (max {0})")]
    CapacityExceeded(usize),
    #[error("client '{0}' is already subscribed to this topic")]
    AlreadySubscribed(String),
}
