//! Message value type crossing the broker boundary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single published message: a server-or-client-assigned id and an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: serde_json::Value,
}

impl Message {
    /// Build a message, generating a v4 UUID if `id` is absent.
    ///
    /// Returns an error if `id` is present but not a syntactically valid UUID.
    pub fn admit(id: Option<String>, payload: serde_json::Value) -> Result<Self, InvalidId> {
        let id = match id {
            Some(id) => {
                Uuid::parse_str(&id).map_err(|_| InvalidId(id.clone()))?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        Ok(Self { id, payload })
    }
}

/// The supplied message id was not a syntactically valid UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidId(pub String);
