//! Resumable page tokens.
//!
//! A token is a stack of [`PageState`] frames serialized as JSON. The top
//! frame names the resource type being enumerated and the upstream cursor
//! for it. Composite listings pop their initial frame and push one frame
//! per phase, so a caller only ever handles a single opaque string.
//!
//! ```
//! use xavyo_connector::pagination::Bag;
//!
//! let mut bag = Bag::decode("").unwrap();
//! bag.push_if_empty("project");
//! assert_eq!(bag.page_token(), "");
//!
//! let next = bag.next_token("2");
//! let mut resumed = Bag::decode(&next).unwrap();
//! assert_eq!(resumed.page_token(), "2");
//!
//! // Exhausting the only phase yields the terminal token.
//! assert_eq!(resumed.next_token(""), "");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// One frame of the pagination stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub resource_type_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

impl PageState {
    /// Frame with an empty upstream cursor.
    pub fn new(resource_type_id: impl Into<String>) -> Self {
        Self {
            resource_type_id: resource_type_id.into(),
            resource_id: String::new(),
            token: String::new(),
        }
    }

    /// Attach the id of the resource the frame belongs to.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }
}

/// Stack of page states. The last element is the current frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    states: Vec<PageState>,
}

impl Bag {
    /// Decode a token. The empty string yields an empty bag.
    pub fn decode(token: &str) -> ConnectorResult<Self> {
        if token.is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(token)
            .map_err(|e| ConnectorError::invalid_page_token(format!("{e}: {token}")))
    }

    /// Encode the bag. No frames means the terminal (empty) token.
    pub fn encode(&self) -> String {
        if self.states.is_empty() {
            return String::new();
        }
        // Plain strings in a derived struct cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Push the initial frame on a fresh bag. No-op when resuming.
    pub fn push_if_empty(&mut self, resource_type_id: &str) {
        if self.states.is_empty() {
            self.push(PageState::new(resource_type_id));
        }
    }

    pub fn push(&mut self, state: PageState) {
        self.states.push(state);
    }

    pub fn pop(&mut self) -> Option<PageState> {
        self.states.pop()
    }

    pub fn current(&self) -> Option<&PageState> {
        self.states.last()
    }

    /// Resource type id of the current frame.
    pub fn current_type(&self) -> Option<&str> {
        self.current().map(|s| s.resource_type_id.as_str())
    }

    /// Upstream cursor of the current frame, empty for a first page.
    pub fn page_token(&self) -> &str {
        self.current().map_or("", |s| s.token.as_str())
    }

    /// Record the upstream cursor for the next page of the current phase.
    ///
    /// An empty cursor means the phase is exhausted and its frame is popped.
    pub fn advance(&mut self, next_cursor: &str) {
        if next_cursor.is_empty() {
            self.states.pop();
        } else if let Some(state) = self.states.last_mut() {
            state.token = next_cursor.to_string();
        }
    }

    /// [`advance`](Self::advance) then [`encode`](Self::encode).
    pub fn next_token(&mut self, next_cursor: &str) -> String {
        self.advance(next_cursor);
        self.encode()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }
}
