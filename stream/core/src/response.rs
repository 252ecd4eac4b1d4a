//! Typed Responses
//!
//! The structured payload of one `data:` line, and also the cumulative
//! result the aggregator hands back. Servers wrap choices in an `output`
//! object; a bare top-level `choices` array is accepted too.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::MessageContent;

/// A chat message: role plus content
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: MessageContent"))]
pub struct ChatMessage<C> {
    /// Author role (e.g. `assistant`)
    #[serde(default)]
    pub role: String,
    /// Message body
    #[serde(default)]
    pub content: C,
}

/// One completion slot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: MessageContent"))]
pub struct Choice<C> {
    /// Accumulated message
    #[serde(default)]
    pub message: ChatMessage<C>,
    /// Why generation stopped, once it has
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Response payload, partial (one chunk) or cumulative (aggregated)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "ResponseWire<C>",
    bound(serialize = "C: Serialize", deserialize = "C: MessageContent")
)]
pub struct ChatResponse<C> {
    /// Server-assigned request identifier
    pub request_id: String,
    /// Usage metadata, passed through untouched
    pub usage: Option<Value>,
    /// Completion slots
    pub choices: Vec<Choice<C>>,
}

impl<C> Default for ChatResponse<C> {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            usage: None,
            choices: Vec::new(),
        }
    }
}

impl<C: MessageContent> ChatResponse<C> {
    /// Content of the first choice, if any
    #[must_use]
    pub fn first_content(&self) -> Option<&C> {
        self.choices.first().map(|choice| &choice.message.content)
    }

    /// Text of the first choice, empty when there is none
    #[must_use]
    pub fn text(&self) -> String {
        self.first_content()
            .map(MessageContent::to_text)
            .unwrap_or_default()
    }

    /// Finish reason of the first choice
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "C: MessageContent"))]
struct OutputWire<C> {
    #[serde(default = "Vec::new")]
    choices: Vec<Choice<C>>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "C: MessageContent"))]
struct ResponseWire<C> {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
    #[serde(default = "Option::default")]
    output: Option<OutputWire<C>>,
    #[serde(default = "Option::default")]
    choices: Option<Vec<Choice<C>>>,
}

impl<C> From<ResponseWire<C>> for ChatResponse<C> {
    fn from(wire: ResponseWire<C>) -> Self {
        let choices = wire
            .output
            .map(|output| output.choices)
            .or(wire.choices)
            .unwrap_or_default();
        Self {
            request_id: wire.request_id.unwrap_or_default(),
            usage: wire.usage.filter(|usage| !usage.is_null()),
            choices,
        }
    }
}
