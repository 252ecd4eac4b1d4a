//! Message Content
//!
//! The aggregator only needs three things from a message body: render it as
//! text, render it as bytes, and append text to it. [`MessageContent`] is
//! that capability; [`TextContent`] and [`MultiModalContent`] are the two
//! concrete shapes servers send.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Capability set the aggregator relies on
pub trait MessageContent:
    Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + 'static
{
    /// Render the content as text
    fn to_text(&self) -> String;

    /// Render the content as bytes (the per-chunk callback payload)
    fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }

    /// Append a text delta to the content
    fn append_text(&mut self, text: &str);
}

/// Plain text content: a JSON string on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextContent(pub String);

impl TextContent {
    /// Create text content
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Borrow the text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl MessageContent for TextContent {
    fn to_text(&self) -> String {
        self.0.clone()
    }

    fn append_text(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

impl From<&str> for TextContent {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// One part of a multimodal message
///
/// Servers set exactly one field per part in practice; all are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Text segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image URL or data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Audio URL or data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Video URL or data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl ContentPart {
    /// Create a text part
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Multimodal content: a JSON array of parts on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiModalContent(pub Vec<ContentPart>);

impl MultiModalContent {
    /// Borrow the parts
    #[must_use]
    pub fn parts(&self) -> &[ContentPart] {
        &self.0
    }
}

impl MessageContent for MultiModalContent {
    fn to_text(&self) -> String {
        self.0.iter().filter_map(|part| part.text.as_deref()).collect()
    }

    fn append_text(&mut self, text: &str) {
        match self.0.iter_mut().rev().find_map(|part| part.text.as_mut()) {
            Some(last) => last.push_str(text),
            None => self.0.push(ContentPart::text(text)),
        }
    }
}
