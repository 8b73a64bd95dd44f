//! `multipart/form-data` bodies.
//!
//! The wire format itself is handled by an external [`MultipartCodec`]; this module only owns
//! the decoded form and the `Content-Type` boundary handling around it.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use crate::protocol::{ParseError, SendError};

/// An uploaded file of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

/// A decoded `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipartForm {
    pub values: BTreeMap<String, Vec<String>>,
    pub files: BTreeMap<String, Vec<FilePart>>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn add_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.files.entry(name.into()).or_default().push(file);
    }

    /// The first value of the field `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.files.is_empty()
    }
}

/// Reads and writes the `multipart/form-data` wire format.
#[cfg_attr(test, mockall::automock)]
pub trait MultipartCodec: Send + Sync {
    /// Decodes `body`, keeping at most `max_in_memory` bytes of file content in memory.
    fn decode(&self, body: &[u8], boundary: &str, max_in_memory: usize) -> Result<MultipartForm, ParseError>;

    /// Appends the encoded `form` to `dst`.
    fn encode(&self, form: &MultipartForm, boundary: &str, dst: &mut BytesMut) -> Result<(), SendError>;
}

/// The boundary of a `multipart/form-data` content type, `None` for any other type.
pub fn multipart_form_boundary(content_type: &[u8]) -> Option<String> {
    let content_type = std::str::from_utf8(content_type).ok()?;
    let mime: mime::Mime = content_type.parse().ok()?;
    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return None;
    }
    mime.get_param(mime::BOUNDARY).map(|boundary| boundary.as_str().to_owned()).filter(|b| !b.is_empty())
}
