//! Request bodies.
//!
//! Bodies are plain owned data so a request can be resent verbatim after a
//! token refresh. Multipart forms are only turned into a transport form at
//! send time.

use serde::Serialize;

use super::transport::TransportError;

// =============================================================================
// REQUEST BODY
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// A pre-serialized JSON document.
    Json(String),
    /// Raw text sent as-is, e.g. a CSV payload with its own content type.
    Text(String),
    /// A multipart form; the transport supplies the boundary-bearing content type.
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Serialize `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self::Json)
    }

    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self::Json(value.to_string())
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

// =============================================================================
// MULTIPART
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        /// MIME type of the file; the transport guesses when absent.
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Clonable multipart form, built with chained calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text { name: name.into(), value: value.into() });
        self
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.parts.push(FormPart::File { name: name.into(), file_name: file_name.into(), mime: None, bytes });
        self
    }

    #[must_use]
    pub fn file_with_mime(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: Some(mime.into()),
            bytes,
        });
        self
    }

    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Convert into a `reqwest` form for sending.
    pub(crate) fn to_reqwest(&self) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, file_name, mime, bytes } => {
                    let mut file = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| TransportError::InvalidRequest(format!("invalid MIME type '{mime}': {e}")))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[cfg(test)]
#[path = "body_test.rs"]
mod tests;
