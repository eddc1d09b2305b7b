use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use url::Url;

use crate::error::ChatApiError;
use crate::url::Endpoints;

/// A file uploaded alongside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ChatApiError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, bytes))
    }

    fn part(&self) -> Result<Part, ChatApiError> {
        let part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        match self.mime.as_deref() {
            Some(mime) => Ok(part.mime_str(mime)?),
            None => Ok(part),
        }
    }
}

/// One streamed chat operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    /// New message, in a new chat when `chat_id` is `None`.
    Send {
        chat_id: Option<String>,
        message: String,
        files: Vec<Attachment>,
    },
    /// Regenerate the reply at `message_id`.
    Retry { chat_id: String, message_id: String },
    /// Replace the user message `message_id` and regenerate from there.
    Edit {
        chat_id: String,
        message_id: String,
        content: String,
    },
}

pub(crate) enum RequestBody {
    Form(Form),
    Json(Value),
}

impl ChatRequest {
    pub fn send(chat_id: Option<String>, message: impl Into<String>) -> Self {
        Self::Send {
            chat_id,
            message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn retry(chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::Retry {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }

    pub fn edit(
        chat_id: impl Into<String>,
        message_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Edit {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
            content: content.into(),
        }
    }

    /// Attach a file; no effect on retry and edit requests.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        if let Self::Send { files, .. } = &mut self {
            files.push(attachment);
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send",
            Self::Retry { .. } => "retry",
            Self::Edit { .. } => "edit",
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Send { chat_id, .. } => chat_id.as_deref(),
            Self::Retry { chat_id, .. } | Self::Edit { chat_id, .. } => Some(chat_id),
        }
    }

    pub fn endpoint(&self, endpoints: &Endpoints) -> Url {
        match self {
            Self::Send { .. } => endpoints.chat(),
            Self::Retry { .. } => endpoints.retry(),
            Self::Edit { .. } => endpoints.edit(),
        }
    }

    pub(crate) fn body(&self) -> Result<RequestBody, ChatApiError> {
        match self {
            Self::Send {
                chat_id,
                message,
                files,
            } => {
                let mut form = Form::new().text("message", message.clone());
                if let Some(chat_id) = chat_id {
                    form = form.text("chatId", chat_id.clone());
                }
                for file in files {
                    form = form.part("files", file.part()?);
                }
                Ok(RequestBody::Form(form))
            }
            Self::Retry {
                chat_id,
                message_id,
            } => Ok(RequestBody::Json(json!({
                "chatId": chat_id,
                "messageId": message_id,
            }))),
            Self::Edit {
                chat_id,
                message_id,
                content,
            } => Ok(RequestBody::Form(
                Form::new()
                    .text("chatId", chat_id.clone())
                    .text("messageId", message_id.clone())
                    .text("content", content.clone()),
            )),
        }
    }
}
