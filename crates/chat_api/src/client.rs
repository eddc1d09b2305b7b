use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tool_transcript::{
    reconstruct, Conversation, DecoderState, LiveDecoder, StreamObserver, TranscriptSession,
    Turn,
};
use tracing::{debug, info, warn};

use crate::config::ChatApiConfig;
use crate::error::{parse_error_message, ChatApiError};
use crate::history::{parse_history, ChatHistory, ChatMeta};
use crate::request::{ChatRequest, RequestBody};
use crate::retry::LoadFailure;
use crate::url::Endpoints;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
    endpoints: Endpoints,
    streaming: AtomicBool,
}

/// A chat loaded from history and replayed into turns.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedChat {
    pub chat: ChatMeta,
    pub conversation: Conversation,
}

struct StreamingGuard<'a>(&'a AtomicBool);

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let endpoints = Endpoints::new(&config.base_url)?;
        let mut builder = Client::builder().default_headers(build_headers(&config)?);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = config.user_agent.as_deref() {
            builder = builder.user_agent(user_agent);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self {
            http,
            config,
            endpoints,
            streaming: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Whether a [`stream_chat`](Self::stream_chat) call is in flight.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Run one streamed chat operation into `conversation`.
    ///
    /// The conversation is prepared for the request first (a new exchange
    /// for a send, truncation for retry and edit), then every received chunk
    /// is decoded into the assistant turn. Cancellation settles the turn as
    /// aborted and keeps its text; a transport failure replaces it with an
    /// error turn and is returned as `Err`.
    pub async fn stream_chat<O>(
        &self,
        request: &ChatRequest,
        session: &mut TranscriptSession,
        conversation: &mut Conversation,
        observer: &mut O,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<DecoderState, ChatApiError>
    where
        O: StreamObserver + ?Sized,
    {
        let _guard = self.begin_stream()?;
        let builder = self.build_request(request)?;
        prepare_conversation(request, conversation);
        info!(
            kind = request.kind(),
            chat_id = request.chat_id().unwrap_or(""),
            "chat stream starting"
        );

        let mut decoder = LiveDecoder::new(session);
        let state = self
            .drive(builder, &mut decoder, conversation, observer, cancellation)
            .await?;
        info!(state = state.as_str(), "chat stream finished");
        Ok(state)
    }

    async fn drive<O>(
        &self,
        builder: RequestBuilder,
        decoder: &mut LiveDecoder<'_>,
        conversation: &mut Conversation,
        observer: &mut O,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<DecoderState, ChatApiError>
    where
        O: StreamObserver + ?Sized,
    {
        let response = match await_or_cancel(builder.send(), cancellation).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                decoder.fail(conversation, &error.to_string(), observer);
                return Err(ChatApiError::Request(error));
            }
            Err(ChatApiError::Cancelled) => return Ok(decoder.abort(conversation, observer)),
            Err(error) => return Err(error),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(status, &body);
            decoder.fail(conversation, &message, observer);
            return Err(ChatApiError::Status(status, message));
        }

        let mut bytes = response.bytes_stream();
        loop {
            let next = match await_or_cancel(bytes.next(), cancellation).await {
                Ok(next) => next,
                Err(ChatApiError::Cancelled) => {
                    info!("chat stream cancelled");
                    return Ok(decoder.abort(conversation, observer));
                }
                Err(error) => return Err(error),
            };
            let Some(chunk) = next else {
                break;
            };
            if is_cancelled(cancellation) {
                return Ok(decoder.abort(conversation, observer));
            }
            match chunk {
                Ok(chunk) => {
                    if decoder.feed(conversation, &chunk, observer).is_terminal() {
                        debug!(state = decoder.state().as_str(), "decoder reached terminal state");
                        break;
                    }
                }
                Err(error) => {
                    decoder.fail(conversation, &error.to_string(), observer);
                    return Err(ChatApiError::Request(error));
                }
            }
        }

        Ok(decoder.finish(conversation, observer))
    }

    /// Ask the service to stop generating for `chat_id`.
    pub async fn abort(&self, chat_id: &str) -> Result<(), ChatApiError> {
        let response = self.http.post(self.endpoints.abort(chat_id)).send().await?;
        let status = response.status();
        if status.is_success() {
            info!(%chat_id, "abort acknowledged");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatApiError::Status(status, parse_error_message(status, &body)))
    }

    /// Fetch the persisted history of `chat_id`, retrying transient failures.
    pub async fn load_chat(
        &self,
        chat_id: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ChatHistory, ChatApiError> {
        let url = self.endpoints.history(chat_id);
        let policy = self.config.retry;
        let mut last_status: Option<StatusCode> = None;
        let mut attempt = 0;

        loop {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            let response = await_or_cancel(self.http.get(url.clone()).send(), cancellation).await?;
            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    let message = error.to_string();
                    if !policy.should_retry(attempt, &LoadFailure::Transport) {
                        return Err(ChatApiError::RetryExhausted {
                            status: last_status,
                            last_error: Some(message),
                        });
                    }
                    warn!(%chat_id, attempt, %message, "retrying chat load");
                    await_or_cancel(tokio::time::sleep(policy.delay(attempt)), cancellation).await?;
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .map_err(ChatApiError::from)?;
            if status.is_success() {
                let history = parse_history(&body)?;
                debug!(%chat_id, rows = history.messages.len(), "chat history loaded");
                return Ok(history);
            }

            let message = parse_error_message(status, &body);
            let failure = LoadFailure::Status {
                status,
                body: &body,
            };
            if !policy.should_retry(attempt, &failure) {
                return Err(ChatApiError::Status(status, message));
            }
            warn!(%chat_id, attempt, status = status.as_u16(), %message, "retrying chat load");
            last_status = Some(status);
            await_or_cancel(tokio::time::sleep(policy.delay(attempt)), cancellation).await?;
            attempt += 1;
        }
    }

    /// Load `chat_id` and replay its rows into a conversation.
    pub async fn load_transcript(
        &self,
        chat_id: &str,
        session: &mut TranscriptSession,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<LoadedChat, ChatApiError> {
        let history = self.load_chat(chat_id, cancellation).await?;
        let turns = reconstruct(session, &history.messages)?;
        Ok(LoadedChat {
            chat: history.chat,
            conversation: Conversation::from_turns(turns),
        })
    }

    fn begin_stream(&self) -> Result<StreamingGuard<'_>, ChatApiError> {
        self.streaming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ChatApiError::AlreadyStreaming)?;
        Ok(StreamingGuard(&self.streaming))
    }

    fn build_request(&self, request: &ChatRequest) -> Result<RequestBuilder, ChatApiError> {
        let builder = self.http.post(request.endpoint(&self.endpoints));
        Ok(match request.body()? {
            RequestBody::Form(form) => builder.multipart(form),
            RequestBody::Json(body) => builder.json(&body),
        })
    }
}

fn build_headers(config: &ChatApiConfig) -> Result<HeaderMap, ChatApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in &config.extra_headers {
        out.insert(
            HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                ChatApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
            })?,
            HeaderValue::from_str(value).map_err(|_| {
                ChatApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
            })?,
        );
    }
    Ok(out)
}

/// Shape the local turn list for a request before its stream starts.
fn prepare_conversation(request: &ChatRequest, conversation: &mut Conversation) {
    match request {
        ChatRequest::Send { message, files, .. } => {
            let names = files
                .iter()
                .map(|file| Value::String(file.file_name.clone()))
                .collect();
            conversation.begin_exchange(message.clone(), names);
        }
        ChatRequest::Retry { message_id, .. } => {
            if !conversation.reset_for_retry(message_id) {
                warn!(%message_id, "retry target not in conversation; appending a fresh turn");
                conversation.turns.push(Turn::assistant(""));
            }
        }
        ChatRequest::Edit {
            message_id,
            content,
            ..
        } => {
            if !conversation.reset_for_edit(message_id, content.clone()) {
                warn!(%message_id, "edit target not in conversation; starting a new exchange");
                conversation.begin_exchange(content.clone(), Vec::new());
            }
        }
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
