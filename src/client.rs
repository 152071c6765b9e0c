// src/client.rs

//! Rotating-credential façade over the Gemini transport.
//!
//! The client holds an ordered list of API keys and a transport bound to the
//! "active" one. A call that fails with a quota error is re-issued on the next
//! key, until it succeeds, fails for another reason, or the last key is spent.
//!
//! Rotation never wraps: once the active index reaches the last key it stays
//! there, and a quota error on that key ends the call with
//! [`ClientError::Exhausted`]. Every attempt within one call uses a strictly
//! greater index than the one before, so a call makes at most `len` attempts.
//!
//! Requests are assumed to be idempotent; a retried request is sent again
//! verbatim with no deduplication.

use crate::classify::{classify, ErrorClass};
use crate::credentials::{preview, CredentialProvider, CredentialSet};
use crate::error::{ClientError, ProviderError};
use crate::metrics;
use crate::transport::{CallConfig, Transport, TransportFactory};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// One logical operation requested by a caller.
#[derive(Debug, Clone, Copy)]
enum CallRequest<'a> {
    OneShot {
        model: &'a str,
        payload: &'a Value,
        config: Option<&'a CallConfig>,
    },
    Conversation {
        model: &'a str,
        config: Option<&'a CallConfig>,
        message: &'a str,
    },
}

impl CallRequest<'_> {
    fn operation(&self) -> &'static str {
        match self {
            Self::OneShot { .. } => "one_shot",
            Self::Conversation { .. } => "converse",
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::OneShot { model, .. } | Self::Conversation { model, .. } => model,
        }
    }

    async fn dispatch(&self, transport: &dyn Transport) -> Result<String, ProviderError> {
        match *self {
            Self::OneShot {
                model,
                payload,
                config,
            } => transport.generate(model, payload, config).await,
            Self::Conversation {
                model,
                config,
                message,
            } => {
                let mut conversation = transport.start_conversation(model, config);
                conversation.send(message).await
            }
        }
    }
}

/// Position of the active key and the transport bound to it.
#[derive(Default)]
struct RotationState {
    active_index: usize,
    handle: Option<Arc<dyn Transport>>,
}

/// Snapshot of the client's rotation state, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationStatus {
    pub configured: usize,
    pub active_index: usize,
}

pub struct RotatingCredentialClient {
    provider: Box<dyn CredentialProvider>,
    credentials: OnceCell<CredentialSet>,
    factory: Arc<dyn TransportFactory>,
    state: Mutex<RotationState>,
}

impl RotatingCredentialClient {
    /// Creates a client. Keys are read from `provider` on first use, not here.
    pub fn new(
        provider: impl CredentialProvider + 'static,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            credentials: OnceCell::new(),
            factory,
            state: Mutex::new(RotationState::default()),
        }
    }

    /// Generates content from a single payload and returns the text unchanged.
    pub async fn one_shot(
        &self,
        model: &str,
        payload: &Value,
        config: Option<&CallConfig>,
    ) -> Result<String, ClientError> {
        self.execute(CallRequest::OneShot {
            model,
            payload,
            config,
        })
        .await
    }

    /// Starts a fresh conversation, sends `message` and returns the reply.
    ///
    /// No history is kept between calls.
    pub async fn converse(
        &self,
        model: &str,
        system_instruction: Option<&str>,
        message: &str,
    ) -> Result<String, ClientError> {
        if message.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }
        let config = system_instruction.map(CallConfig::with_system_instruction);
        self.execute(CallRequest::Conversation {
            model,
            config: config.as_ref(),
            message,
        })
        .await
    }

    /// Number of configured keys. Triggers the lazy load.
    pub fn credential_count(&self) -> usize {
        self.credentials().len()
    }

    pub fn active_index(&self) -> usize {
        self.state.lock().active_index
    }

    pub fn status(&self) -> RotationStatus {
        RotationStatus {
            configured: self.credential_count(),
            active_index: self.active_index(),
        }
    }

    fn credentials(&self) -> &CredentialSet {
        self.credentials.get_or_init(|| {
            let set = self.provider.load();
            if set.is_empty() {
                warn!("No Gemini API keys found in environment variables.");
            } else {
                info!(keys = set.len(), "Gemini API keys loaded");
            }
            metrics::record_keys_configured(set.len());
            // rotation state starts on the first key
            metrics::record_active_index(0);
            set
        })
    }

    #[instrument(
        level = "debug",
        skip(self, request),
        fields(operation = request.operation(), model = request.model())
    )]
    async fn execute(&self, request: CallRequest<'_>) -> Result<String, ClientError> {
        if request.model().trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "model identifier must not be empty".to_string(),
            ));
        }

        let credentials = self.credentials();
        if credentials.is_empty() {
            return Err(ClientError::ConfigurationEmpty);
        }

        let operation = request.operation();
        let mut attempts = 0usize;
        loop {
            let (index, transport) = self.current_handle(credentials)?;
            attempts += 1;
            debug!(key.index = index, attempt = attempts, "Dispatching request");

            let err = match request.dispatch(transport.as_ref()).await {
                Ok(text) => {
                    metrics::record_attempt(operation, "success");
                    return Ok(text);
                }
                Err(err) => err,
            };

            match classify(&err) {
                ErrorClass::Fatal => {
                    metrics::record_attempt(operation, "fatal");
                    warn!(
                        key.index = index,
                        upstream.status = ?err.status,
                        error = %err,
                        "Gemini request failed with a non-quota error"
                    );
                    return Err(ClientError::Fatal(err));
                }
                ErrorClass::QuotaExhausted => {
                    metrics::record_attempt(operation, "quota");
                    warn!(
                        key.index = index,
                        api_key.preview = %credentials.get(index).map(preview).unwrap_or_default(),
                        "Quota/Rate limit encountered with key index {}.",
                        index
                    );
                    if !self.rotate_from(index, credentials)? {
                        metrics::record_exhausted();
                        return Err(ClientError::Exhausted {
                            attempts,
                            source: err,
                        });
                    }
                }
            }
        }
    }

    /// Returns the active index and its transport, building the transport on first use.
    fn current_handle(
        &self,
        credentials: &CredentialSet,
    ) -> Result<(usize, Arc<dyn Transport>), ClientError> {
        let mut state = self.state.lock();
        let index = state.active_index;
        if let Some(handle) = &state.handle {
            return Ok((index, handle.clone()));
        }
        let handle = self.build_handle(credentials, index)?;
        state.handle = Some(handle.clone());
        Ok((index, handle))
    }

    /// Moves past the key at `observed`.
    ///
    /// Returns `Ok(true)` when a later key is now active, `Ok(false)` when
    /// `observed` was the last key. If a concurrent call already advanced past
    /// `observed`, the index is left alone and the caller retries on the
    /// current key.
    fn rotate_from(
        &self,
        observed: usize,
        credentials: &CredentialSet,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.lock();
        if state.active_index > observed {
            debug!(
                observed,
                active = state.active_index,
                "Key already rotated by a concurrent call"
            );
            return Ok(true);
        }
        let next = observed + 1;
        if next >= credentials.len() {
            error!("All API keys have been exhausted.");
            return Ok(false);
        }

        let handle = self.build_handle(credentials, next)?;
        state.active_index = next;
        state.handle = Some(handle);
        info!(
            key.index = next,
            api_key.preview = %credentials.get(next).map(preview).unwrap_or_default(),
            "Rotating to API key index {}",
            next
        );
        metrics::record_rotation(next);
        Ok(true)
    }

    fn build_handle(
        &self,
        credentials: &CredentialSet,
        index: usize,
    ) -> Result<Arc<dyn Transport>, ClientError> {
        let key = credentials.get(index).ok_or_else(|| {
            ClientError::Fatal(ProviderError::without_status(format!(
                "no API key at index {index}"
            )))
        })?;
        self.factory.build(key).map_err(ClientError::Fatal)
    }
}

impl std::fmt::Debug for RotatingCredentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RotatingCredentialClient")
            .field("credentials", &self.credentials.get())
            .field("active_index", &state.active_index)
            .field("handle_built", &state.handle.is_some())
            .finish()
    }
}
