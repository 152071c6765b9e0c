//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gemini_key_rotator::{
    transport::{CallConfig, Conversation, Transport, TransportFactory},
    AppConfig, AppState, CredentialSet, ProviderError, RotatingCredentialClient,
};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// What a key answers with on every attempt.
#[derive(Clone, Debug)]
pub enum Script {
    Reply(String),
    Fail(ProviderError),
}

impl Script {
    pub fn ok(text: &str) -> Self {
        Self::Reply(text.to_string())
    }

    pub fn quota() -> Self {
        Self::Fail(ProviderError::with_status(429, "Resource has been exhausted"))
    }

    pub fn fail(status: Option<u16>, message: &str) -> Self {
        Self::Fail(ProviderError::new(status, message))
    }

    fn outcome(&self) -> Result<String, ProviderError> {
        match self {
            Self::Reply(text) => Ok(text.clone()),
            Self::Fail(err) => Err(err.clone()),
        }
    }
}

/// One recorded transport call.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempt {
    pub key: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub input: String,
}

/// Fake transport factory: scripted outcomes per key, every attempt recorded.
#[derive(Default)]
pub struct FakeFactory {
    scripts: HashMap<String, Script>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
    builds: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(k, s)| (k.to_string(), s.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Every attempt sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn keys_tried(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|a| a.key.clone()).collect()
    }

    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().clone()
    }
}

impl TransportFactory for FakeFactory {
    fn build(&self, credential: &SecretString) -> Result<Arc<dyn Transport>, ProviderError> {
        let key = credential.expose_secret().clone();
        self.builds.lock().push(key.clone());
        let script = self
            .scripts
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Script::fail(Some(401), "API key not valid"));
        Ok(Arc::new(FakeTransport {
            key,
            script,
            delay: self.delay,
            attempts: self.attempts.clone(),
        }))
    }
}

struct FakeTransport {
    key: String,
    script: Script,
    delay: Option<Duration>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl FakeTransport {
    async fn answer(&self, attempt: Attempt) -> Result<String, ProviderError> {
        self.attempts.lock().push(attempt);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.outcome()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn generate(
        &self,
        model: &str,
        contents: &Value,
        config: Option<&CallConfig>,
    ) -> Result<String, ProviderError> {
        self.answer(Attempt {
            key: self.key.clone(),
            model: model.to_string(),
            system_instruction: config.and_then(|c| c.system_instruction.clone()),
            input: contents.as_str().map_or_else(|| contents.to_string(), str::to_string),
        })
        .await
    }

    fn start_conversation(
        &self,
        model: &str,
        config: Option<&CallConfig>,
    ) -> Box<dyn Conversation> {
        Box::new(FakeConversation {
            transport: FakeTransport {
                key: self.key.clone(),
                script: self.script.clone(),
                delay: self.delay,
                attempts: self.attempts.clone(),
            },
            model: model.to_string(),
            system_instruction: config.and_then(|c| c.system_instruction.clone()),
        })
    }
}

struct FakeConversation {
    transport: FakeTransport,
    model: String,
    system_instruction: Option<String>,
}

#[async_trait]
impl Conversation for FakeConversation {
    async fn send(&mut self, message: &str) -> Result<String, ProviderError> {
        self.transport
            .answer(Attempt {
                key: self.transport.key.clone(),
                model: self.model.clone(),
                system_instruction: self.system_instruction.clone(),
                input: message.to_string(),
            })
            .await
    }
}

/// Builds a client over `keys` backed by `factory`.
pub fn client_with(keys: &[&str], factory: Arc<FakeFactory>) -> RotatingCredentialClient {
    RotatingCredentialClient::new(CredentialSet::new(keys.iter().copied()), factory)
}

/// Names `k0..k{n-1}`.
pub fn key_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("k{i}")).collect()
}

/// Application state over a fake factory, for router tests.
pub fn app_state_with(keys: &[&str], factory: Arc<FakeFactory>) -> Arc<AppState> {
    Arc::new(AppState::with_client(
        AppConfig::default(),
        Arc::new(client_with(keys, factory)),
    ))
}
