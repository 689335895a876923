//! In-process fake integrations and completion providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use concierge::ai::{AiAdapter, AiRequest, CompletionProvider};
use concierge::cache::FetchCache;
use concierge::config::{AiProviderKind, CacheConfig};
use concierge::error::{AiError, Result};
use concierge::integrations::{
    EmailMessage, FetchResult, FileDescriptor, Integration, IntegrationId, IntegrationRegistry,
    IntegrationSettings, MimeClass, Operation,
};
use concierge::query::{Dispatcher, DispatcherSettings};

type Handler = Box<dyn Fn(&Operation) -> FetchResult<Value> + Send + Sync>;

/// Integration answering every operation through a closure.
pub struct FakeIntegration {
    id: IntegrationId,
    handler: Handler,
    delay: Option<Duration>,
    calls: AtomicUsize,
    operations: Mutex<Vec<Operation>>,
}

impl FakeIntegration {
    pub fn new(
        id: IntegrationId,
        handler: impl Fn(&Operation) -> FetchResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            handler: Box::new(handler),
            delay: None,
            calls: AtomicUsize::new(0),
            operations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().clone()
    }
}

#[async_trait]
impl Integration for FakeIntegration {
    fn id(&self) -> IntegrationId {
        self.id
    }

    async fn authenticate(&self) -> FetchResult<bool> {
        Ok(true)
    }

    async fn test_connection(&self) -> FetchResult<bool> {
        Ok(true)
    }

    async fn execute(&self, op: &Operation) -> FetchResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().push(op.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(op)
    }
}

/// Completion provider with a canned reply; `None` means unreachable.
pub struct FakeProvider {
    kind: AiProviderKind,
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(kind: AiProviderKind, reply: &str) -> Self {
        Self {
            kind,
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn down(kind: AiProviderKind) -> Self {
        Self {
            kind,
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn kind(&self) -> AiProviderKind {
        self.kind
    }

    fn name(&self) -> String {
        format!("fake-{}", self.kind.as_str())
    }

    async fn probe(&self) -> Result<()> {
        match self.reply {
            Some(_) => Ok(()),
            None => Err(AiError::Unavailable("connection refused".to_string()).into()),
        }
    }

    async fn complete(&self, request: &AiRequest) -> Result<String> {
        self.prompts.lock().push(request.prompt.clone());
        self.reply
            .clone()
            .ok_or_else(|| AiError::Unavailable("connection refused".to_string()).into())
    }
}

pub fn dispatcher(integrations: Vec<Arc<dyn Integration>>, ai: AiAdapter) -> Dispatcher {
    dispatcher_with_settings(integrations, ai, DispatcherSettings::default())
}

pub fn dispatcher_with_settings(
    integrations: Vec<Arc<dyn Integration>>,
    ai: AiAdapter,
    settings: DispatcherSettings,
) -> Dispatcher {
    let mut registry = IntegrationRegistry::new();
    for integration in integrations {
        registry.register(integration, IntegrationSettings::default());
    }
    Dispatcher::new(
        Arc::new(registry),
        FetchCache::new(&CacheConfig::default()),
        Arc::new(ai),
        settings,
    )
}

pub fn email(i: usize, sender: &str) -> EmailMessage {
    EmailMessage {
        id: format!("msg-{}", i),
        subject: format!("Workflow update {}", i),
        sender: sender.to_string(),
        date: "Mon, 1 Sep 2025 09:00:00 +0000".to_string(),
        snippet: format!("Snippet for message {}", i),
        body: format!("Body of message {}", i),
        is_unread: true,
    }
}

pub fn file(id: &str, name: &str, mime_type: &str, size_bytes: u64) -> FileDescriptor {
    FileDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        mime_class: MimeClass::from_mime_type(mime_type),
        size_bytes,
        modified_time: None,
        web_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
    }
}
