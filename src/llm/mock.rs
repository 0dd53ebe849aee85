//! Scripted [`LlmStream`] used by chat service and route tests.

use std::sync::Mutex;

use futures::StreamExt;

use super::types::{FragmentStream, GenerateRequest, LlmError, LlmStream};

#[derive(Debug, Clone)]
enum Script {
    Fragments(Vec<Result<String, String>>),
    Reject { status: u16, body: String },
}

pub(crate) struct MockLlm {
    configured: bool,
    script: Script,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlm {
    /// Streams `fragments` in order.
    pub fn replying(fragments: &[&str]) -> Self {
        Self::scripted(fragments.iter().map(|f| Ok((*f).to_string())).collect())
    }

    /// `Err` entries become [`LlmError::Stream`] items.
    pub fn scripted(items: Vec<Result<String, String>>) -> Self {
        Self { configured: true, script: Script::Fragments(items), requests: Mutex::new(Vec::new()) }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            configured: true,
            script: Script::Reject { status, body: body.to_string() },
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::replying(&[]) }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmStream for MockLlm {
    fn check_configured(&self) -> Result<(), LlmError> {
        if self.configured { Ok(()) } else { Err(LlmError::MissingApiKey) }
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<FragmentStream, LlmError> {
        self.check_configured()?;
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::Reject { status, body } => Err(LlmError::ApiResponse { status: *status, body: body.clone() }),
            Script::Fragments(items) => {
                let items: Vec<Result<String, LlmError>> =
                    items.iter().cloned().map(|item| item.map_err(LlmError::Stream)).collect();
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }
}
