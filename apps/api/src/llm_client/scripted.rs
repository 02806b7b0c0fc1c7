//! In-memory `CompletionGateway` that replays scripted streams. Test-only.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use super::{ChatRequest, CompletionGateway, FragmentStream, TextFragment, TransportError};

/// One item the scripted stream will yield.
#[derive(Debug, Clone)]
pub enum Step {
    Fragment(String),
    Interrupt(String),
    /// The stream stays open and yields nothing more.
    Stall,
}

/// What the gateway does for one call.
#[derive(Debug, Clone)]
pub enum Script {
    Stream(Vec<Step>),
    FailToStart { status: u16, message: String },
}

impl Script {
    pub fn fragments(deltas: &[&str]) -> Self {
        Script::Stream(deltas.iter().map(|d| Step::Fragment(d.to_string())).collect())
    }
}

/// A request the gateway received, kept for assertions.
#[derive(Debug, Clone)]
pub enum Recorded {
    Chat(ChatRequest),
    Generate { model: String, prompt: String },
}

/// Pops one `Script` per call, in order. Calls beyond the script fail to start.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedGateway {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn next_stream(&self) -> Result<FragmentStream, TransportError> {
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Stream(steps)) => {
                let stalls = steps.iter().any(|step| matches!(step, Step::Stall));
                let items = steps
                    .into_iter()
                    .take_while(|step| !matches!(step, Step::Stall))
                    .map(|step| match step {
                        Step::Fragment(delta) => Ok(TextFragment { delta }),
                        Step::Interrupt(reason) => Err(TransportError::Interrupted(reason)),
                        Step::Stall => unreachable!("stall steps are cut above"),
                    });
                let mut failed = false;
                let fused = stream::iter(items).take_while(move |item| {
                    let keep = !failed;
                    failed |= item.is_err();
                    futures::future::ready(keep)
                });
                if stalls {
                    Ok(Box::pin(fused.chain(stream::pending())))
                } else {
                    Ok(Box::pin(fused.fuse()))
                }
            }
            Some(Script::FailToStart { status, message }) => {
                Err(TransportError::Api { status, message })
            }
            None => Err(TransportError::Api {
                status: 500,
                message: "no scripted response left".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, TransportError> {
        self.requests.lock().unwrap().push(Recorded::Chat(request));
        self.next_stream()
    }

    async fn stream_generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<FragmentStream, TransportError> {
        self.requests.lock().unwrap().push(Recorded::Generate {
            model: model.to_string(),
            prompt: prompt.to_string(),
        });
        self.next_stream()
    }
}
