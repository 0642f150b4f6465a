//! Scripted model client shared by the pipeline unit tests.

use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LlmClient};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every request.
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a transport failure after the scripted responses so far.
    pub(crate) fn then_fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn then_respond(self, response: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    pub(crate) fn prompt(&self, index: usize) -> String {
        self.request(index).prompt
    }
}

impl LlmClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(Error::Llm(message)),
            None => Err(Error::Llm("script exhausted".to_string())),
        }
    }
}
