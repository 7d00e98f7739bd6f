use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

/// Deterministic stand-in for the generation API.
///
/// Used by `--mock` runs (no API key required) and by the test suite. Scripted
/// responses are consumed in order; once the script is exhausted the backend
/// falls back to a fixed canned reply, so interactive mock sessions never run
/// dry.
#[derive(Clone, Default)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<Result<String, String>>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses to hand out, in order. `Err` entries simulate a failed
    /// generation call.
    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into_iter().collect())),
        }
    }

    pub async fn query(&self, _system_instruction: &str, _prompt: &str) -> Result<String> {
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!("{}", message)),
            None => Ok("（模拟输出）这是一段演示用的生成内容，用于在没有 API Key 时预览交互流程。".to_string()),
        }
    }
}
