use anyhow::Result;
use tracing::debug;

use crate::agents::AgentType;
use crate::gemini::GeminiClient;
use crate::mock::MockBackend;

/// Boundary to the external generation collaborator.
///
/// The core's contract with it is deliberately thin: the call may suspend,
/// and it returns text or an error. Everything else (model choice, transport,
/// auth) lives behind this enum.
#[derive(Clone)]
pub enum GenerateBackend {
    Gemini(GeminiClient),
    Mock(MockBackend),
}

impl GenerateBackend {
    pub fn label(&self) -> &'static str {
        match self {
            GenerateBackend::Gemini(_) => "gemini",
            GenerateBackend::Mock(_) => "mock",
        }
    }

    /// One generation round: persona + user instruction + assembled context +
    /// the persona's current system instruction.
    pub async fn generate(
        &self,
        agent: AgentType,
        user_message: &str,
        context_blob: &str,
        system_instruction: &str,
    ) -> Result<String> {
        let prompt = frame_prompt(user_message, context_blob);
        debug!(
            backend = self.label(),
            agent = agent.as_str(),
            prompt_chars = prompt.chars().count(),
            "dispatching generation request"
        );

        match self {
            GenerateBackend::Gemini(client) => client.query(system_instruction, &prompt).await,
            GenerateBackend::Mock(mock) => mock.query(system_instruction, &prompt).await,
        }
    }
}

/// Wrap the user instruction with the reference-context frame the agents are
/// prompted to respect.
fn frame_prompt(user_message: &str, context_blob: &str) -> String {
    format!(
        "[参考文件上下文]\n{}\n[结束参考]\n\n[用户指令]\n{}",
        context_blob, user_message
    )
}
