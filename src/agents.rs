use crate::tree::FileRole;

/// The three fixed AI personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentType {
    /// Outlines, structure, pacing.
    Architect,
    /// Prose, dialogue, scene setting.
    Writer,
    /// Consistency and editing.
    Reviewer,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Architect => "architect",
            AgentType::Writer => "writer",
            AgentType::Reviewer => "reviewer",
        }
    }

    pub fn all() -> Vec<AgentType> {
        vec![AgentType::Architect, AgentType::Writer, AgentType::Reviewer]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentType::Architect => "细纲专家",
            AgentType::Writer => "正文作家",
            AgentType::Reviewer => "审阅顾问",
        }
    }

    pub fn default_instruction(&self) -> &'static str {
        match self {
            AgentType::Architect => {
                "你是一位网文细纲专家。你负责章节结构、剧情推演和节奏把控。\
                 输出细纲时使用编号列表，每条包含：场景、冲突、情绪变化（Beats）、伏笔。\
                 严格遵守参考上下文中的设定资料，不得与设定冲突。"
            }
            AgentType::Writer => {
                "你是一位小说正文作家。你根据细纲和设定资料撰写正文，\
                 注重画面感、对话自然度和场景氛围。保持人物口吻一致，\
                 不要输出细纲或解释，只输出正文。"
            }
            AgentType::Reviewer => {
                "你是一位审阅顾问。你检查正文与细纲、设定资料之间的一致性，\
                 指出逻辑漏洞、人物行为失当和文风不统一之处，并给出修改建议。\
                 以要点列表输出审阅意见。"
            }
        }
    }
}

/// Advisory workflow phase, derived from the selected file's role.
///
/// Nothing is enforced off this value; it only drives the status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Idle,
    Planning,
    Writing,
    Reviewing,
}

impl WorkflowStep {
    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowStep::Idle => "就绪",
            WorkflowStep::Planning => "构思中",
            WorkflowStep::Writing => "写作中",
            WorkflowStep::Reviewing => "审阅中",
        }
    }
}

/// Map a file role onto the implied agent and workflow phase.
pub fn workflow_for_role(role: FileRole) -> Option<(AgentType, WorkflowStep)> {
    match role {
        FileRole::Outline => Some((AgentType::Architect, WorkflowStep::Planning)),
        FileRole::Prose => Some((AgentType::Writer, WorkflowStep::Writing)),
        FileRole::Setting => None,
    }
}

/// Per-agent system instructions, editable for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SystemPrompts {
    architect: String,
    writer: String,
    reviewer: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            architect: AgentType::Architect.default_instruction().to_string(),
            writer: AgentType::Writer.default_instruction().to_string(),
            reviewer: AgentType::Reviewer.default_instruction().to_string(),
        }
    }
}

impl SystemPrompts {
    pub fn get(&self, agent: AgentType) -> &str {
        match agent {
            AgentType::Architect => &self.architect,
            AgentType::Writer => &self.writer,
            AgentType::Reviewer => &self.reviewer,
        }
    }

    pub fn set(&mut self, agent: AgentType, instruction: String) {
        match agent {
            AgentType::Architect => self.architect = instruction,
            AgentType::Writer => self.writer = instruction,
            AgentType::Reviewer => self.reviewer = instruction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_start_from_defaults_and_stay_editable() {
        let mut prompts = SystemPrompts::default();
        assert_eq!(
            prompts.get(AgentType::Writer),
            AgentType::Writer.default_instruction()
        );

        prompts.set(AgentType::Writer, "只写短句。".to_string());
        assert_eq!(prompts.get(AgentType::Writer), "只写短句。");
        // Other agents are untouched.
        assert_eq!(
            prompts.get(AgentType::Architect),
            AgentType::Architect.default_instruction()
        );
    }

    #[test]
    fn workflow_mapping_follows_file_role() {
        assert_eq!(
            workflow_for_role(FileRole::Outline),
            Some((AgentType::Architect, WorkflowStep::Planning))
        );
        assert_eq!(
            workflow_for_role(FileRole::Prose),
            Some((AgentType::Writer, WorkflowStep::Writing))
        );
        assert_eq!(workflow_for_role(FileRole::Setting), None);
    }
}
