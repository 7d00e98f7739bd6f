use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{workflow_for_role, AgentType, SystemPrompts, WorkflowStep};
use crate::context::{assemble, AssembledContext};
use crate::preview::PendingPreview;
use crate::provider::GenerateBackend;
use crate::tree::{
    find_file, find_parent_folder, toggle_folder, update_content, FileNode, FileRole,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Editor,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

/// One turn in the conversation. Append-only; never mutated or deleted.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub agent: Option<AgentType>,
}

impl ChatMessage {
    pub fn user(text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::User,
            text,
            timestamp: Utc::now(),
            agent: None,
        }
    }

    pub fn model(text: String, agent: AgentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::Model,
            text,
            timestamp: Utc::now(),
            agent: Some(agent),
        }
    }
}

/// How to route the result of the single in-flight generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingGeneration {
    Chat { agent: AgentType },
    ReverseSynthesis { outline_id: String },
}

/// Everything needed to dispatch one generation call, captured before the
/// await point so state transitions stay synchronous and testable.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub agent: AgentType,
    pub user_message: String,
    pub context: String,
    pub instruction: String,
    pub pending: PendingGeneration,
}

/// One visible row of the sidebar tree (closed folders hide their subtree).
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub id: String,
    pub name: String,
    pub depth: usize,
    pub is_folder: bool,
    pub is_open: bool,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Project tree
    pub files: Vec<FileNode>,
    pub active_file_id: Option<String>,
    pub sidebar_state: ListState,

    // Conversation
    pub messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Personas
    pub active_agent: AgentType,
    pub workflow_step: WorkflowStep,
    pub system_prompts: SystemPrompts,

    // Prompt editor overlay
    pub show_prompt_editor: bool,
    pub prompt_draft: String,
    pub prompt_cursor: usize,

    // Preview / comparison state
    pub preview: Option<PendingPreview>,

    // Context references (for display)
    pub references: Vec<String>,

    // Generation state
    pub is_loading: bool,
    pub generation_task: Option<(PendingGeneration, JoinHandle<Result<String>>)>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Guards and notices
    pub notice: Option<String>,
    pub pending_switch: Option<String>,

    // Editor state
    pub editor_cursor: (usize, usize), // (line, char column)
    pub editor_scroll: u16,
    pub editor_height: u16,

    // Backend
    pub backend: GenerateBackend,
}

impl App {
    pub fn new(backend: GenerateBackend, files: Vec<FileNode>) -> Self {
        let mut sidebar_state = ListState::default();
        sidebar_state.select(Some(0));

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Sidebar,

            files,
            active_file_id: None,
            sidebar_state,

            messages: Vec::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            active_agent: AgentType::Architect,
            workflow_step: WorkflowStep::Idle,
            system_prompts: SystemPrompts::default(),

            show_prompt_editor: false,
            prompt_draft: String::new(),
            prompt_cursor: 0,

            preview: None,

            references: Vec::new(),

            is_loading: false,
            generation_task: None,
            animation_frame: 0,

            notice: None,
            pending_switch: None,

            editor_cursor: (0, 0),
            editor_scroll: 0,
            editor_height: 0,

            backend,
        };

        if find_file(&app.files, "macro_outline").is_some() {
            app.perform_select("macro_outline");
        }
        app
    }

    // --- Tree / selection ---

    pub fn active_file(&self) -> Option<&FileNode> {
        self.active_file_id
            .as_deref()
            .and_then(|id| find_file(&self.files, id))
    }

    pub fn active_content(&self) -> &str {
        self.active_file().and_then(|f| f.content()).unwrap_or("")
    }

    /// Flatten the forest into the rows the sidebar actually shows; children
    /// of closed folders are skipped.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        fn walk(nodes: &[FileNode], depth: usize, rows: &mut Vec<TreeRow>) {
            for node in nodes {
                rows.push(TreeRow {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    depth,
                    is_folder: node.is_folder(),
                    is_open: node.is_open(),
                });
                if node.is_open() {
                    if let Some(children) = node.children() {
                        walk(children, depth + 1, rows);
                    }
                }
            }
        }
        let mut rows = Vec::new();
        walk(&self.files, 0, &mut rows);
        rows
    }

    pub fn sidebar_nav_down(&mut self) {
        let len = self.visible_rows().len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_nav_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    /// Enter on a sidebar row: folders toggle, files become the selection.
    pub fn sidebar_activate(&mut self) {
        let row = self
            .sidebar_state
            .selected()
            .and_then(|i| self.visible_rows().into_iter().nth(i));
        if let Some(row) = row {
            if row.is_folder {
                self.toggle_folder_node(&row.id);
            } else {
                self.select_file(&row.id);
            }
        }
    }

    /// Select a file, honoring the destructive-switch guard: while a proposal
    /// is pending, switching away needs explicit confirmation.
    pub fn select_file(&mut self, id: &str) {
        if self.preview.is_some() && self.active_file_id.as_deref() != Some(id) {
            self.pending_switch = Some(id.to_string());
            return;
        }
        self.perform_select(id);
    }

    /// Confirm a guarded switch: the pending proposal is discarded.
    pub fn confirm_switch(&mut self) {
        if let Some(id) = self.pending_switch.take() {
            self.preview = None;
            self.perform_select(&id);
        }
    }

    /// Decline a guarded switch: current file and proposal stay untouched.
    pub fn cancel_switch(&mut self) {
        self.pending_switch = None;
    }

    fn perform_select(&mut self, id: &str) {
        if find_file(&self.files, id).is_none() {
            return;
        }
        self.active_file_id = Some(id.to_string());
        self.editor_cursor = (0, 0);
        self.editor_scroll = 0;
        self.refresh_references();

        // Advisory: derive persona and phase from the file's role.
        if let Some(role) = find_file(&self.files, id).and_then(|f| f.effective_role()) {
            if let Some((agent, step)) = workflow_for_role(role) {
                self.active_agent = agent;
                self.workflow_step = step;
            }
        }
    }

    pub fn toggle_folder_node(&mut self, id: &str) {
        let files = std::mem::take(&mut self.files);
        self.files = toggle_folder(files, id);
        // The visible row set may have shrunk; keep the selection in range.
        let len = self.visible_rows().len();
        if let Some(i) = self.sidebar_state.selected() {
            if len > 0 && i >= len {
                self.sidebar_state.select(Some(len - 1));
            }
        }
    }

    pub fn set_active_content(&mut self, new_content: &str) {
        if let Some(id) = self.active_file_id.clone() {
            let files = std::mem::take(&mut self.files);
            self.files = update_content(files, &id, new_content);
            self.refresh_references();
        }
    }

    pub fn refresh_references(&mut self) {
        self.references = assemble(&self.files, self.active_file_id.as_deref()).references;
    }

    pub fn assemble_context(&self) -> AssembledContext {
        assemble(&self.files, self.active_file_id.as_deref())
    }

    // --- Preview / comparison ---

    /// Stage an agent suggestion against the active file: the proposal is the
    /// existing content with the suggestion appended.
    pub fn apply_suggestion(&mut self, text: &str) {
        let Some(id) = self.active_file_id.clone() else {
            return;
        };
        if self.active_file().map(|f| f.is_file()) != Some(true) {
            return;
        }
        let current = self.active_content();
        let proposed = if current.is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n{}", current, text)
        };
        self.preview = Some(PendingPreview::new(&id, proposed));
    }

    /// Commit the pending proposal into the file it was staged against.
    pub fn accept_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            let files = std::mem::take(&mut self.files);
            self.files = update_content(files, &preview.file_id, &preview.proposed);
            self.editor_cursor = (0, 0);
            self.refresh_references();
        }
    }

    /// Discard the pending proposal; file content is unchanged.
    pub fn reject_preview(&mut self) {
        self.preview = None;
    }

    /// The proposal shown in the editor pane, if it targets the active file.
    pub fn preview_for_active(&self) -> Option<&PendingPreview> {
        self.preview
            .as_ref()
            .filter(|p| self.active_file_id.as_deref() == Some(p.file_id.as_str()))
    }

    // --- Conversation ---

    /// Start a chat round: records the user turn and captures the dispatch
    /// inputs. Returns None (and mutates nothing beyond the attempt) when
    /// busy or when the input is blank.
    pub fn begin_chat_send(&mut self) -> Option<GenerationJob> {
        if self.is_loading {
            return None;
        }
        let text = self.chat_input.trim().to_string();
        if text.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::user(text.clone()));
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.is_loading = true;
        self.scroll_chat_to_bottom();

        let agent = self.active_agent;
        let context = self.assemble_context();
        self.references = context.references;
        Some(GenerationJob {
            agent,
            user_message: text,
            context: context.blob,
            instruction: self.system_prompts.get(agent).to_string(),
            pending: PendingGeneration::Chat { agent },
        })
    }

    /// Land the result of a chat round. Failures stay visible: an
    /// error-bearing model turn is appended and the failure is logged.
    pub fn finish_chat_send(&mut self, agent: AgentType, result: Result<String>) {
        self.is_loading = false;
        match result {
            Ok(text) => {
                self.messages.push(ChatMessage::model(text, agent));
            }
            Err(err) => {
                warn!(agent = agent.as_str(), error = %err, "chat generation failed");
                self.messages
                    .push(ChatMessage::model(format!("错误：{}", err), agent));
            }
        }
        self.scroll_chat_to_bottom();
    }

    // --- Reverse synthesis ---

    /// Derive an outline from the active prose file. Locates the outline
    /// sibling and captures the dispatch inputs; fails visibly (notice, no
    /// state change) when no outline sibling exists.
    pub fn begin_reverse_synthesis(&mut self) -> Option<GenerationJob> {
        if self.is_loading {
            return None;
        }
        let Some(active) = self.active_file() else {
            return None;
        };
        if !active.is_file() {
            return None;
        }
        let active_id = active.id.clone();
        let prose = active.content().unwrap_or("").to_string();

        let outline_id = find_parent_folder(&self.files, &active_id)
            .and_then(|parent| {
                parent.children().unwrap_or_default().iter().find(|c| {
                    c.id != active_id
                        && c.is_file()
                        && c.effective_role() == Some(FileRole::Outline)
                })
            })
            .map(|outline| outline.id.clone());

        let Some(outline_id) = outline_id else {
            self.notice = Some(
                "未在当前目录下找到“细纲”或“大纲”文件，无法进行反向同步。\
                 请确保目录结构包含对应的细纲文件。"
                    .to_string(),
            );
            return None;
        };

        let user_message = format!(
            "请阅读以下小说正文，反向归纳出详细的章节细纲。\n\
             要求：\n\
             1. 提取核心冲突、关键剧情点。\n\
             2. 标注出场景变化和情绪起伏（Beats）。\n\
             3. 记录文中埋下的伏笔。\n\
             4. 输出格式必须符合【细纲专家】的标准格式。\n\n\
             【小说正文】：\n{}",
            prose
        );

        self.is_loading = true;
        // Context still rides along for character-name accuracy.
        let context = self.assemble_context();
        self.references = context.references;
        Some(GenerationJob {
            agent: AgentType::Architect,
            user_message,
            context: context.blob,
            instruction: self.system_prompts.get(AgentType::Architect).to_string(),
            pending: PendingGeneration::ReverseSynthesis { outline_id },
        })
    }

    /// Land a reverse-synthesis result: move the selection onto the outline
    /// file and stage the generated text as its pending proposal.
    pub fn finish_reverse_synthesis(&mut self, outline_id: &str, result: Result<String>) {
        self.is_loading = false;
        match result {
            Ok(text) => {
                // The workflow owns the switch; the guard applies only to
                // user-initiated selection.
                self.perform_select(outline_id);
                self.active_agent = AgentType::Architect;
                self.preview = Some(PendingPreview::new(outline_id, text));
                self.messages.push(ChatMessage::model(
                    "已根据正文内容反向生成了细纲。请在编辑区审阅差异，确认后采纳变更。"
                        .to_string(),
                    AgentType::Architect,
                ));
                self.scroll_chat_to_bottom();
                info!(outline_id, "reverse synthesis staged");
            }
            Err(err) => {
                warn!(error = %err, "reverse synthesis failed");
                self.notice = Some(format!("生成细纲失败：{}", err));
            }
        }
    }

    // --- Generation dispatch ---

    /// Spawn the backend call for a captured job. At most one task is in
    /// flight; `begin_*` already refused while loading.
    pub fn dispatch_job(&mut self, job: GenerationJob) {
        let backend = self.backend.clone();
        let GenerationJob {
            agent,
            user_message,
            context,
            instruction,
            pending,
        } = job;
        let handle = tokio::spawn(async move {
            backend
                .generate(agent, &user_message, &context, &instruction)
                .await
        });
        self.generation_task = Some((pending, handle));
    }

    /// Poll the in-flight task (called on every tick) and route a finished
    /// result to the matching `finish_*` transition.
    pub async fn poll_generation(&mut self) {
        let finished = self
            .generation_task
            .as_ref()
            .map(|(_, handle)| handle.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        let (pending, handle) = self.generation_task.take().unwrap();
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow!("generation task aborted: {}", join_err)),
        };
        match pending {
            PendingGeneration::Chat { agent } => self.finish_chat_send(agent, result),
            PendingGeneration::ReverseSynthesis { outline_id } => {
                self.finish_reverse_synthesis(&outline_id, result)
            }
        }
    }

    // --- Prompt editor ---

    pub fn open_prompt_editor(&mut self) {
        self.prompt_draft = self.system_prompts.get(self.active_agent).to_string();
        self.prompt_cursor = self.prompt_draft.chars().count();
        self.show_prompt_editor = true;
    }

    pub fn save_prompt_draft(&mut self) {
        self.system_prompts
            .set(self.active_agent, self.prompt_draft.clone());
        self.show_prompt_editor = false;
    }

    pub fn close_prompt_editor(&mut self) {
        self.show_prompt_editor = false;
    }

    // --- Misc UI state ---

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat so the newest turn (or the thinking indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in &self.messages {
            total_lines += 1; // speaker line
            for line in msg.text.lines() {
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // blank line after message
        }
        if self.is_loading {
            total_lines += 2;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::tree::starter_project;

    fn test_app() -> App {
        App::new(
            GenerateBackend::Mock(MockBackend::new()),
            starter_project(),
        )
    }

    #[test]
    fn new_app_selects_the_macro_outline() {
        let app = test_app();
        assert_eq!(app.active_file_id.as_deref(), Some("macro_outline"));
        assert_eq!(app.active_agent, AgentType::Architect);
        assert_eq!(app.workflow_step, WorkflowStep::Planning);
    }

    #[test]
    fn selecting_a_prose_file_derives_the_writer_persona() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        assert_eq!(app.active_file_id.as_deref(), Some("chapter_1_prose"));
        assert_eq!(app.active_agent, AgentType::Writer);
        assert_eq!(app.workflow_step, WorkflowStep::Writing);
    }

    #[test]
    fn apply_suggestion_appends_after_a_blank_line() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.set_active_content("已有正文。");
        app.apply_suggestion("新段落。");
        let preview = app.preview.as_ref().unwrap();
        assert_eq!(preview.file_id, "chapter_1_prose");
        assert_eq!(preview.proposed, "已有正文。\n\n新段落。");
        // Nothing committed yet.
        assert_eq!(app.active_content(), "已有正文。");
    }

    #[test]
    fn apply_suggestion_on_empty_file_is_pure_addition() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.apply_suggestion("新段落。");
        assert_eq!(app.preview.as_ref().unwrap().proposed, "新段落。");
    }

    #[test]
    fn accept_commits_exactly_the_staged_value_despite_unrelated_edits() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.apply_suggestion("新段落。");

        // Unrelated edit elsewhere in the tree between staging and accept.
        let files = std::mem::take(&mut app.files);
        app.files = update_content(files, "setting_world", "改动后的世界观。");

        app.accept_preview();
        assert!(app.preview.is_none());
        assert_eq!(app.active_content(), "新段落。");
        assert_eq!(
            find_file(&app.files, "setting_world").unwrap().content(),
            Some("改动后的世界观。")
        );
    }

    #[test]
    fn reject_leaves_content_exactly_as_before_staging() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.set_active_content("原文。");
        app.apply_suggestion("建议。");
        app.reject_preview();
        assert!(app.preview.is_none());
        assert_eq!(app.active_content(), "原文。");
    }

    #[test]
    fn switching_files_with_pending_preview_requires_confirmation() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.apply_suggestion("建议。");

        app.select_file("chapter_1_outline");
        // Switch is parked, not performed.
        assert_eq!(app.active_file_id.as_deref(), Some("chapter_1_prose"));
        assert_eq!(app.pending_switch.as_deref(), Some("chapter_1_outline"));
        assert!(app.preview.is_some());

        // Declining keeps file and proposal.
        app.cancel_switch();
        assert_eq!(app.active_file_id.as_deref(), Some("chapter_1_prose"));
        assert!(app.preview.is_some());

        // Confirming discards the proposal and moves on.
        app.select_file("chapter_1_outline");
        app.confirm_switch();
        assert_eq!(app.active_file_id.as_deref(), Some("chapter_1_outline"));
        assert!(app.preview.is_none());
    }

    #[test]
    fn begin_chat_send_refuses_while_busy() {
        let mut app = test_app();
        app.chat_input = "第一条".to_string();
        let job = app.begin_chat_send();
        assert!(job.is_some());
        assert!(app.is_loading);
        assert_eq!(app.messages.len(), 1);

        // A second request while busy mutates nothing.
        app.chat_input = "第二条".to_string();
        assert!(app.begin_chat_send().is_none());
        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.chat_input, "第二条");
    }

    #[test]
    fn begin_chat_send_refuses_blank_input() {
        let mut app = test_app();
        app.chat_input = "   ".to_string();
        assert!(app.begin_chat_send().is_none());
        assert!(!app.is_loading);
        assert!(app.messages.is_empty());
    }

    #[test]
    fn chat_failure_is_visible_in_the_log_and_clears_loading() {
        let mut app = test_app();
        app.chat_input = "写一段".to_string();
        let job = app.begin_chat_send().unwrap();
        app.finish_chat_send(job.agent, Err(anyhow!("网络超时")));

        assert!(!app.is_loading);
        let last = app.messages.last().unwrap();
        assert_eq!(last.role, ChatRole::Model);
        assert!(last.text.contains("网络超时"));
    }

    #[test]
    fn reverse_synthesis_without_outline_sibling_sets_notice_only() {
        let mut app = App::new(
            GenerateBackend::Mock(MockBackend::new()),
            vec![FileNode::folder(
                "chapter_1",
                "第一章",
                vec![FileNode::file("prose", "正文.txt", "他走进了房间。")],
            )],
        );
        app.select_file("prose");
        assert!(app.begin_reverse_synthesis().is_none());
        assert!(app.notice.is_some());
        assert!(!app.is_loading);
        assert!(app.preview.is_none());
        assert_eq!(app.active_file_id.as_deref(), Some("prose"));
    }

    #[test]
    fn reverse_synthesis_failure_surfaces_a_notice() {
        let mut app = test_app();
        app.select_file("chapter_1_prose");
        app.set_active_content("他走进了房间。");
        let job = app.begin_reverse_synthesis().unwrap();
        let PendingGeneration::ReverseSynthesis { outline_id } = job.pending else {
            panic!("expected reverse-synthesis job");
        };

        app.finish_reverse_synthesis(&outline_id, Err(anyhow!("配额用尽")));
        assert!(!app.is_loading);
        assert!(app.notice.as_ref().unwrap().contains("配额用尽"));
        // No switch, no staged preview.
        assert_eq!(app.active_file_id.as_deref(), Some("chapter_1_prose"));
        assert!(app.preview.is_none());
    }

    #[test]
    fn visible_rows_hide_children_of_closed_folders() {
        let mut app = test_app();
        let before = app.visible_rows().len();
        app.toggle_folder_node("settings_folder");
        let after = app.visible_rows().len();
        assert_eq!(before - after, 2); // two setting files hidden
    }
}
