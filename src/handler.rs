use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::agents::AgentType;
use crate::app::{App, ChatRole, FocusPane, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_generation().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Modal layers swallow everything else while visible.
    if app.notice.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.clear_notice();
        }
        return Ok(());
    }
    if app.pending_switch.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_switch(),
            KeyCode::Char('n') | KeyCode::Esc => app.cancel_switch(),
            _ => {}
        }
        return Ok(());
    }
    if app.show_prompt_editor {
        handle_prompt_editor(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Persona selection
        KeyCode::Char('1') => app.active_agent = AgentType::Architect,
        KeyCode::Char('2') => app.active_agent = AgentType::Writer,
        KeyCode::Char('3') => app.active_agent = AgentType::Reviewer,
        KeyCode::Char('p') => app.open_prompt_editor(),

        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => FocusPane::Editor,
                FocusPane::Editor => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Sidebar,
            };
        }

        _ => match app.focus {
            FocusPane::Sidebar => handle_sidebar_normal(app, key),
            FocusPane::Editor => handle_editor_normal(app, key),
            FocusPane::Chat => handle_chat_normal(app, key),
        },
    }
}

fn handle_sidebar_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_nav_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.sidebar_activate(),
        _ => {}
    }
}

fn handle_editor_normal(app: &mut App, key: KeyEvent) {
    let previewing = app.preview_for_active().is_some();
    match key.code {
        // Comparison mode: accept or discard the staged proposal.
        KeyCode::Char('a') if previewing => app.accept_preview(),
        KeyCode::Char('d') if previewing => app.reject_preview(),

        // Plain mode: edit, scroll, or trigger reverse synthesis.
        KeyCode::Char('i') | KeyCode::Enter if !previewing => {
            if app.active_file().map(|f| f.is_file()) == Some(true) {
                app.input_mode = InputMode::Editing;
            }
        }
        KeyCode::Char('g') if !previewing => {
            if let Some(job) = app.begin_reverse_synthesis() {
                app.dispatch_job(job);
            }
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.editor_scroll = app.editor_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.editor_scroll = app.editor_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }
        // Stage the most recent model reply against the active file.
        KeyCode::Char('s') => {
            let suggestion = app
                .messages
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::Model)
                .map(|m| m.text.clone());
            if let Some(text) = suggestion {
                app.apply_suggestion(&text);
            }
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.focus {
        FocusPane::Chat => handle_chat_editing(app, key),
        FocusPane::Editor => handle_editor_editing(app, key),
        FocusPane::Sidebar => app.input_mode = InputMode::Normal,
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if let Some(job) = app.begin_chat_send() {
                app.dispatch_job(job);
            }
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

fn handle_editor_editing(app: &mut App, key: KeyEvent) {
    // A staged proposal owns the pane; no edits underneath it.
    if app.preview_for_active().is_some() {
        app.input_mode = InputMode::Normal;
        return;
    }
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => editor_insert_newline(app),
        KeyCode::Backspace => editor_backspace(app),
        KeyCode::Left => editor_move_left(app),
        KeyCode::Right => editor_move_right(app),
        KeyCode::Up => editor_move_vertical(app, -1),
        KeyCode::Down => editor_move_vertical(app, 1),
        KeyCode::Home => {
            app.editor_cursor.1 = 0;
        }
        KeyCode::End => {
            let (row, _) = app.editor_cursor;
            let len = editor_lines(app).get(row).map(|l| l.chars().count()).unwrap_or(0);
            app.editor_cursor.1 = len;
        }
        KeyCode::Char(c) => editor_insert_char(app, c),
        _ => {}
    }
    keep_editor_cursor_visible(app);
}

fn editor_lines(app: &App) -> Vec<String> {
    app.active_content().split('\n').map(str::to_string).collect()
}

fn clamp_cursor(lines: &[String], cursor: (usize, usize)) -> (usize, usize) {
    let row = cursor.0.min(lines.len().saturating_sub(1));
    let col = cursor.1.min(lines.get(row).map(|l| l.chars().count()).unwrap_or(0));
    (row, col)
}

fn editor_insert_char(app: &mut App, c: char) {
    let mut lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    let byte_pos = char_to_byte_index(&lines[row], col);
    lines[row].insert(byte_pos, c);
    app.editor_cursor = (row, col + 1);
    app.set_active_content(&lines.join("\n"));
}

fn editor_insert_newline(app: &mut App) {
    let mut lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    let byte_pos = char_to_byte_index(&lines[row], col);
    let rest = lines[row].split_off(byte_pos);
    lines.insert(row + 1, rest);
    app.editor_cursor = (row + 1, 0);
    app.set_active_content(&lines.join("\n"));
}

fn editor_backspace(app: &mut App) {
    let mut lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    if col > 0 {
        let byte_pos = char_to_byte_index(&lines[row], col - 1);
        lines[row].remove(byte_pos);
        app.editor_cursor = (row, col - 1);
    } else if row > 0 {
        // Join with the previous line.
        let current = lines.remove(row);
        let prev_len = lines[row - 1].chars().count();
        lines[row - 1].push_str(&current);
        app.editor_cursor = (row - 1, prev_len);
    } else {
        return;
    }
    app.set_active_content(&lines.join("\n"));
}

fn editor_move_left(app: &mut App) {
    let lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    if col > 0 {
        app.editor_cursor = (row, col - 1);
    } else if row > 0 {
        let prev_len = lines[row - 1].chars().count();
        app.editor_cursor = (row - 1, prev_len);
    }
}

fn editor_move_right(app: &mut App) {
    let lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    let line_len = lines[row].chars().count();
    if col < line_len {
        app.editor_cursor = (row, col + 1);
    } else if row + 1 < lines.len() {
        app.editor_cursor = (row + 1, 0);
    }
}

fn editor_move_vertical(app: &mut App, delta: i32) {
    let lines = editor_lines(app);
    let (row, col) = clamp_cursor(&lines, app.editor_cursor);
    let new_row = if delta < 0 {
        row.saturating_sub(1)
    } else {
        (row + 1).min(lines.len().saturating_sub(1))
    };
    let new_col = col.min(lines[new_row].chars().count());
    app.editor_cursor = (new_row, new_col);
}

fn keep_editor_cursor_visible(app: &mut App) {
    let row = app.editor_cursor.0 as u16;
    if row < app.editor_scroll {
        app.editor_scroll = row;
    } else if app.editor_height > 0 && row >= app.editor_scroll + app.editor_height {
        app.editor_scroll = row - app.editor_height + 1;
    }
}

fn handle_prompt_editor(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_prompt_editor(),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.save_prompt_draft();
        }
        KeyCode::Enter => {
            let byte_pos = char_to_byte_index(&app.prompt_draft, app.prompt_cursor);
            app.prompt_draft.insert(byte_pos, '\n');
            app.prompt_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.prompt_cursor > 0 {
                app.prompt_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.prompt_draft, app.prompt_cursor);
                app.prompt_draft.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.prompt_cursor = app.prompt_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.prompt_draft.chars().count();
            app.prompt_cursor = (app.prompt_cursor + 1).min(char_count);
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.prompt_draft, app.prompt_cursor);
            app.prompt_draft.insert(byte_pos, c);
            app.prompt_cursor += 1;
        }
        _ => {}
    }
}
