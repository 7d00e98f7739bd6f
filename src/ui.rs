use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, ChatRole, FocusPane, InputMode};
use crate::preview::{diff_rows, DiffKind};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [sidebar_area, editor_area, chat_area] = Layout::horizontal([
        Constraint::Percentage(22),
        Constraint::Percentage(44),
        Constraint::Percentage(34),
    ])
    .areas(body_area);

    render_sidebar(app, frame, sidebar_area);
    render_editor(app, frame, editor_area);
    render_chat(app, frame, chat_area);

    render_footer(app, frame, footer_area);

    // Popups (in order of priority)
    if app.notice.is_some() {
        render_notice(app, frame, area);
    } else if app.pending_switch.is_some() {
        render_switch_confirm(frame, area);
    } else if app.show_prompt_editor {
        render_prompt_editor(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let loading = if app.is_loading {
        let dots = ".".repeat((app.animation_frame + 1) as usize);
        format!(" 生成中{:<3}", dots)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(" NovelCraft ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.active_agent.display_name()),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(
            format!(" {} ", app.workflow_step.display_name()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(loading, Style::default().fg(Color::Yellow)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" 项目 ");

    let active_id = app.active_file_id.clone();
    let items: Vec<ListItem> = app
        .visible_rows()
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let marker = if row.is_folder {
                if row.is_open { "▾ " } else { "▸ " }
            } else {
                "  "
            };
            let label = format!("{}{}{}", indent, marker, row.name);
            let style = if !row.is_folder && active_id.as_deref() == Some(row.id.as_str()) {
                Style::default().fg(Color::Yellow).bold()
            } else if row.is_folder {
                Style::default().fg(Color::Blue)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(label, style))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_editor(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Editor;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let previewing = app.preview_for_active().is_some();

    let title = match app.active_file() {
        Some(file) => {
            let chars = file.content().map(|c| c.chars().count()).unwrap_or(0);
            if previewing {
                format!(" {} · AI 建议比对中 ", file.name)
            } else {
                format!(" {} · {} 字 ", file.name, chars)
            }
        }
        None => " 编辑区 ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if previewing {
            Color::Magenta
        } else {
            border_color
        }))
        .title(title);

    let inner = block.inner(area);
    app.editor_height = inner.height;

    if let Some(preview) = app.preview_for_active() {
        // Comparison view: line diff of proposal against current content.
        let rows = diff_rows(app.active_content(), &preview.proposed);
        let lines: Vec<Line> = rows
            .iter()
            .map(|row| match row.kind {
                DiffKind::Added => Line::from(Span::styled(
                    format!("+ {}", row.text),
                    Style::default().fg(Color::Green),
                )),
                DiffKind::Removed => Line::from(Span::styled(
                    format!("- {}", row.text),
                    Style::default().fg(Color::Red).crossed_out(),
                )),
                DiffKind::Unchanged => Line::from(Span::styled(
                    format!("  {}", row.text),
                    Style::default().fg(Color::DarkGray),
                )),
            })
            .collect();

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .scroll((app.editor_scroll, 0));
        frame.render_widget(paragraph, area);
        return;
    }

    let content = app.active_content().to_string();
    let text = if content.is_empty() && app.active_file().is_none() {
        Text::from("请在左侧选择章节或设定开始创作")
    } else {
        Text::from(content)
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .scroll((app.editor_scroll, 0));
    frame.render_widget(paragraph, area);

    // Show cursor when editing the file.
    if focused && app.input_mode == InputMode::Editing {
        let (row, col) = app.editor_cursor;
        let y = (row as u16).saturating_sub(app.editor_scroll);
        if y < inner.height {
            frame.set_cursor_position((inner.x + col as u16, inner.y + y));
        }
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let refs_height = if app.references.is_empty() {
        0
    } else {
        (app.references.len().min(4) + 2) as u16
    };

    let [messages_area, refs_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(refs_height),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = messages_area.height.saturating_sub(2);
    app.chat_width = messages_area.width.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        let speaker = match msg.role {
            ChatRole::User => Line::from(Span::styled("你：", Style::default().fg(Color::Cyan).bold())),
            ChatRole::Model => {
                let name = msg
                    .agent
                    .map(|agent| agent.display_name())
                    .unwrap_or("助手");
                Line::from(Span::styled(
                    format!("{}：", name),
                    Style::default().fg(Color::Magenta).bold(),
                ))
            }
        };
        lines.push(speaker);
        for line in msg.text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }
    if app.is_loading {
        let dots = ".".repeat((app.animation_frame + 1) as usize);
        lines.push(Line::from(Span::styled(
            format!("思考中{}", dots),
            Style::default().fg(Color::Yellow),
        )));
    }

    let messages_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" 对话 · {} ", app.active_agent.display_name()));

    let messages = Paragraph::new(Text::from(lines))
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(messages, messages_area);

    if refs_height > 0 {
        let refs_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" 参考文件 ");
        let ref_lines: Vec<Line> = app
            .references
            .iter()
            .take(4)
            .map(|name| Line::from(format!("· {}", name)))
            .collect();
        frame.render_widget(Paragraph::new(Text::from(ref_lines)).block(refs_block), refs_area);
    }

    let editing_chat = focused && app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing_chat {
            Color::Yellow
        } else {
            Color::DarkGray
        }))
        .title(" 指令 ");
    let input = Paragraph::new(app.chat_input.as_str()).block(input_block);
    frame.render_widget(input, input_area);

    if editing_chat {
        frame.set_cursor_position((
            input_area.x + app.chat_cursor as u16 + 1,
            input_area.y + 1,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints: Vec<Span> = Vec::new();
    match (app.focus, app.input_mode) {
        (FocusPane::Sidebar, InputMode::Normal) => {
            hints.extend(vec![
                Span::styled(" j/k ", key_style),
                Span::styled(" 选择 ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" 打开/展开 ", label_style),
            ]);
        }
        (FocusPane::Editor, InputMode::Normal) => {
            if app.preview_for_active().is_some() {
                hints.extend(vec![
                    Span::styled(" a ", key_style),
                    Span::styled(" 采纳变更 ", label_style),
                    Span::styled(" d ", key_style),
                    Span::styled(" 放弃 ", label_style),
                ]);
            } else {
                hints.extend(vec![
                    Span::styled(" i ", key_style),
                    Span::styled(" 编辑 ", label_style),
                    Span::styled(" g ", key_style),
                    Span::styled(" 生成本章细纲 ", label_style),
                    Span::styled(" j/k ", key_style),
                    Span::styled(" 滚动 ", label_style),
                ]);
            }
        }
        (FocusPane::Chat, InputMode::Normal) => {
            hints.extend(vec![
                Span::styled(" i ", key_style),
                Span::styled(" 输入 ", label_style),
                Span::styled(" s ", key_style),
                Span::styled(" 插入最新回复 ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" 滚动 ", label_style),
            ]);
        }
        (_, InputMode::Editing) => {
            hints.extend(vec![
                Span::styled(" Esc ", key_style),
                Span::styled(" 完成 ", label_style),
            ]);
            if app.focus == FocusPane::Chat {
                hints.extend(vec![
                    Span::styled(" Enter ", key_style),
                    Span::styled(" 发送 ", label_style),
                ]);
            }
        }
    }
    if app.input_mode == InputMode::Normal {
        hints.extend(vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" 切换面板 ", label_style),
            Span::styled(" 1/2/3 ", key_style),
            Span::styled(" 角色 ", label_style),
            Span::styled(" p ", key_style),
            Span::styled(" 提示词 ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" 退出 ", label_style),
        ]);
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" 提示 ");
    let text = Paragraph::new(app.notice.as_deref().unwrap_or(""))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(text, popup);
}

fn render_switch_confirm(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 25, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" 未保存的比对内容 ");
    let text = Paragraph::new(
        "您有未保存的比对内容，切换文件将丢弃更改。确认切换吗？\n\n[y] 确认   [n] 取消",
    )
    .block(block)
    .wrap(Wrap { trim: true });
    frame.render_widget(text, popup);
}

fn render_prompt_editor(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(70, 60, area);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(
            " {} 的系统提示词 · Ctrl+S 保存 · Esc 取消 ",
            app.active_agent.display_name()
        ));
    let text = Paragraph::new(app.prompt_draft.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(text, popup);
}

/// Centered popup rect sized as a percentage of the containing area.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(r);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
