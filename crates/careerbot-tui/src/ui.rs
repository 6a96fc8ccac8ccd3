use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};
use careerbot_core::{
    Affordance, AuthField, AuthMode, ChatController, ConnectionState, MessageKind, View,
};
use crate::app::App;

const MAX_OPTION_ROWS: u16 = 8;

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

    match app.view() {
        View::Auth => render_auth_screen(app, frame, body_area),
        View::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (state_text, state_color) = match app.controller().map(|c| c.state()) {
        Some(ConnectionState::Connected) => (" connected ", Color::Green),
        Some(ConnectionState::Connecting) => (" connecting ", Color::Yellow),
        Some(ConnectionState::Disconnected) => (" disconnected ", Color::Red),
        Some(ConnectionState::Closed) => (" closed ", Color::Gray),
        None => ("", Color::DarkGray),
    };

    let title = Line::from(vec![
        Span::styled(" CareerBot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(state_text, Style::default().fg(state_color)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.view() {
        View::Auth => (
            match app.auth.mode {
                AuthMode::Login => " LOGIN ",
                AuthMode::Register => " REGISTER ",
            },
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        View::Chat => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    match app.view() {
        View::Auth => hints.extend([
            Span::styled(" Tab ", key_style),
            Span::styled(" field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" submit ", label_style),
            Span::styled(" ^T ", key_style),
            Span::styled(
                match app.auth.mode {
                    AuthMode::Login => " register ",
                    AuthMode::Register => " login ",
                },
                label_style,
            ),
        ]),
        View::Chat => {
            match app.input.affordance() {
                Affordance::Select { .. } => hints.extend([
                    Span::styled(" ↑/↓ ", key_style),
                    Span::styled(" choose ", label_style),
                ]),
                Affordance::MultiSelect { .. } => hints.extend([
                    Span::styled(" ↑/↓ ", key_style),
                    Span::styled(" move ", label_style),
                    Span::styled(" Space ", key_style),
                    Span::styled(" check ", label_style),
                ]),
                Affordance::Range { .. } => hints.extend([
                    Span::styled(" ←/→ ", key_style),
                    Span::styled(" slide ", label_style),
                ]),
                Affordance::MultiLine { .. } => hints.extend([
                    Span::styled(" S-Enter ", key_style),
                    Span::styled(" newline ", label_style),
                ]),
                _ => {}
            }
            hints.extend([
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" ^N ", key_style),
                Span::styled(" new chat ", label_style),
            ]);
            if app.controller().is_some_and(|c| c.can_reconnect()) {
                hints.extend([
                    Span::styled(" ^R ", key_style),
                    Span::styled(" reconnect ", label_style),
                ]);
            }
            hints.extend([
                Span::styled(" PgUp/PgDn ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" ^D ", key_style),
                Span::styled(" logout ", label_style),
            ]);
        }
    }
    hints.extend([
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_auth_screen(app: &App, frame: &mut Frame, area: Rect) {
    let fields = app.auth.fields();

    // Calculate popup size and position (centered)
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = (fields.len() as u16) * 3 + 6;
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ", app.auth.mode.title()));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut constraints: Vec<Constraint> = fields.iter().map(|_| Constraint::Length(3)).collect();
    constraints.extend([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)]);
    let rows = Layout::vertical(constraints).split(inner);

    for (i, field) in fields.iter().enumerate() {
        let focused = *field == app.auth.focused();
        let value = app.auth.value(*field);
        let shown = match field {
            AuthField::Password => "*".repeat(value.chars().count()),
            _ => value.to_string(),
        };

        let field_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
            .title(format!(" {} ", field.label()));

        // Keep the end of long values visible
        let field_area = rows[i];
        let inner_width = field_area.width.saturating_sub(2) as usize;
        let len = shown.chars().count();
        let scroll_offset = (len + 1).saturating_sub(inner_width);
        let visible: String = shown.chars().skip(scroll_offset).collect();

        frame.render_widget(
            Paragraph::new(visible)
                .style(Style::default().fg(Color::Cyan))
                .block(field_block),
            field_area,
        );

        if focused && !app.auth.is_pending() {
            let cursor_x = len.saturating_sub(scroll_offset) as u16;
            frame.set_cursor_position((field_area.x + cursor_x + 1, field_area.y + 1));
        }
    }

    let status_row = rows[fields.len()];
    let status = if app.auth.is_pending() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(Span::styled(
            format!("Please wait{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(error) = app.auth.error().or(app.status.as_deref()) {
        Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(status), status_row);

    let switch = Paragraph::new(Line::from(vec![
        Span::styled("Ctrl+T ", Style::default().fg(Color::Yellow)),
        Span::styled(app.auth.mode.switch_text(), Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(switch, rows[fields.len() + 1]);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let banners = banner_lines(app);
    let input_height = input_height(app);

    let [progress_area, banner_area, chat_area, input_area, hint_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(banners.len() as u16),
        Constraint::Min(3),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);
    if app.follow_bottom {
        app.scroll_chat_to_bottom();
    }

    let Some(controller) = app.controller() else {
        return;
    };

    render_progress(controller, frame, progress_area);
    frame.render_widget(Paragraph::new(banners), banner_area);
    render_messages(app, controller, frame, chat_area);
    render_input(app, controller, frame, input_area);

    let hint = match (&app.input_error, app.input.affordance()) {
        (Some(error), _) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        (None, Affordance::MultiLine { max_length }) => Line::from(Span::styled(
            format!("{}/{}", app.input.char_count(), max_length),
            Style::default().fg(Color::DarkGray),
        )),
        _ => Line::default(),
    };
    frame.render_widget(Paragraph::new(hint), hint_area);
}

fn banner_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(status) = &app.status {
        lines.push(Line::from(Span::styled(
            format!(" {} ", status),
            Style::default().fg(Color::White).bg(Color::Red),
        )));
    }
    let Some(controller) = app.controller() else {
        return lines;
    };
    if let Some(error) = controller.connection_error() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", error), Style::default().fg(Color::White).bg(Color::Red)),
            Span::styled(" Ctrl+R to reconnect", Style::default().fg(Color::DarkGray)),
        ]));
    }
    if let Some(message) = controller.validation_error() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", message), Style::default().fg(Color::Black).bg(Color::Yellow)),
            Span::styled(" Esc to dismiss", Style::default().fg(Color::DarkGray)),
        ]));
    }
    if let Some(notice) = controller.notice() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", notice), Style::default().fg(Color::Black).bg(Color::Gray)),
            Span::styled(" Esc to dismiss", Style::default().fg(Color::DarkGray)),
        ]));
    }
    lines
}

fn render_progress(controller: &ChatController, frame: &mut Frame, area: Rect) {
    let progress = controller.progress();
    let module = controller
        .current_question()
        .and_then(|q| q.module_title.clone().or_else(|| q.module.clone()))
        .or_else(|| {
            controller
                .messages()
                .iter()
                .rev()
                .find_map(|m| m.module_title.clone())
        });

    let label = match module {
        Some(module) => format!("{} · {}/{}", module, progress.current, progress.total),
        None => format!("{}/{}", progress.current, progress.total),
    };

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(progress.ratio())
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_messages(app: &App, controller: &ChatController, frame: &mut Frame, area: Rect) {
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Career assistant ");

    let chat_text = if controller.messages().is_empty() && !controller.is_awaiting_response() {
        let waiting = match controller.state() {
            ConnectionState::Connecting => "Connecting to the career assistant...",
            ConnectionState::Connected => "Waiting for the first question...",
            _ => "Not connected.",
        };
        Text::from(Span::styled(waiting, Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in controller.messages() {
            let (label, style) = match msg.kind {
                MessageKind::User => ("You:", Style::default().fg(Color::Cyan)),
                MessageKind::Bot => ("Bot:", Style::default().fg(Color::Yellow)),
                MessageKind::System => ("Info:", Style::default().fg(Color::Green)),
                MessageKind::Error => ("Error:", Style::default().fg(Color::Red)),
            };
            let mut header = vec![Span::styled(label, style.add_modifier(Modifier::BOLD))];
            header.push(Span::styled(
                format!(" {}", msg.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            ));
            lines.push(Line::from(header));

            let body_style = match msg.kind {
                MessageKind::Error => Style::default().fg(Color::Red),
                MessageKind::System => Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
                _ => Style::default(),
            };
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(line.to_string(), body_style)));
            }
            lines.push(Line::default());
        }

        if controller.is_awaiting_response() {
            lines.push(Line::from(Span::styled(
                "Bot:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn input_height(app: &App) -> u16 {
    match app.input.affordance() {
        Affordance::MultiLine { .. } => 6,
        Affordance::Range { .. } => 4,
        Affordance::Select { options } | Affordance::MultiSelect { options } => {
            (options.len() as u16 + 2).min(MAX_OPTION_ROWS)
        }
        _ => 3,
    }
}

fn render_input(app: &App, controller: &ChatController, frame: &mut Frame, area: Rect) {
    let enabled = controller.can_send();
    let border_color = if enabled { Color::Yellow } else { Color::DarkGray };

    let title = if !enabled {
        " Answer (waiting) ".to_string()
    } else {
        match app.input.affordance() {
            Affordance::Number { min, max } | Affordance::Range { min, max, .. } => {
                match (min, max) {
                    (Some(min), Some(max)) => format!(" Answer ({} to {}) ", min, max),
                    (Some(min), None) => format!(" Answer (at least {}) ", min),
                    (None, Some(max)) => format!(" Answer (at most {}) ", max),
                    (None, None) => " Answer (number) ".to_string(),
                }
            }
            Affordance::Select { .. } => " Choose one ".to_string(),
            Affordance::MultiSelect { .. } => " Check all that apply ".to_string(),
            _ => " Answer ".to_string(),
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    match app.input.affordance() {
        Affordance::Select { options } | Affordance::MultiSelect { options } => {
            let multi = matches!(app.input.affordance(), Affordance::MultiSelect { .. });
            let items: Vec<ListItem> = options
                .iter()
                .map(|option| {
                    let marked = if multi {
                        app.input.is_checked(option)
                    } else {
                        app.input.chosen() == Some(option.as_str())
                    };
                    let mark = match (multi, marked) {
                        (true, true) => "[x]",
                        (true, false) => "[ ]",
                        (false, true) => "(•)",
                        (false, false) => "( )",
                    };
                    ListItem::new(format!("{} {}", mark, option))
                })
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            let mut state = ListState::default().with_selected(Some(app.input.highlighted()));
            frame.render_stateful_widget(list, area, &mut state);
        }
        Affordance::Range { .. } => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let [slider_area, value_area] =
                Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(inner);

            let value = app
                .input
                .slider_value()
                .map(|v| v.to_string())
                .unwrap_or_default();
            let slider = Gauge::default()
                .gauge_style(Style::default().fg(Color::Yellow).bg(Color::Black))
                .ratio(app.input.slider_ratio())
                .label(value);
            frame.render_widget(slider, slider_area);
            render_single_line(app, frame, value_area, enabled);
        }
        Affordance::MultiLine { .. } => {
            let inner = block.inner(area);
            frame.render_widget(block, area);

            // Cursor line and column, without wrapping
            let before: String = app.input.value().chars().take(app.input.cursor()).collect();
            let cursor_row = before.matches('\n').count() as u16;
            let cursor_col = before.rsplit('\n').next().unwrap_or("").chars().count() as u16;
            let scroll = (cursor_row + 1).saturating_sub(inner.height);

            let text = Paragraph::new(app.input.value().to_string())
                .style(Style::default().fg(Color::Cyan))
                .scroll((scroll, 0));
            frame.render_widget(text, inner);

            if enabled {
                frame.set_cursor_position((
                    inner.x + cursor_col.min(inner.width.saturating_sub(1)),
                    inner.y + cursor_row - scroll,
                ));
            }
        }
        _ => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            render_single_line(app, frame, inner, enabled);
        }
    }
}

/// One-row text field with horizontal scrolling that keeps the cursor visible.
fn render_single_line(app: &App, frame: &mut Frame, area: Rect, show_cursor: bool) {
    let inner_width = area.width as usize;
    let cursor_pos = app.input.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = app
        .input
        .value()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, area);

    if show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x, area.y));
    }
}
