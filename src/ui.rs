use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, FocusPane, InputMode, StatusLine};
use crate::preview::Preview;

/// Colors for the two themes. The dark palette mirrors the terminal
/// defaults most people run; the light one inverts it for bright terminals.
struct Theme {
    bg: Color,
    fg: Color,
    dim: Color,
    accent: Color,
    answer: Color,
    border: Color,
    border_focus: Color,
    error: Color,
}

fn theme(dark_mode: bool) -> Theme {
    if dark_mode {
        Theme {
            bg: Color::Black,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            answer: Color::Yellow,
            border: Color::DarkGray,
            border_focus: Color::Cyan,
            error: Color::Red,
        }
    } else {
        Theme {
            bg: Color::White,
            fg: Color::Black,
            dim: Color::Gray,
            accent: Color::Blue,
            answer: Color::Magenta,
            border: Color::Gray,
            border_focus: Color::Blue,
            error: Color::Red,
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let t = theme(app.dark_mode);
    let area = frame.area();

    // Paint the themed background before anything else
    frame.render_widget(
        Block::default().style(Style::default().bg(t.bg).fg(t.fg)),
        area,
    );

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(2),
    ])
    .areas(area);

    render_header(app, frame, header_area, &t);

    // Body: source/preview/history column on the left, prompt/answer on the right
    let [left_area, right_area] =
        Layout::horizontal([Constraint::Length(44), Constraint::Min(30)]).areas(body_area);

    let [source_area, preview_area, history_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(8),
        Constraint::Length(7),
    ])
    .areas(left_area);

    let [prompt_area, answer_area] =
        Layout::vertical([Constraint::Length(4), Constraint::Min(0)]).areas(right_area);

    // Store areas for mouse hit-testing
    app.source_area = Some(source_area);
    app.prompt_area = Some(prompt_area);
    app.answer_area = Some(answer_area);
    app.history_area = Some(history_area);

    render_source(app, frame, source_area, &t);
    render_preview(app, frame, preview_area, &t);
    render_history(app, frame, history_area, &t);
    render_prompt(app, frame, prompt_area, &t);
    render_answer(app, frame, answer_area, &t);
    render_footer(app, frame, footer_area, &t);
}

fn border_style(t: &Theme, focused: bool) -> Style {
    if focused {
        Style::default().fg(t.border_focus)
    } else {
        Style::default().fg(t.border)
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, t: &Theme) {
    let mode = if app.dark_mode { "dark" } else { "light" };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Glimpse",
            Style::default().fg(t.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" - ask questions about an image", Style::default().fg(t.dim)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(t.border))
            .title(format!(" {} theme (t to switch) ", mode)),
    );
    frame.render_widget(header, area);
}

fn render_source(app: &App, frame: &mut Frame, area: Rect, t: &Theme) {
    let focused = app.focus == FocusPane::Source;
    let editing = focused && app.input_mode == InputMode::Editing;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(t, focused))
        .title(" Image ");

    let input_line = if app.source_input.is_empty() {
        Line::from(Span::styled(
            "Type or paste a file path or URL...",
            Style::default().fg(t.dim),
        ))
    } else {
        Line::from(app.source_input.as_str())
    };

    let selected_line = if app.source_label.is_empty() {
        Line::default()
    } else {
        Line::from(Span::styled(
            format!("Selected: {}", app.source_label),
            Style::default().fg(t.dim),
        ))
    };

    let source = Paragraph::new(Text::from(vec![input_line, selected_line])).block(block);
    frame.render_widget(source, area);

    if editing {
        let x = area.x + 1 + (app.source_cursor as u16).min(area.width.saturating_sub(3));
        frame.set_cursor(x, area.y + 1);
    }
}

fn render_preview(app: &App, frame: &mut Frame, area: Rect, t: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(t.border))
        .title(" Preview ");

    let content = if let Some(preview) = &app.preview {
        let mut lines = preview_lines(preview);
        lines.push(Line::from(Span::styled(
            format!("{} x {}", preview.dimensions.0, preview.dimensions.1),
            Style::default().fg(t.dim),
        )));
        Text::from(lines)
    } else if let Some(note) = &app.preview_note {
        Text::from(Span::styled(note.as_str(), Style::default().fg(t.dim)))
    } else {
        Text::from(Span::styled(
            "No image selected",
            Style::default().fg(t.dim),
        ))
    };

    frame.render_widget(Paragraph::new(content).block(block), area);
}

/// One `▀` per cell: glyph color is the top pixel, background the bottom.
fn preview_lines(preview: &Preview) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(preview.rows as usize);
    for row in 0..preview.rows as usize {
        let mut spans = Vec::with_capacity(preview.cols as usize);
        for col in 0..preview.cols as usize {
            let (top, bottom) = preview.cells[row * preview.cols as usize + col];
            spans.push(Span::styled(
                "\u{2580}",
                Style::default()
                    .fg(Color::Rgb(top[0], top[1], top[2]))
                    .bg(Color::Rgb(bottom[0], bottom[1], bottom[2])),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn render_prompt(app: &App, frame: &mut Frame, area: Rect, t: &Theme) {
    let focused = app.focus == FocusPane::Prompt;
    let editing = focused && app.input_mode == InputMode::Editing;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(t, focused))
        .title(" Prompt (Enter to analyze) ");

    let content = if app.prompt_input.is_empty() && !editing {
        Text::from(Span::styled(
            "What do you want to know about the image?",
            Style::default().fg(t.dim),
        ))
    } else {
        Text::from(app.prompt_input.as_str())
    };

    let prompt = Paragraph::new(content).block(block).wrap(Wrap { trim: false });
    frame.render_widget(prompt, area);

    if editing {
        let inner_width = area.width.saturating_sub(2).max(1);
        let cursor = app.prompt_cursor as u16;
        let x = area.x + 1 + cursor % inner_width;
        let y = area.y + 1 + (cursor / inner_width).min(area.height.saturating_sub(3));
        frame.set_cursor(x, y);
    }
}

fn render_answer(app: &mut App, frame: &mut Frame, area: Rect, t: &Theme) {
    let focused = app.focus == FocusPane::Answer;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(t, focused))
        .title(" Analysis ");

    let text = if app.analyzing && app.answer.is_empty() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Text::from(Line::from(Span::styled(
            format!("Analyzing{}", dots),
            Style::default().fg(t.dim).add_modifier(Modifier::ITALIC),
        )))
    } else if app.answer.is_empty() {
        Text::from(Span::styled(
            "Select an image, write a prompt, press Enter.",
            Style::default().fg(t.dim),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        if app.echoed_prompt {
            lines.push(Line::from(Span::styled(
                app.active_prompt.clone(),
                Style::default().fg(t.accent).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());
        }
        for line in app.answer.lines() {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(t.answer),
            )));
        }
        Text::from(lines)
    };

    // Keep the scroll inside the content now that we know the pane height
    app.answer_height = area.height.saturating_sub(2);
    let total_lines = text.lines.len() as u16;
    let max_scroll = total_lines.saturating_sub(app.answer_height);
    if app.answer_scroll > max_scroll {
        app.answer_scroll = max_scroll;
    }

    let answer = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.answer_scroll, 0));
    frame.render_widget(answer, area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect, t: &Theme) {
    let focused = app.focus == FocusPane::History;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(t, focused))
        .title(" Recent Analyses ");

    if app.history.entries().is_empty() {
        let empty = Paragraph::new(Span::styled(
            "No analyses yet",
            Style::default().fg(t.dim),
        ))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history
        .entries()
        .iter()
        .map(|record| ListItem::new(record.row_label()))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .fg(t.accent)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.history_state);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, t: &Theme) {
    let [status_area, help_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

    let status = match &app.status {
        Some(StatusLine::Error(message)) => {
            Line::from(Span::styled(message.clone(), Style::default().fg(t.error)))
        }
        Some(StatusLine::Info(message)) => {
            Line::from(Span::styled(message.clone(), Style::default().fg(t.accent)))
        }
        None => Line::default(),
    };
    frame.render_widget(Paragraph::new(status), status_area);

    let help = match app.input_mode {
        InputMode::Normal => {
            " Tab focus | Enter edit/restore | a analyze | j/k scroll | s save | t theme | q quit "
        }
        InputMode::Editing => " Enter confirm | Esc done | paste a path or URL anywhere ",
    };
    frame.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(t.dim))),
        help_area,
    );
}
