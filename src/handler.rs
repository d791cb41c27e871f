use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, StatusLine};
use crate::history::format_timestamp;
use crate::source;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Stream(update) => app.apply_stream(update),
        AppEvent::Preview(update) => app.apply_preview(update),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Source => FocusPane::Prompt,
                FocusPane::Prompt => FocusPane::Answer,
                FocusPane::Answer => FocusPane::History,
                FocusPane::History => FocusPane::Source,
            };
        }
        KeyCode::BackTab => {
            app.focus = match app.focus {
                FocusPane::Source => FocusPane::History,
                FocusPane::Prompt => FocusPane::Source,
                FocusPane::Answer => FocusPane::Prompt,
                FocusPane::History => FocusPane::Answer,
            };
        }

        // Enter editing on the text panes
        KeyCode::Char('e') | KeyCode::Char('i') => {
            if matches!(app.focus, FocusPane::Source | FocusPane::Prompt) {
                app.input_mode = InputMode::Editing;
            }
        }

        KeyCode::Enter => match app.focus {
            FocusPane::Source | FocusPane::Prompt => app.input_mode = InputMode::Editing,
            FocusPane::History => app.restore_selected_history(),
            FocusPane::Answer => {}
        },

        // Navigation / scrolling
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::History => app.history_nav_down(),
            FocusPane::Answer => app.scroll_answer_down(),
            _ => {}
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::History => app.history_nav_up(),
            FocusPane::Answer => app.scroll_answer_up(),
            _ => {}
        },

        KeyCode::Char('a') => app.submit(),
        KeyCode::Char('t') => app.toggle_dark_mode(),
        KeyCode::Char('s') => export_result(app),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.focus {
        FocusPane::Source => handle_source_editing(app, key),
        FocusPane::Prompt => handle_prompt_editing(app, key),
        // Editing mode only exists for the two text panes
        _ => app.input_mode = InputMode::Normal,
    }
}

fn handle_source_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            confirm_source_input(app);
        }
        KeyCode::Backspace => {
            if app.source_cursor > 0 {
                app.source_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.source_input, app.source_cursor);
                app.source_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.source_input.chars().count();
            if app.source_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.source_input, app.source_cursor);
                app.source_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.source_cursor = app.source_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.source_input.chars().count();
            app.source_cursor = (app.source_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.source_cursor = 0,
        KeyCode::End => app.source_cursor = app.source_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.source_input, app.source_cursor);
            app.source_input.insert(byte_pos, c);
            app.source_cursor += 1;
        }
        _ => {}
    }
}

fn handle_prompt_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Enter submits, mid-stream presses are a no-op inside submit()
        KeyCode::Enter => {
            app.submit();
        }
        KeyCode::Backspace => {
            if app.prompt_cursor > 0 {
                app.prompt_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.prompt_input.chars().count();
            if app.prompt_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.prompt_cursor = app.prompt_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.prompt_input.chars().count();
            app.prompt_cursor = (app.prompt_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.prompt_cursor = 0,
        KeyCode::End => app.prompt_cursor = app.prompt_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
            app.prompt_input.insert(byte_pos, c);
            app.prompt_cursor += 1;
        }
        _ => {}
    }
}

/// A confirmed source-field entry goes through the same classification as a
/// paste; unclassifiable text leaves a note in the preview pane.
fn confirm_source_input(app: &mut App) {
    let text = app.source_input.clone();
    match source::classify_text(&text) {
        Some(source) => app.select_source(source),
        None => {
            if !app.source_input.trim().is_empty() {
                app.preview_note = Some("Not an image file or URL".to_string());
            }
        }
    }
}

/// Pasted text is the terminal's stand-in for a drop: while editing the
/// prompt it is plain text input, anywhere else it is classified as an
/// image source and silently ignored when it is neither a file, a URL,
/// nor an `<img>` fragment.
fn handle_paste(app: &mut App, text: &str) {
    if app.input_mode == InputMode::Editing && app.focus == FocusPane::Prompt {
        let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
        app.prompt_input.insert_str(byte_pos, text);
        app.prompt_cursor += text.chars().count();
        return;
    }

    if let Some(source) = source::classify_text(text) {
        app.select_source(source);
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_source = app.source_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_prompt = app.prompt_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_answer = app.answer_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_history = app.history_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_answer {
                app.scroll_answer_down();
                app.scroll_answer_down();
                app.scroll_answer_down();
            } else if in_history {
                app.history_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_answer {
                app.scroll_answer_up();
                app.scroll_answer_up();
                app.scroll_answer_up();
            } else if in_history {
                app.history_nav_up();
            }
        }
        MouseEventKind::Down(_) => {
            if in_history {
                if let Some(area) = app.history_area {
                    app.focus = FocusPane::History;
                    // Rows start below the top border
                    let row = y.saturating_sub(area.y + 1) as usize;
                    if row < app.history.entries().len() {
                        app.history_state.select(Some(row));
                        app.restore_selected_history();
                    }
                }
            } else if in_source {
                app.focus = FocusPane::Source;
                app.input_mode = InputMode::Editing;
            } else if in_prompt {
                app.focus = FocusPane::Prompt;
                app.input_mode = InputMode::Editing;
            } else if in_answer {
                app.focus = FocusPane::Answer;
            }
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Write the displayed result as a plain-text report in the working
/// directory, the terminal's stand-in for a browser download.
fn export_result(app: &mut App) {
    if app.answer.is_empty() {
        app.status = Some(StatusLine::Error("Nothing to save yet.".to_string()));
        return;
    }

    let timestamp = format_timestamp(Local::now());
    let text = format!(
        "Analysis Result ({})\nImage Source: {}\nPrompt: {}\n\nAnswer: {}\n",
        timestamp, app.source_label, app.active_prompt, app.answer
    );
    let file_name = format!("analysis_result_{}.txt", Utc::now().timestamp_millis());

    match std::fs::write(&file_name, text) {
        Ok(()) => {
            app.status = Some(StatusLine::Info(format!("Saved to {}", file_name)));
        }
        Err(err) => {
            app.status = Some(StatusLine::Error(format!("Failed to save: {}", err)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::history::HistoryStore;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryStore::open(dir.path().join("recent_analyses.json")).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        // Task-side sends are fire-and-forget, a closed channel is fine here
        drop(rx);
        App::new(&Config::new(), history, tx)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_prompt_editing_round_trip() {
        let mut app = test_app();
        app.focus = FocusPane::Prompt;

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        for c in "héllo".chars() {
            handle_event(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(app.prompt_input, "héllo");

        handle_event(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.prompt_input, "héll");

        handle_event(&mut app, key(KeyCode::Home)).unwrap();
        handle_event(&mut app, key(KeyCode::Delete)).unwrap();
        assert_eq!(app.prompt_input, "éll");

        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_paste_garbage_is_silent_noop() {
        let mut app = test_app();

        handle_event(&mut app, AppEvent::Paste("not a file or url".to_string())).unwrap();

        assert!(app.selected_file.is_none());
        assert!(app.url_input.is_empty());
        assert!(app.status.is_none());
        assert!(app.preview_note.is_none());
    }

    #[tokio::test]
    async fn test_paste_url_selects_source() {
        let mut app = test_app();

        handle_event(
            &mut app,
            AppEvent::Paste("https://example.com/cat.jpg".to_string()),
        )
        .unwrap();

        assert_eq!(app.url_input, "https://example.com/cat.jpg");
        assert_eq!(app.source_label, "URL: https://example.com/cat.jpg");
    }

    #[tokio::test]
    async fn test_paste_while_editing_prompt_is_text() {
        let mut app = test_app();
        app.focus = FocusPane::Prompt;
        app.input_mode = InputMode::Editing;

        handle_event(&mut app, AppEvent::Paste("what is".to_string())).unwrap();

        assert_eq!(app.prompt_input, "what is");
        assert!(app.url_input.is_empty());
    }

    #[tokio::test]
    async fn test_enter_in_prompt_submits_and_validates() {
        let mut app = test_app();
        app.focus = FocusPane::Prompt;
        app.input_mode = InputMode::Editing;

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();

        // No source set: validation message, nothing dispatched
        assert!(!app.analyzing);
        assert_eq!(
            app.status,
            Some(StatusLine::Error(
                "Please select an image or provide a URL.".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_export_without_answer_is_rejected() {
        let mut app = test_app();

        handle_event(&mut app, key(KeyCode::Char('s'))).unwrap();

        assert_eq!(
            app.status,
            Some(StatusLine::Error("Nothing to save yet.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_tab_cycles_focus() {
        let mut app = test_app();
        assert_eq!(app.focus, FocusPane::Source);

        for expected in [
            FocusPane::Prompt,
            FocusPane::Answer,
            FocusPane::History,
            FocusPane::Source,
        ] {
            handle_event(&mut app, key(KeyCode::Tab)).unwrap();
            assert_eq!(app.focus, expected);
        }
    }
}
