use std::path::PathBuf;

use chrono::Local;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::{AnalysisClient, AnalysisRequest};
use crate::config::Config;
use crate::history::{format_timestamp, HistoryStore, RecentAnalysis};
use crate::preview::{load_preview, Preview, PreviewUpdate};
use crate::source::ImageSource;
use crate::stream::StreamUpdate;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Source,
    Prompt,
    Answer,
    History,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub dark_mode: bool,

    // Image source state. A selected file and a URL can coexist; the file
    // wins at submission time.
    pub source_input: String,
    pub source_cursor: usize,
    pub selected_file: Option<PathBuf>,
    pub url_input: String,
    pub source_label: String,

    // Preview state
    pub preview: Option<Preview>,
    pub preview_note: Option<String>,
    preview_generation: u64,

    // Prompt state
    pub prompt_input: String,
    pub prompt_cursor: usize,

    // Answer state. `active_prompt` is the prompt the in-flight (or last)
    // request was dispatched with; the reconciler's echo refers to it, not
    // to whatever is in the editor now.
    pub active_prompt: String,
    pub echoed_prompt: bool,
    pub answer: String,
    pub answer_scroll: u16,
    pub answer_height: u16,

    // One request in flight at a time
    pub analyzing: bool,
    pub stream_task: Option<tokio::task::JoinHandle<()>>,

    // Inline status line (validation and transport failures, export path)
    pub status: Option<StatusLine>,

    // History state
    pub history: HistoryStore,
    pub history_state: ListState,

    // Panel areas for mouse hit-testing (updated during render)
    pub source_area: Option<Rect>,
    pub prompt_area: Option<Rect>,
    pub answer_area: Option<Rect>,
    pub history_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    client: AnalysisClient,
    events_tx: mpsc::UnboundedSender<AppEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Info(String),
    Error(String),
}

impl App {
    pub fn new(
        config: &Config,
        history: HistoryStore,
        events_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Source,
            dark_mode: config.dark_mode,

            source_input: String::new(),
            source_cursor: 0,
            selected_file: None,
            url_input: String::new(),
            source_label: String::new(),

            preview: None,
            preview_note: None,
            preview_generation: 0,

            prompt_input: String::new(),
            prompt_cursor: 0,

            active_prompt: String::new(),
            echoed_prompt: false,
            answer: String::new(),
            answer_scroll: 0,
            answer_height: 0,

            analyzing: false,
            stream_task: None,

            status: None,

            history,
            history_state: ListState::default(),

            source_area: None,
            prompt_area: None,
            answer_area: None,
            history_area: None,

            animation_frame: 0,

            client: AnalysisClient::new(config.endpoint()),
            events_tx,
        }
    }

    /// Make `source` the image the next analysis runs against and kick off
    /// a background preview load for it.
    pub fn select_source(&mut self, source: ImageSource) {
        self.source_label = source.label();
        match &source {
            ImageSource::File(path) => {
                self.selected_file = Some(path.clone());
                self.source_input = path.display().to_string();
            }
            ImageSource::Url(url) => {
                self.url_input = url.clone();
                self.source_input = url.clone();
            }
        }
        self.source_cursor = self.source_input.chars().count();

        self.preview = None;
        self.preview_note = None;
        self.preview_generation += 1;
        tokio::spawn(load_preview(
            source,
            self.preview_generation,
            self.events_tx.clone(),
        ));
    }

    /// Dispatch one analysis request. A no-op while a request is in flight;
    /// rejects with an inline message when no image source is set.
    pub fn submit(&mut self) {
        if self.analyzing || self.stream_task.is_some() {
            return;
        }

        // File beats URL when both are set
        let source = if let Some(path) = &self.selected_file {
            ImageSource::File(path.clone())
        } else if !self.url_input.is_empty() {
            ImageSource::Url(self.url_input.clone())
        } else {
            self.status = Some(StatusLine::Error(
                "Please select an image or provide a URL.".to_string(),
            ));
            return;
        };

        info!(source = source.kind(), "dispatching analysis");

        self.analyzing = true;
        self.status = None;
        self.active_prompt = self.prompt_input.clone();
        self.echoed_prompt = false;
        self.answer.clear();
        self.answer_scroll = 0;

        let request = AnalysisRequest {
            prompt: self.active_prompt.clone(),
            source,
        };
        self.stream_task = Some(tokio::spawn(crate::stream::run_analysis(
            self.client.clone(),
            request,
            self.events_tx.clone(),
        )));
    }

    /// Fold a streaming-task message into the display. The busy flag is
    /// released on both terminal variants, never on `Partial`.
    pub fn apply_stream(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Partial {
                prompt_echoed,
                answer,
            } => {
                self.echoed_prompt = prompt_echoed;
                self.answer = answer;
            }
            StreamUpdate::Done { answer } => {
                self.answer = answer.clone();
                self.analyzing = false;
                self.stream_task = None;

                let record = RecentAnalysis {
                    prompt: self.active_prompt.clone(),
                    result: answer,
                    image_source: self.source_label.clone(),
                    timestamp: format_timestamp(Local::now()),
                };
                if let Err(err) = self.history.save(record) {
                    warn!("failed to save history: {err}");
                    self.status = Some(StatusLine::Error(format!(
                        "Failed to save history: {}",
                        err
                    )));
                }
            }
            StreamUpdate::Failed { message } => {
                self.analyzing = false;
                self.stream_task = None;
                self.status = Some(StatusLine::Error(format!("An error occurred: {}", message)));
            }
        }
    }

    /// Fold a preview-task message in, dropping results a newer selection
    /// has superseded.
    pub fn apply_preview(&mut self, update: PreviewUpdate) {
        match update {
            PreviewUpdate::Ready {
                generation,
                preview,
            } => {
                if generation == self.preview_generation {
                    self.preview = Some(preview);
                    self.preview_note = None;
                }
            }
            PreviewUpdate::Failed {
                generation,
                message,
            } => {
                if generation == self.preview_generation {
                    self.preview = None;
                    self.preview_note = Some(message);
                }
            }
        }
    }

    /// Copy the selected history record back into the display. Read-only
    /// restore: no request is issued.
    pub fn restore_selected_history(&mut self) {
        let Some(idx) = self.history_state.selected() else {
            return;
        };
        let Some(record) = self.history.entries().get(idx) else {
            return;
        };

        self.prompt_input = record.prompt.clone();
        self.prompt_cursor = record.prompt.chars().count();
        self.active_prompt = record.prompt.clone();
        self.echoed_prompt = true;
        self.answer = record.result.clone();
        self.source_label = record.image_source.clone();
        self.answer_scroll = 0;
        self.status = None;
    }

    pub fn history_nav_down(&mut self) {
        let len = self.history.entries().len();
        if len == 0 {
            return;
        }
        let i = self.history_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.history_state.select(Some(i));
    }

    pub fn history_nav_up(&mut self) {
        if self.history.entries().is_empty() {
            return;
        }
        let i = self.history_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.history_state.select(Some(i));
    }

    pub fn toggle_dark_mode(&mut self) {
        self.dark_mode = !self.dark_mode;
        if let Err(err) = Config::save_dark_mode(self.dark_mode) {
            warn!("failed to persist theme preference: {err}");
        }
    }

    pub fn scroll_answer_down(&mut self) {
        self.answer_scroll = self.answer_scroll.saturating_add(1);
    }

    pub fn scroll_answer_up(&mut self) {
        self.answer_scroll = self.answer_scroll.saturating_sub(1);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.analyzing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
