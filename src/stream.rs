use anyhow::Result;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::client::{AnalysisClient, AnalysisRequest};
use crate::tui::AppEvent;

/// Marker the generator appends after the answer text.
pub const SENTINEL: &str = "<eos>";

/// Progress messages the streaming task sends back to the event loop.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    /// Display state after a chunk: whether the echoed prompt has been found
    /// yet, and the text to show (raw accumulated buffer until then).
    Partial { prompt_echoed: bool, answer: String },
    /// The stream finished; carries the final reconciled answer.
    Done { answer: String },
    /// Transport failure; carries the detail for the inline error message.
    Failed { message: String },
}

/// What the UI should show after folding in a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub prompt_echoed: bool,
    pub answer: String,
}

/// Incremental separation of the echoed prompt prefix from the generated
/// answer ("split once"): chunks accumulate in a byte buffer, the whole
/// buffer is searched for the first occurrence of the literal prompt, and
/// everything after it (sentinel stripped, trimmed) is the answer-so-far.
/// Until the prompt shows up the raw buffer is displayed as a fallback.
///
/// A prompt that recurs inside the generated answer splits at the first
/// occurrence; the upstream format gives no way to tell the echo from a
/// quotation, so the first match wins.
pub struct Reconciler {
    prompt: String,
    buffer: Vec<u8>,
}

impl Reconciler {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            buffer: Vec::new(),
        }
    }

    /// Fold one chunk in and report the display state. Bytes accumulate raw,
    /// so a UTF-8 codepoint split across chunks decodes cleanly once its
    /// tail arrives (the partial view shows a replacement char until then).
    pub fn push(&mut self, chunk: &[u8]) -> Snapshot {
        self.buffer.extend_from_slice(chunk);
        self.snapshot()
    }

    fn snapshot(&self) -> Snapshot {
        let text = String::from_utf8_lossy(&self.buffer);

        if !self.prompt.is_empty() {
            if let Some(idx) = text.find(&self.prompt) {
                let after = &text[idx + self.prompt.len()..];
                return Snapshot {
                    prompt_echoed: true,
                    answer: strip_sentinel(after),
                };
            }
        }

        Snapshot {
            prompt_echoed: false,
            answer: text.into_owned(),
        }
    }

    /// The read loop stops the moment the sentinel has arrived, even if the
    /// connection still has bytes to offer.
    pub fn saw_sentinel(&self) -> bool {
        String::from_utf8_lossy(&self.buffer).contains(SENTINEL)
    }

    /// Final reconciled answer. A stream that ended without the sentinel is
    /// treated as complete.
    pub fn finish(self) -> String {
        let snapshot = self.snapshot();
        if snapshot.prompt_echoed {
            snapshot.answer
        } else {
            strip_sentinel(&snapshot.answer)
        }
    }
}

fn strip_sentinel(text: &str) -> String {
    text.replacen(SENTINEL, "", 1).trim().to_string()
}

/// Drive one analysis from POST to completed stream, reporting progress
/// through the given channel. Runs as a spawned task; the app releases its
/// busy flag when `Done` or `Failed` lands.
pub async fn run_analysis(
    client: AnalysisClient,
    request: AnalysisRequest,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    let update = match stream_analysis(&client, &request, &tx).await {
        Ok(answer) => {
            info!(source = request.source.kind(), "analysis stream complete");
            StreamUpdate::Done { answer }
        }
        Err(err) => {
            error!("analysis failed: {err}");
            StreamUpdate::Failed {
                message: err.to_string(),
            }
        }
    };
    let _ = tx.send(AppEvent::Stream(update));
}

async fn stream_analysis(
    client: &AnalysisClient,
    request: &AnalysisRequest,
    tx: &mpsc::UnboundedSender<AppEvent>,
) -> Result<String> {
    let response = client.analyze(request).await?;

    let mut reconciler = Reconciler::new(&request.prompt);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let snapshot = reconciler.push(&chunk);
        let _ = tx.send(AppEvent::Stream(StreamUpdate::Partial {
            prompt_echoed: snapshot.prompt_echoed,
            answer: snapshot.answer,
        }));

        if reconciler.saw_sentinel() {
            break;
        }
    }

    Ok(reconciler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "What is the answer?";

    #[test]
    fn test_split_once_strips_sentinel() {
        let mut reconciler = Reconciler::new(PROMPT);
        reconciler.push(b"What is the answer?The answer is 42.");
        reconciler.push(b"<eos>");
        assert!(reconciler.saw_sentinel());
        assert_eq!(reconciler.finish(), "The answer is 42.");
    }

    #[test]
    fn test_partial_before_prompt_shows_raw_buffer() {
        let mut reconciler = Reconciler::new(PROMPT);
        let snapshot = reconciler.push(b"What is the ans");
        assert!(!snapshot.prompt_echoed);
        assert_eq!(snapshot.answer, "What is the ans");
    }

    #[test]
    fn test_partial_after_prompt_shows_answer_only() {
        let mut reconciler = Reconciler::new(PROMPT);
        reconciler.push(b"What is the answer?");
        let snapshot = reconciler.push(b" The answer");
        assert!(snapshot.prompt_echoed);
        assert_eq!(snapshot.answer, "The answer");
    }

    #[test]
    fn test_sentinel_split_across_chunks() {
        let mut reconciler = Reconciler::new(PROMPT);
        reconciler.push(b"What is the answer?42.<eo");
        assert!(!reconciler.saw_sentinel());
        reconciler.push(b"s>");
        assert!(reconciler.saw_sentinel());
        assert_eq!(reconciler.finish(), "42.");
    }

    #[test]
    fn test_stream_end_without_sentinel_completes() {
        let mut reconciler = Reconciler::new(PROMPT);
        reconciler.push(b"What is the answer?Probably 42.");
        assert!(!reconciler.saw_sentinel());
        assert_eq!(reconciler.finish(), "Probably 42.");
    }

    #[test]
    fn test_prompt_never_echoed_falls_back_to_raw() {
        let mut reconciler = Reconciler::new(PROMPT);
        let snapshot = reconciler.push(b"a caption with no echo<eos>");
        assert!(!snapshot.prompt_echoed);
        assert_eq!(reconciler.finish(), "a caption with no echo");
    }

    #[test]
    fn test_codepoint_split_across_chunks() {
        let mut reconciler = Reconciler::new(PROMPT);
        // "é" is [0xC3, 0xA9]; split it across two chunks
        let snapshot = reconciler.push(b"What is the answer?caf\xC3");
        assert!(snapshot.answer.ends_with('\u{FFFD}'));
        let snapshot = reconciler.push(b"\xA9 au lait<eos>");
        assert_eq!(snapshot.answer, "café au lait");
        assert_eq!(reconciler.finish(), "café au lait");
    }

    #[test]
    fn test_only_first_sentinel_occurrence_is_stripped() {
        let mut reconciler = Reconciler::new(PROMPT);
        reconciler.push(b"What is the answer?It ends with <eos> literally<eos>");
        // First occurrence terminates the display text; the split keeps the
        // remainder, matching the single-replacement behavior.
        assert_eq!(reconciler.finish(), "It ends with  literally<eos>");
    }

    #[test]
    fn test_empty_prompt_never_splits() {
        let mut reconciler = Reconciler::new("");
        let snapshot = reconciler.push(b"whatever<eos>");
        assert!(!snapshot.prompt_echoed);
        assert_eq!(reconciler.finish(), "whatever");
    }
}
