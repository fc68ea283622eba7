//! Merges successive decoder emissions into a stable transcript.
//!
//! Incremental decoders restate the entire utterance hypothesis on every
//! decode step, so appending each emission verbatim would duplicate words
//! many times over a long utterance. The reconciler keeps the previous
//! emission as a cursor and extracts only the suffix that newly appeared.

use log::debug;

use crate::engine::DecoderEmission;

#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    /// Words finalized by completed utterances. Never rewritten.
    confirmed: String,

    /// Most recent hypothesis for the active utterance.
    live: String,

    /// Previous emission text; the suffix-diff cursor.
    previous: String,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the word tokens that newly appeared in `emission` relative
    /// to the previous one within the current utterance.
    ///
    /// Blank emissions are a no-op. A hypothesis that no longer extends the
    /// previous text (the decoder revised its tail) drops the stale cursor
    /// and is treated as authoritative: every token of the new text counts
    /// as new.
    pub fn reconcile(&mut self, emission: &DecoderEmission) -> Vec<String> {
        let text = emission.text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let fresh = match text.strip_prefix(self.previous.as_str()) {
            Some(suffix) => suffix,
            None => {
                debug!(
                    "Hypothesis no longer extends the previous emission, re-evaluating: '{}'",
                    text
                );
                text
            }
        };
        let tokens = fresh.split_whitespace().map(str::to_string).collect();

        self.previous = text.to_string();
        self.live = text.to_string();
        tokens
    }

    /// Close the active utterance: the live text joins the confirmed
    /// transcript and the cursor resets for the next utterance. Returns the
    /// finalized utterance text.
    pub fn finish_utterance(&mut self) -> String {
        let finalized = self.live.trim().to_string();
        if !finalized.is_empty() {
            if !self.confirmed.is_empty() {
                self.confirmed.push(' ');
            }
            self.confirmed.push_str(&finalized);
        }
        self.live.clear();
        self.previous.clear();
        finalized
    }

    /// Confirmed words plus the trailing live hypothesis.
    pub fn transcript(&self) -> String {
        let live = self.live.trim();
        if live.is_empty() {
            self.confirmed.clone()
        } else if self.confirmed.is_empty() {
            live.to_string()
        } else {
            format!("{} {}", self.confirmed, live)
        }
    }

    pub fn confirmed(&self) -> &str {
        &self.confirmed
    }

    /// Clear everything, including the confirmed transcript. Used when a
    /// new session starts.
    pub fn reset(&mut self) {
        self.confirmed.clear();
        self.live.clear();
        self.previous.clear();
    }
}
