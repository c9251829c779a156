use std::time::{Duration, Instant};

use crate::quiz::{QuizMode, Verdict};

/// How long transient feedback stays on screen. A newer message simply
/// replaces the deadline, matching the original's reset-on-write behavior.
pub const FEEDBACK_TTL: Duration = Duration::from_millis(2500);

/// Info panel content for the currently selected structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPanel {
    pub name: String,
    pub detail: Option<String>,
}

/// State of the score, prompt, feedback, and info panels. The app surfaces
/// these strings through the window title and the log stream.
#[derive(Debug, Default)]
pub struct Hud {
    score: u32,
    mode: QuizMode,
    prompt: Option<String>,
    feedback: Option<(String, Instant)>,
    info: Option<InfoPanel>,
}

impl Hud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&mut self, score: u32) {
        self.score = score;
    }

    pub fn set_mode(&mut self, mode: QuizMode) {
        self.mode = mode;
    }

    pub fn set_prompt(&mut self, prompt: Option<String>) {
        self.prompt = prompt;
    }

    pub fn show_info(&mut self, name: impl Into<String>, detail: Option<&str>) {
        self.info = Some(InfoPanel {
            name: name.into(),
            detail: detail.map(str::to_string),
        });
    }

    pub fn clear_info(&mut self) {
        self.info = None;
    }

    pub fn info(&self) -> Option<&InfoPanel> {
        self.info.as_ref()
    }

    pub fn show_feedback(&mut self, message: impl Into<String>, now: Instant) {
        self.feedback = Some((message.into(), now + FEEDBACK_TTL));
    }

    /// Applies a quiz verdict: updates feedback and, on a mode change, the
    /// mode line.
    pub fn apply_verdict(&mut self, verdict: &Verdict, now: Instant) {
        match verdict {
            Verdict::Ignored => {}
            Verdict::Correct { found, advanced_to } => {
                self.show_feedback(format!("Correct! Found {found}."), now);
                if let Some(mode) = advanced_to {
                    self.mode = *mode;
                }
            }
            Verdict::Incorrect { clicked } => {
                self.show_feedback(format!("Incorrect: that was the {clicked}."), now);
            }
        }
    }

    /// Drops feedback whose deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if let Some((_, deadline)) = &self.feedback {
            if now >= *deadline {
                self.feedback = None;
            }
        }
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_ref().map(|(message, _)| message.as_str())
    }

    /// One-line summary used as the window title.
    pub fn title_line(&self) -> String {
        let mut line = format!("neuro-atlas | {} | score {}", self.mode.title(), self.score);
        if let Some(prompt) = &self.prompt {
            line.push_str(" | ");
            line.push_str(prompt);
        }
        if let Some((feedback, _)) = &self.feedback {
            line.push_str(" | ");
            line.push_str(feedback);
        }
        line
    }

    /// Multi-line info panel text, if a structure is selected.
    pub fn info_text(&self) -> Option<String> {
        self.info.as_ref().map(|panel| match &panel.detail {
            Some(detail) => format!("{}\n{detail}", panel.name),
            None => panel.name.clone(),
        })
    }
}
