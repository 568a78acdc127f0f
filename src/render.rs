//! Incremental terminal rendering of timeline snapshots.
//!
//! Each call to [`Renderer::render`] returns only the text that has not been
//! written yet for the newest assistant message: new activity stages as
//! labelled lines, then content deltas. When content is replaced rather
//! than extended (a failure notice over a placeholder) the whole message is
//! written again on a fresh line.

use scout_core::activity::{ActivityState, Stage};
use scout_core::ids::MessageId;
use scout_core::messages::{Author, Message};

#[derive(Debug, Default)]
pub struct Renderer {
    current: Option<MessageId>,
    stages: Vec<Stage>,
    content: String,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &[Message]) -> String {
        let Some(message) = snapshot.iter().rev().find(|m| m.author == Author::Assistant) else {
            return String::new();
        };
        if self.current != Some(message.id) {
            self.current = Some(message.id);
            self.stages.clear();
            self.content.clear();
        }

        let mut out = String::new();
        if let Some(activity) = &message.activity {
            let fresh = if activity.stages.starts_with(&self.stages) {
                &activity.stages[self.stages.len()..]
            } else {
                &activity.stages[..]
            };
            for stage in fresh {
                self.break_line(&mut out);
                out.push_str(&stage_label(*stage, activity));
                out.push('\n');
            }
            self.stages = activity.stages.clone();
        }

        if let Some(delta) = message.content.strip_prefix(self.content.as_str()) {
            out.push_str(delta);
        } else {
            self.break_line(&mut out);
            out.push_str(&message.content);
        }
        self.content = message.content.clone();
        out
    }

    /// Close the line of the message in progress, if any.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        self.break_line(&mut out);
        self.content.clear();
        self.current = None;
        out
    }

    fn break_line(&self, out: &mut String) {
        let pending = if out.is_empty() { &self.content } else { &*out };
        if !pending.is_empty() && !pending.ends_with('\n') {
            out.push('\n');
        }
    }
}

fn stage_label(stage: Stage, activity: &ActivityState) -> String {
    match stage {
        Stage::Searching if !activity.query.is_empty() => {
            format!("[searching] {}", activity.query)
        }
        Stage::Reading => format!("[reading] {} sources", activity.results.len()),
        Stage::Error => match &activity.error {
            Some(err) => format!("[error] {err}"),
            None => "[error]".to_string(),
        },
        other => format!("[{}]", other.as_str()),
    }
}
