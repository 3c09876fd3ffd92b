//! Run outcomes and the final verdict.
//!
//! Every `block` / `warn` / `allow` that fires, and every group that
//! completes, appends an [`Outcome`]. The [`Verdict`] is a monotonic fold
//! over outcome kinds: one `Block` makes the run `Blocked` no matter how
//! many passes follow, one `Warn` makes an otherwise clean run `Warned`.

use colored::Colorize;
use gatekeep_syntax::{Span, StmtId};

/// What kind of report entry a statement produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Pass,
    Warn,
    Block,
    /// Verdict-neutral, but still recorded so the report shows it.
    Allow,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub message: Option<String>,
    /// Statement that produced this outcome; used to order merged
    /// parallel results deterministically.
    pub origin: StmtId,
    pub span: Span,
    /// Enclosing group name, if any.
    pub group: Option<String>,
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Warned,
    Blocked,
    /// The engine itself failed (syntax, resolution, or an uncaught
    /// runtime error). No check verdict applies.
    Errored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Warned => "warned",
            Verdict::Blocked => "blocked",
            Verdict::Errored => "errored",
        }
    }

    /// Exit code convention: pass/warn allow the hook to continue.
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Passed | Verdict::Warned => 0,
            Verdict::Blocked => 1,
            Verdict::Errored => 2,
        }
    }
}

/// Accumulated outcomes of one run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Appends another report's outcomes, keeping their order.
    pub fn extend(&mut self, other: Report) {
        self.outcomes.extend(other.outcomes);
    }

    /// Folds outcome kinds into the verdict. `Allow` and `Pass` never
    /// downgrade an earlier `Warn` or `Block`.
    pub fn verdict(&self) -> Verdict {
        let mut verdict = Verdict::Passed;
        for outcome in &self.outcomes {
            match outcome.kind {
                OutcomeKind::Block => return Verdict::Blocked,
                OutcomeKind::Warn => verdict = Verdict::Warned,
                OutcomeKind::Pass | OutcomeKind::Allow => {}
            }
        }
        verdict
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Block)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.kind == OutcomeKind::Warn)
    }

    /// Renders the report for terminal display.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for outcome in &self.outcomes {
            let label = match outcome.kind {
                OutcomeKind::Pass => "pass".green(),
                OutcomeKind::Warn => "warn".yellow(),
                OutcomeKind::Block => "block".red().bold(),
                OutcomeKind::Allow => "allow".blue(),
            };
            let mut line = format!("  {}", label);
            if let Some(group) = &outcome.group {
                line.push_str(&format!(" [{}]", group.dimmed()));
            }
            if let Some(message) = &outcome.message {
                line.push_str(&format!(" {}", message));
            }
            out.push_str(&line);
            out.push('\n');
        }

        let verdict = self.verdict();
        let header = match verdict {
            Verdict::Passed => "passed".green().bold(),
            Verdict::Warned => "warned".yellow().bold(),
            Verdict::Blocked => "blocked".red().bold(),
            Verdict::Errored => "errored".red().bold(),
        };
        out.push_str(&format!("result: {}\n", header));
        out
    }
}
