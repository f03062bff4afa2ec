//! Interactive review of ranked suggestions.
//!
//! [`ReviewSession`] is a plain state machine: every call to
//! [`ReviewSession::handle`] consumes one decision for the current suggestion
//! and moves the cursor. Where decisions come from is the job of a
//! [`DecisionSource`], so the same loop runs against a terminal, the
//! non-interactive `--yes` mode or a scripted list in tests.

use colored::*;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::output::OutputFormatter;
use crate::suggestion::{Suggestion, SuggestionStatus};

/// One reviewer decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    Approve,
    Reject,
    /// Approve with a replacement for the target's final name.
    Rename(String),
    /// Approve the current and every remaining suggestion.
    ApproveAll,
    /// Stop reviewing. Earlier approvals stand.
    Quit,
}

/// Single-key review commands as typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewKey {
    Yes,
    No,
    Quit,
    All,
    Rename,
}

impl ReviewKey {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(ReviewKey::Yes),
            "n" | "no" => Some(ReviewKey::No),
            "q" | "quit" => Some(ReviewKey::Quit),
            "a" | "all" => Some(ReviewKey::All),
            "r" | "rename" => Some(ReviewKey::Rename),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("'{0}' is not a valid folder name")]
    InvalidName(String),

    #[error("review already finished")]
    Finished,
}

/// Checks a user-supplied replacement name.
pub fn validate_name(name: &str) -> Result<String, ReviewError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed.contains('\0')
    {
        return Err(ReviewError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Waiting for a decision on the suggestion at this index.
    Reviewing(usize),
    /// Every suggestion has a decision, or the reviewer approved the rest.
    Completed,
    /// The reviewer quit; undecided suggestions stay unapproved.
    Cancelled,
}

pub struct ReviewSession {
    suggestions: Vec<Suggestion>,
    state: ReviewState,
}

impl ReviewSession {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        let state = if suggestions.is_empty() {
            ReviewState::Completed
        } else {
            ReviewState::Reviewing(0)
        };
        Self { suggestions, state }
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, ReviewState::Reviewing(_))
    }

    /// Index and value of the suggestion awaiting a decision.
    pub fn current(&self) -> Option<(usize, &Suggestion)> {
        match self.state {
            ReviewState::Reviewing(i) => self.suggestions.get(i).map(|s| (i, s)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Applies one decision. An invalid rename leaves the cursor in place.
    pub fn handle(&mut self, event: ReviewEvent) -> Result<ReviewState, ReviewError> {
        let ReviewState::Reviewing(index) = self.state else {
            return Err(ReviewError::Finished);
        };

        match event {
            ReviewEvent::Approve => self.decide(index, SuggestionStatus::Approved),
            ReviewEvent::Reject => self.decide(index, SuggestionStatus::Rejected),
            ReviewEvent::Rename(name) => {
                let name = validate_name(&name)?;
                self.decide(index, SuggestionStatus::Modified(name));
            }
            ReviewEvent::ApproveAll => {
                for suggestion in &mut self.suggestions[index..] {
                    if suggestion.status == SuggestionStatus::Proposed {
                        suggestion.status = SuggestionStatus::Approved;
                    }
                }
                self.state = ReviewState::Completed;
            }
            ReviewEvent::Quit => {
                debug!(reviewed = index, total = self.len(), "review cancelled");
                self.state = ReviewState::Cancelled;
            }
        }
        Ok(self.state)
    }

    fn decide(&mut self, index: usize, status: SuggestionStatus) {
        self.suggestions[index].status = status;
        self.state = if index + 1 < self.suggestions.len() {
            ReviewState::Reviewing(index + 1)
        } else {
            ReviewState::Completed
        };
    }

    /// Drives the session to completion with decisions from `source`.
    pub fn run(&mut self, source: &mut dyn DecisionSource) -> io::Result<ReviewState> {
        let total = self.len();
        while let Some((index, suggestion)) = self.current() {
            let event = source.decide(index, total, suggestion)?;
            if let Err(e) = self.handle(event) {
                source.rejected(&e)?;
            }
        }
        Ok(self.state)
    }

    /// Accepted suggestions in review order.
    pub fn approved(&self) -> Vec<Suggestion> {
        self.suggestions
            .iter()
            .filter(|s| s.status.is_accepted())
            .cloned()
            .collect()
    }

    pub fn into_suggestions(self) -> Vec<Suggestion> {
        self.suggestions
    }
}

/// Where review decisions and confirmations come from.
pub trait DecisionSource {
    /// Decision for the suggestion at `index` of `total`.
    fn decide(&mut self, index: usize, total: usize, suggestion: &Suggestion)
    -> io::Result<ReviewEvent>;

    /// Yes/no answer to a confirmation question.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;

    /// Called when a decision was refused by the session.
    fn rejected(&mut self, _error: &ReviewError) -> io::Result<()> {
        Ok(())
    }
}

/// Approves everything without asking. Used by `--yes`.
#[derive(Debug, Default)]
pub struct AutoApprove;

impl DecisionSource for AutoApprove {
    fn decide(&mut self, _: usize, _: usize, _: &Suggestion) -> io::Result<ReviewEvent> {
        Ok(ReviewEvent::ApproveAll)
    }

    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// A fixed queue of decisions. Once the queue runs dry every further decision
/// is [`ReviewEvent::Quit`] and every confirmation is `false`.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    events: VecDeque<ReviewEvent>,
    confirmations: VecDeque<bool>,
    rejections: usize,
}

impl ScriptedDecisions {
    pub fn new(events: impl IntoIterator<Item = ReviewEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            confirmations: VecDeque::new(),
            rejections: 0,
        }
    }

    pub fn with_confirmations(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirmations = answers.into_iter().collect();
        self
    }

    /// How many decisions the session refused.
    pub fn rejections(&self) -> usize {
        self.rejections
    }

    /// Scripted decisions not yet handed out.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(&mut self, _: usize, _: usize, _: &Suggestion) -> io::Result<ReviewEvent> {
        Ok(self.events.pop_front().unwrap_or(ReviewEvent::Quit))
    }

    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }

    fn rejected(&mut self, _error: &ReviewError) -> io::Result<()> {
        self.rejections += 1;
        Ok(())
    }
}

/// Prompts on a terminal. End of input counts as quitting.
pub struct TerminalDecisions<R, W> {
    input: R,
    output: W,
    root: std::path::PathBuf,
}

impl TerminalDecisions<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio(root: &Path) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), root)
    }
}

impl<R: BufRead, W: Write> TerminalDecisions<R, W> {
    pub fn new(input: R, output: W, root: &Path) -> Self {
        Self {
            input,
            output,
            root: root.to_path_buf(),
        }
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> DecisionSource for TerminalDecisions<R, W> {
    fn decide(
        &mut self,
        index: usize,
        total: usize,
        suggestion: &Suggestion,
    ) -> io::Result<ReviewEvent> {
        let card = OutputFormatter::suggestion_card(index, total, suggestion, &self.root);
        writeln!(self.output, "\n{}", card)?;

        loop {
            let Some(answer) = self.ask("Apply? (y/n/q to quit/a to approve all/r to rename): ")?
            else {
                return Ok(ReviewEvent::Quit);
            };
            match ReviewKey::parse(&answer) {
                Some(ReviewKey::Yes) => return Ok(ReviewEvent::Approve),
                Some(ReviewKey::No) => return Ok(ReviewEvent::Reject),
                Some(ReviewKey::Quit) => return Ok(ReviewEvent::Quit),
                Some(ReviewKey::All) => return Ok(ReviewEvent::ApproveAll),
                Some(ReviewKey::Rename) => {
                    let Some(name) = self.ask("New name: ")? else {
                        return Ok(ReviewEvent::Quit);
                    };
                    return Ok(ReviewEvent::Rename(name));
                }
                None => writeln!(
                    self.output,
                    "{}",
                    "Please answer y, n, q, a or r.".yellow()
                )?,
            }
        }
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(&format!("{} (y/n): ", question))? else {
                return Ok(false);
            };
            match ReviewKey::parse(&answer) {
                Some(ReviewKey::Yes) => return Ok(true),
                Some(ReviewKey::No) | Some(ReviewKey::Quit) => return Ok(false),
                _ => writeln!(self.output, "{}", "Please answer y or n.".yellow())?,
            }
        }
    }

    fn rejected(&mut self, error: &ReviewError) -> io::Result<()> {
        writeln!(self.output, "{} {}", "✗".red(), error)
    }
}
