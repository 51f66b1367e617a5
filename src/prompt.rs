use std::collections::VecDeque;
use std::io;
use dialoguer::{Confirm, Input};

use crate::ImageRecord;

/// The questions the action executor needs answered.
pub trait Prompter {
    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;

    /// Ask which member of a group to keep, as a 0-based index.
    ///
    /// `None` means the answer was not a usable number.
    fn choose_keeper(&mut self, records: &[ImageRecord], suggested: usize)
        -> io::Result<Option<usize>>;
}

/// Asks on the terminal
#[derive(Debug, Default)]
pub struct DialoguerPrompter {
    assume_yes: bool,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every yes/no question with yes
    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }
}

impl Prompter for DialoguerPrompter {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(io::Error::other)
    }

    fn choose_keeper(
        &mut self,
        records: &[ImageRecord],
        suggested: usize,
    ) -> io::Result<Option<usize>> {
        if self.assume_yes {
            return Ok(Some(0));
        }

        let answer: String = Input::new()
            .with_prompt(format!(
                "Enter the number of the file to keep (1-{}, suggested {})",
                records.len(),
                suggested + 1
            ))
            .default("1".to_string())
            .interact_text()
            .map_err(io::Error::other)?;

        Ok(answer
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1)))
    }
}

/// Replays canned answers, for batch runs and tests.
///
/// Once the script runs out, confirmations answer no and keeper choices
/// answer `None`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    confirmations: VecDeque<bool>,
    keepers: VecDeque<Option<usize>>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirm_with(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirmations.extend(answers);
        self
    }

    pub fn keep_with(mut self, answers: impl IntoIterator<Item = Option<usize>>) -> Self {
        self.keepers.extend(answers);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        self.asked.push(prompt.to_string());
        Ok(self.confirmations.pop_front().unwrap_or(false))
    }

    fn choose_keeper(
        &mut self,
        _records: &[ImageRecord],
        _suggested: usize,
    ) -> io::Result<Option<usize>> {
        self.asked.push("keeper".to_string());
        Ok(self.keepers.pop_front().flatten())
    }
}
