//! Choice completion for prompts.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// Prompt helper completing the labels of the current choice list.
#[derive(Debug, Default)]
pub struct ChoiceHelper {
    choices: Vec<String>,
}

impl ChoiceHelper {
    /// Create a helper with no choices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the completable labels.
    pub fn set_choices(&mut self, choices: Vec<String>) {
        self.choices = choices;
    }

    /// Labels starting with `prefix`, case-insensitively.
    pub fn candidates(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.to_lowercase();
        self.choices
            .iter()
            .filter(|c| c.to_lowercase().starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }
}

impl Completer for ChoiceHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let completions = self
            .candidates(&line[..pos])
            .into_iter()
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c.to_string(),
            })
            .collect();
        Ok((0, completions))
    }
}

impl Hinter for ChoiceHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        match self.candidates(line).as_slice() {
            [only] => only.get(line.len()..).map(str::to_string),
            _ => None,
        }
    }
}

impl Highlighter for ChoiceHelper {}

impl Validator for ChoiceHelper {}

impl Helper for ChoiceHelper {}
