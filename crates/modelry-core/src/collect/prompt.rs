//! Prompt collaborator interface.

use crate::catalog::ScalarType;
use crate::error::{Error, Result};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Declared type of a prompt's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptType {
    /// A scalar of the given type.
    Scalar(ScalarType),
    /// An instance of the named entity type.
    Entity(String),
}

/// An answer to a [`Question`].
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// A value to assign.
    Value(Value),
    /// Create a new related instance instead of picking one.
    Create,
}

/// One labelled entry of a choice list.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// Label shown to the user.
    pub label: String,
    /// Answer given when the label is picked.
    pub answer: Answer,
}

/// A question for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Attribute being collected.
    pub attribute: String,
    /// Label shown to the user.
    pub label: String,
    /// Declared type of the answer.
    pub prompt_type: PromptType,
    /// Answer used when the input is empty.
    pub default: Option<Value>,
    /// Ordered choice list, when the answer must be picked.
    pub choices: Option<Vec<Choice>>,
    /// Whether the prompt should complete choice labels.
    pub auto_complete: bool,
}

impl Question {
    /// Create a free-form question.
    pub fn new(attribute: impl Into<String>, label: impl Into<String>, prompt_type: PromptType) -> Self {
        Self {
            attribute: attribute.into(),
            label: label.into(),
            prompt_type,
            default: None,
            choices: None,
            auto_complete: false,
        }
    }

    /// Set the default answer.
    pub fn with_default(mut self, default: Option<Value>) -> Self {
        self.default = default;
        self
    }

    /// Append a choice. A label already present keeps its position and takes the new answer.
    pub fn with_choice(mut self, label: impl Into<String>, answer: Answer) -> Self {
        let label = label.into();
        let choices = self.choices.get_or_insert_with(Vec::new);
        match choices.iter_mut().find(|c| c.label == label) {
            Some(existing) => existing.answer = answer,
            None => choices.push(Choice { label, answer }),
        }
        self
    }

    /// Request label completion.
    pub fn with_auto_complete(mut self) -> Self {
        self.auto_complete = true;
        self
    }

    /// Labels of the choice list, in order.
    pub fn choice_labels(&self) -> Vec<&str> {
        self.choices
            .iter()
            .flatten()
            .map(|c| c.label.as_str())
            .collect()
    }

    /// Interpret raw user input.
    ///
    /// Empty input takes the default (or null). With a choice list the input must name a
    /// label, compared case-insensitively when there is no exact match. Otherwise the text is
    /// coerced to the scalar type.
    pub fn interpret(&self, input: &str) -> Result<Answer> {
        let input = input.trim();
        if input.is_empty() {
            if let Some(default) = &self.default {
                return Ok(Answer::Value(default.clone()));
            }
        }

        if let Some(choices) = &self.choices {
            return choices
                .iter()
                .find(|c| c.label == input)
                .or_else(|| choices.iter().find(|c| c.label.eq_ignore_ascii_case(input)))
                .map(|c| c.answer.clone())
                .ok_or_else(|| {
                    Error::invalid_value(&self.attribute, format!("\"{}\" is not one of the choices", input))
                });
        }

        if input.is_empty() {
            return Ok(Answer::Value(Value::Null));
        }
        match &self.prompt_type {
            PromptType::Scalar(ty) => Value::Text(input.to_string())
                .coerce(&self.attribute, *ty)
                .map(Answer::Value),
            PromptType::Entity(target) => Err(Error::invalid_value(
                &self.attribute,
                format!("expected a {} from the choice list", target),
            )),
        }
    }
}

/// Asks the user for attribute values.
///
/// A prompt handles type mismatches itself (by asking again); an error means the question
/// could not be answered at all. Interruption surfaces as [`Error::Interrupted`].
pub trait Prompt {
    /// Ask one question.
    fn ask(&self, question: &Question) -> Result<Answer>;

    /// Ask a yes/no question.
    fn confirm(&self, label: &str, default: bool) -> Result<bool>;
}

impl<P: Prompt + ?Sized> Prompt for Arc<P> {
    fn ask(&self, question: &Question) -> Result<Answer> {
        (**self).ask(question)
    }

    fn confirm(&self, label: &str, default: bool) -> Result<bool> {
        (**self).confirm(label, default)
    }
}

/// A prompt for non-interactive use: questions fail, confirmations take their default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask(&self, question: &Question) -> Result<Answer> {
        Err(Error::Prompt(format!(
            "cannot ask for \"{}\" without an interactive prompt",
            question.label
        )))
    }

    fn confirm(&self, _label: &str, default: bool) -> Result<bool> {
        Ok(default)
    }
}

/// Replays scripted input, recording every question asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    confirmations: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<Question>>,
}

impl ScriptedPrompt {
    /// Create a prompt with no scripted input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw answers, interpreted like terminal input.
    pub fn with_answers<S: Into<String>>(self, answers: impl IntoIterator<Item = S>) -> Self {
        self.answers.lock().extend(answers.into_iter().map(Into::into));
        self
    }

    /// Queue yes/no answers.
    pub fn with_confirmations(self, confirmations: impl IntoIterator<Item = bool>) -> Self {
        self.confirmations.lock().extend(confirmations);
        self
    }

    /// Questions asked so far.
    pub fn questions(&self) -> Vec<Question> {
        self.asked.lock().clone()
    }

    /// Number of unused answers.
    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&self, question: &Question) -> Result<Answer> {
        self.asked.lock().push(question.clone());
        let input = self
            .answers
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("no scripted answer for \"{}\"", question.label)))?;
        question.interpret(&input)
    }

    fn confirm(&self, _label: &str, default: bool) -> Result<bool> {
        Ok(self.confirmations.lock().pop_front().unwrap_or(default))
    }
}
