//! Terminal prompt.

use crate::completer::ChoiceHelper;
use crate::error::CliError;
use modelry_core::{Answer, Error, Prompt, Question};
use parking_lot::Mutex;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, Editor};

/// Asks questions on the terminal, completing choice labels.
///
/// Answers that do not fit the question's type are reported and asked again.
pub struct TerminalPrompt {
    editor: Mutex<Editor<ChoiceHelper, DefaultHistory>>,
}

impl TerminalPrompt {
    /// Set up the line editor.
    pub fn new() -> Result<Self, CliError> {
        let config = Config::builder()
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ChoiceHelper, DefaultHistory> = Editor::with_config(config)?;
        editor.set_helper(Some(ChoiceHelper::new()));
        Ok(Self {
            editor: Mutex::new(editor),
        })
    }

    fn read(editor: &mut Editor<ChoiceHelper, DefaultHistory>, text: &str) -> modelry_core::Result<String> {
        match editor.readline(text) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Err(Error::Interrupted),
            Err(e) => Err(Error::Prompt(e.to_string())),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn ask(&self, question: &Question) -> modelry_core::Result<Answer> {
        let mut editor = self.editor.lock();
        if let Some(helper) = editor.helper_mut() {
            let labels = question.choice_labels().into_iter().map(str::to_string).collect();
            helper.set_choices(labels);
        }

        let text = question_text(question);
        loop {
            let line = Self::read(&mut editor, &text)?;
            match question.interpret(&line) {
                Ok(answer) => return Ok(answer),
                Err(e @ Error::InvalidValue { .. }) => eprintln!("{}", e),
                Err(e) => return Err(e),
            }
        }
    }

    fn confirm(&self, label: &str, default: bool) -> modelry_core::Result<bool> {
        let mut editor = self.editor.lock();
        if let Some(helper) = editor.helper_mut() {
            helper.set_choices(vec!["yes".to_string(), "no".to_string()]);
        }

        let text = format!("{} [{}]: ", label, if default { "Y/n" } else { "y/N" });
        loop {
            let line = Self::read(&mut editor, &text)?;
            match parse_yes_no(&line, default) {
                Some(answer) => return Ok(answer),
                None => eprintln!("Please answer yes or no."),
            }
        }
    }
}

/// Prompt text: label, choice labels, default.
pub fn question_text(question: &Question) -> String {
    let mut text = question.label.clone();
    let labels = question.choice_labels();
    if !labels.is_empty() {
        text.push_str(&format!(" ({})", labels.join(" / ")));
    }
    if let Some(default) = &question.default {
        text.push_str(&format!(" [{}]", default));
    }
    text.push_str(": ");
    text
}

/// Interpret a yes/no answer; empty input takes the default.
pub fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" | "s" | "sim" | "true" | "1" => Some(true),
        "n" | "no" | "nao" | "não" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelry_core::{PromptType, ScalarType, Value};

    #[test]
    fn test_question_text() {
        let question = Question::new("age", "Age", PromptType::Scalar(ScalarType::Int)).with_default(Some(Value::Int(3)));
        assert_eq!(question_text(&question), "Age [3]: ");

        let question = Question::new("owner", "Owner", PromptType::Entity("Person".into()))
            .with_choice("None", Answer::Value(Value::Null))
            .with_choice("Create", Answer::Create);
        assert_eq!(question_text(&question), "Owner (None / Create): ");
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("", true), Some(true));
        assert_eq!(parse_yes_no(" No ", true), Some(false));
        assert_eq!(parse_yes_no("yes", false), Some(true));
        assert_eq!(parse_yes_no("maybe", true), None);
    }
}
