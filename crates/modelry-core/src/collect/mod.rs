//! Interactive attribute collection.
//!
//! Builds the [`Question`] asked for one attribute. A scalar gets a typed free-form prompt
//! (or its static option list); a relationship gets a picker over the existing target
//! instances, bracketed by an optional "None" and a trailing "Create" entry.
//! [`Engine::ask_attribute`](crate::Engine::ask_attribute) asks it and writes the answer back.

mod prompt;

pub use prompt::{Answer, Choice, NoPrompt, Prompt, PromptType, Question, ScriptedPrompt};

use crate::catalog::{EntityDef, FieldDef, RelationDef};
use crate::error::Result;
use crate::instance::Instance;
use crate::translate::{capitalize, Translator};
use crate::value::Value;

/// Label shown for an attribute: translated, then capitalised.
pub fn attribute_label(translator: &dyn Translator, attribute: &str) -> String {
    capitalize(&translator.translate(attribute))
}

/// Question for a scalar attribute.
///
/// The default is `default` if given, else the instance's current value, else the field's
/// declared default.
pub fn scalar_question(
    entity: &EntityDef,
    field: &FieldDef,
    current: Option<&Value>,
    default: Option<Value>,
    translator: &dyn Translator,
) -> Result<Question> {
    let default = match default.or_else(|| current.filter(|v| !v.is_null()).cloned()) {
        Some(value) => Some(value),
        None => field.default_value()?,
    };

    let mut question = Question::new(
        &field.name,
        attribute_label(translator, &field.name),
        PromptType::Scalar(field.scalar_type),
    )
    .with_default(default);

    if let Some(options) = entity.presentation.attribute_options.get(&field.name) {
        for option in options {
            let value = option.value.to_value().coerce(&field.name, field.scalar_type)?;
            question = question.with_choice(&option.label, Answer::Value(value));
        }
    }
    Ok(question)
}

/// Question for a relationship attribute over `options` (label, instance) in order.
pub fn relation_question(
    entity: &EntityDef,
    relation: &RelationDef,
    options: Vec<(String, Instance)>,
    translator: &dyn Translator,
) -> Question {
    let mut question = Question::new(
        &relation.name,
        attribute_label(translator, &relation.name),
        PromptType::Entity(relation.target.clone()),
    )
    .with_auto_complete();

    if entity.relation_nullable(relation) {
        question = question.with_choice(capitalize(&translator.translate("none")), Answer::Value(Value::Null));
    }
    for (label, instance) in options {
        question = question.with_choice(label, Answer::Value(Value::Entity(Box::new(instance))));
    }
    question.with_choice(capitalize(&translator.translate("create")), Answer::Create)
}
