//! Command execution.

use crate::config::Command;
use crate::error::CliError;
use crate::formatter::{create_formatter, Formatter, OutputFormat};
use modelry_core::translate::capitalize;
use modelry_core::{Criteria, Engine, EntityDef, FilterValue, Instance, ScalarType, Value};
use std::io::Write;
use tracing::debug;

/// Split `--attr=value` arguments into pairs.
pub fn parse_pairs(args: &[String]) -> Result<Vec<(String, String)>, CliError> {
    args.iter()
        .map(|arg| {
            arg.strip_prefix("--")
                .and_then(|pair| pair.split_once('='))
                .filter(|(attr, _)| !attr.is_empty())
                .map(|(attr, value)| (attr.to_string(), value.to_string()))
                .ok_or_else(|| CliError::Argument(format!("expected --attribute=value, got \"{}\"", arg)))
        })
        .collect()
}

/// Remove the pair named `name`, returning its value.
fn take_pair(pairs: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    let idx = pairs.iter().position(|(attr, _)| attr == name)?;
    Some(pairs.remove(idx).1)
}

/// Build criteria from pairs.
///
/// `lo..hi` becomes an inclusive range on an int, float or date attribute when both bounds
/// parse as that type; anything else is matched literally, so `--name=Dr..Who` stays text.
pub fn criteria_from(entity: &EntityDef, pairs: &[(String, String)]) -> Criteria {
    pairs
        .iter()
        .map(|(attr, value)| {
            let filter = range_bounds(entity, attr, value)
                .map(|(low, high)| FilterValue::Range(low, high))
                .unwrap_or_else(|| FilterValue::Value(Value::Text(value.clone())));
            (attr.clone(), filter)
        })
        .collect()
}

fn range_bounds(entity: &EntityDef, attr: &str, value: &str) -> Option<(Value, Value)> {
    let field = entity.get_field(attr)?;
    if !matches!(field.scalar_type, ScalarType::Int | ScalarType::Float | ScalarType::Date) {
        return None;
    }
    let (low, high) = value.split_once("..")?;
    let bound = |text: &str| Value::Text(text.to_string()).coerce(attr, field.scalar_type).ok();
    Some((bound(low)?, bound(high)?))
}

/// Runs commands against an engine, writing results to a sink.
pub struct Runner {
    engine: Engine,
    format: Option<OutputFormat>,
}

impl Runner {
    /// Create a runner. Without a forced format each model picks plain or table output.
    pub fn new(engine: Engine, format: Option<OutputFormat>) -> Self {
        Self { engine, format }
    }

    /// The engine commands run against.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Execute one command.
    pub fn execute(&self, command: &Command, out: &mut dyn Write) -> Result<(), CliError> {
        debug!(?command, "executing command");
        match command {
            Command::List { model, columns, filters } => self.list(model, columns.clone(), filters, out),
            Command::Create { model, filters } => self.create(model, filters, out),
            Command::Edit { model, set, filters } => self.edit(model, set.clone(), filters, out),
            Command::Delete { model, filters } => self.delete(model, filters, out),
        }
    }

    fn formatter(&self) -> Box<dyn Formatter> {
        create_formatter(self.format.unwrap_or(OutputFormat::Plain))
    }

    fn list(
        &self,
        model: &str,
        columns: Option<Vec<String>>,
        filters: &[String],
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let mut pairs = parse_pairs(filters)?;
        let columns = match take_pair(&mut pairs, "columns") {
            Some(list) => Some(list.split(',').map(|c| c.trim().to_string()).collect::<Vec<_>>()),
            None => columns,
        };

        let def = self.engine.get_model(model)?;
        let instances = if pairs.is_empty() {
            self.engine.all(&def.name)?.to_vec()
        } else {
            self.engine.filter(&def.name, &criteria_from(&def, &pairs))?.fetch()?
        };

        let format = self.format.unwrap_or(if def.presentation.print_as_table || columns.is_some() {
            OutputFormat::Table
        } else {
            OutputFormat::Plain
        });
        let formatter = create_formatter(format);

        let output = if format == OutputFormat::Plain && columns.is_none() {
            let lines = instances
                .iter()
                .map(|instance| self.engine.render(instance, None))
                .collect::<modelry_core::Result<Vec<_>>>()?;
            formatter.format_lines(&lines)
        } else {
            let table = self.engine.tabulate(&def.name, &instances, columns.as_deref())?;
            formatter.format_table(&table)
        };
        if !output.is_empty() {
            writeln!(out, "{}", output)?;
        }
        Ok(())
    }

    fn create(&self, model: &str, filters: &[String], out: &mut dyn Write) -> Result<(), CliError> {
        let pairs = parse_pairs(filters)?;
        let attrs: Vec<(&str, Value)> = pairs
            .iter()
            .map(|(attr, value)| (attr.as_str(), Value::Text(value.clone())))
            .collect();

        let mut instance = self.engine.create(model, true, &attrs)?;
        self.engine.save(&mut instance, true)?;
        let rendered = self.engine.render(&instance, None)?;
        writeln!(out, "{}", self.formatter().format_message(&rendered))?;
        Ok(())
    }

    fn edit(
        &self,
        model: &str,
        set: Option<String>,
        filters: &[String],
        out: &mut dyn Write,
    ) -> Result<(), CliError> {
        let mut pairs = parse_pairs(filters)?;
        let set = take_pair(&mut pairs, "set").or(set);

        let mut instances = self.matching(model, &pairs)?;
        if instances.is_empty() {
            return self.nothing_to("edit", out);
        }
        for instance in &mut instances {
            if !self.confirm("edit", instance)? {
                continue;
            }
            self.engine.edit(instance, set.as_deref())?;
            let rendered = self.engine.render(instance, None)?;
            writeln!(out, "{}", self.formatter().format_message(&rendered))?;
        }
        Ok(())
    }

    fn delete(&self, model: &str, filters: &[String], out: &mut dyn Write) -> Result<(), CliError> {
        let pairs = parse_pairs(filters)?;
        let instances = self.matching(model, &pairs)?;
        if instances.is_empty() {
            return self.nothing_to("delete", out);
        }
        for instance in &instances {
            if self.confirm("delete", instance)? {
                self.engine
                    .delete(instance.entity_name(), Some(instance), true, &Criteria::new())?;
            }
        }
        Ok(())
    }

    fn matching(&self, model: &str, pairs: &[(String, String)]) -> Result<Vec<Instance>, CliError> {
        let def = self.engine.get_model(model)?;
        Ok(self.engine.filter(&def.name, &criteria_from(&def, pairs))?.fetch()?)
    }

    fn confirm(&self, action: &str, instance: &Instance) -> Result<bool, CliError> {
        let label = format!(
            "{} {}",
            capitalize(&self.engine.translate(action)),
            self.engine.render(instance, None)?
        );
        Ok(self.engine.prompt().confirm(&label, true)?)
    }

    fn nothing_to(&self, action: &str, out: &mut dyn Write) -> Result<(), CliError> {
        let message = format!("{} {}", self.engine.translate("Nothing to"), self.engine.translate(action));
        writeln!(out, "{}", self.formatter().format_message(&message))?;
        Ok(())
    }
}
