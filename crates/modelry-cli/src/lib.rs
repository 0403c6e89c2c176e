//! Command-line CRUD over entities declared in a JSON schema file.
//!
//! The binary wires a [`modelry_core::Engine`] to a SQLite database, a terminal prompt and an
//! output formatter, then runs one of `list`, `create`, `edit` or `delete`.

pub mod commands;
pub mod completer;
pub mod config;
pub mod error;
pub mod formatter;
pub mod prompt;
pub mod schema;

pub use commands::Runner;
pub use config::{Args, CliConfig, Command};
pub use error::CliError;
pub use formatter::OutputFormat;

use modelry_core::{CatalogTranslator, Engine, Prompt, SqliteStore};
use prompt::TerminalPrompt;
use std::sync::Arc;
use tracing::{info, warn};

/// Build an engine for the configured schema and database.
///
/// A missing catalog for the requested locale is logged and labels stay untranslated.
pub fn build_engine(config: &CliConfig, prompt: impl Prompt + 'static) -> Result<Engine, CliError> {
    let registry = Arc::new(schema::load_registry(&config.schema)?);
    let store = SqliteStore::open(&config.database)?;
    store.create_schema(&registry)?;
    info!(database = %config.database, entities = registry.len(), "database ready");

    let engine = Engine::new(registry, store)?.with_prompt(prompt);
    let engine = match &config.locale {
        Some(locale) => match CatalogTranslator::load(&config.locale_dir, locale) {
            Ok(catalog) => engine.with_translator(catalog),
            Err(e) => {
                warn!(locale = %locale, error = %e, "translations unavailable");
                engine
            }
        },
        None => engine,
    };
    Ok(engine)
}

/// Run parsed arguments on the terminal.
pub fn run(args: Args) -> Result<(), CliError> {
    let (config, command) = args.into_config();
    let engine = build_engine(&config, TerminalPrompt::new()?)?;
    let runner = Runner::new(engine, config.format);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    runner.execute(&command, &mut out)
}
