//! Command-line configuration.

use crate::formatter::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default SQLite database path.
pub const DEFAULT_DATABASE: &str = "modelry.db";

/// Default schema file.
pub const DEFAULT_SCHEMA: &str = "schema.json";

/// Default directory holding `<locale>.json` catalogs.
pub const DEFAULT_LOCALE_DIR: &str = "locale";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// SQLite database path, or `:memory:`.
    pub database: String,

    /// JSON schema file declaring the entities.
    pub schema: PathBuf,

    /// Locale for labels and messages. None keeps keys untranslated.
    pub locale: Option<String>,

    /// Directory holding translation catalogs.
    pub locale_dir: PathBuf,

    /// Forced output format. None lets each model decide.
    pub format: Option<OutputFormat>,
}

impl CliConfig {
    /// Create a configuration for the given database and schema.
    pub fn new(database: impl Into<String>, schema: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            locale: None,
            locale_dir: PathBuf::from(DEFAULT_LOCALE_DIR),
            format: None,
        }
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set the catalog directory.
    pub fn with_locale_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.locale_dir = dir.into();
        self
    }

    /// Force an output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE, DEFAULT_SCHEMA)
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "modelry")]
#[command(version, about = "CRUD for entities declared in a schema file", long_about = None)]
pub struct Args {
    /// SQLite database path (`:memory:` for a throwaway database).
    #[arg(short, long, env = "DB_URL", default_value = DEFAULT_DATABASE, global = true)]
    pub database: String,

    /// JSON schema file.
    #[arg(short, long, env = "MODELRY_SCHEMA", default_value = DEFAULT_SCHEMA, global = true)]
    pub schema: PathBuf,

    /// Locale for labels and messages.
    #[arg(long, env = "MODELRY_LOCALE", global = true)]
    pub locale: Option<String>,

    /// Directory holding `<locale>.json` catalogs.
    #[arg(long, default_value = DEFAULT_LOCALE_DIR, global = true)]
    pub locale_dir: PathBuf,

    /// Output format.
    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Command,
}

/// Entity commands. Filters are `--attr=value` pairs.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print matching instances.
    List {
        /// Model name.
        model: String,

        /// Columns for tabular output.
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Filters (`--attr=value`, `--attr=lo..hi`).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filters: Vec<String>,
    },

    /// Create an instance, asking for unset attributes.
    Create {
        /// Model name.
        model: String,

        /// Initial attributes (`--attr=value`).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filters: Vec<String>,
    },

    /// Edit matching instances.
    Edit {
        /// Model name.
        model: String,

        /// Assignments (`attr=value,...`) applied instead of asking.
        #[arg(long)]
        set: Option<String>,

        /// Filters (`--attr=value`).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filters: Vec<String>,
    },

    /// Delete matching instances.
    Delete {
        /// Model name.
        model: String,

        /// Filters (`--attr=value`).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filters: Vec<String>,
    },
}

impl Args {
    /// Split arguments into client configuration and the command to run.
    pub fn into_config(self) -> (CliConfig, Command) {
        let config = CliConfig {
            database: self.database,
            schema: self.schema,
            locale: self.locale.filter(|l| !l.is_empty()),
            locale_dir: self.locale_dir,
            format: self.format,
        };
        (config, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(config.schema, PathBuf::from(DEFAULT_SCHEMA));
        assert!(config.locale.is_none());
        assert!(config.format.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = CliConfig::new(":memory:", "pets.json")
            .with_locale("pt_BR")
            .with_locale_dir("/usr/share/pets")
            .with_format(OutputFormat::Json);

        assert_eq!(config.locale.as_deref(), Some("pt_BR"));
        assert_eq!(config.locale_dir, PathBuf::from("/usr/share/pets"));
        assert_eq!(config.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_parse_list_with_filters() {
        let args = Args::try_parse_from([
            "modelry",
            "--database",
            ":memory:",
            "list",
            "Pet",
            "--columns=name,owner",
            "--name=R%",
        ])
        .unwrap();
        let (config, command) = args.into_config();

        assert_eq!(config.database, ":memory:");
        assert_eq!(
            command,
            Command::List {
                model: "Pet".into(),
                columns: Some(vec!["name".into(), "owner".into()]),
                filters: vec!["--name=R%".into()],
            }
        );
    }

    #[test]
    fn test_parse_edit_with_set() {
        let args = Args::try_parse_from(["modelry", "edit", "Person", "--set", "age=3", "--name=Ana"]).unwrap();
        let (_, command) = args.into_config();

        assert_eq!(
            command,
            Command::Edit {
                model: "Person".into(),
                set: Some("age=3".into()),
                filters: vec!["--name=Ana".into()],
            }
        );
    }
}
