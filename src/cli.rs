use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Diff keyed table snapshots and load rows into SQL tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report added, modified and retired rows between two keyed CSV snapshots
    Diff(DiffArgs),
    /// Split a CSV file into rows with unique and duplicated key tuples
    Dups(DupsArgs),
    /// Validate CSV rows against a table's schema and insert them in one transaction
    Insert(InsertArgs),
    /// Print the insertable columns of a table or a CREATE TABLE statement
    Schema(SchemaArgs),
    /// Create a table from a YAML table definition
    Create(CreateArgs),
    /// Run a read-only query and print the result
    Query(QueryArgs),
}

/// Options shared by every command that reads CSV input.
#[derive(Debug, Args, Clone)]
pub struct CsvArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Earlier snapshot
    #[arg(long)]
    pub old: PathBuf,
    /// Later snapshot
    #[arg(long)]
    pub new: PathBuf,
    /// Key columns identifying a row (comma-separated or repeated)
    #[arg(short = 'k', long = "key", value_delimiter = ',', required = true)]
    pub keys: Vec<String>,
    /// Columns excluded from modification detection
    #[arg(long = "ignore", value_delimiter = ',')]
    pub ignore: Vec<String>,
    /// Infer integer and real columns instead of comparing raw text
    #[arg(long)]
    pub typed: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    #[command(flatten)]
    pub csv: CsvArgs,
}

#[derive(Debug, Args)]
pub struct DupsArgs {
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Key columns whose tuples must be unique
    #[arg(short = 'k', long = "key", value_delimiter = ',', required = true)]
    pub keys: Vec<String>,
    /// Write only the duplicated rows as CSV instead of a report
    #[arg(long = "duplicates-only")]
    pub duplicates_only: bool,
    #[command(flatten)]
    pub csv: CsvArgs,
}

#[derive(Debug, Args)]
pub struct InsertArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Target table
    #[arg(short = 't', long)]
    pub table: String,
    /// CSV file whose columns follow the table's schema order
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Insert values as read instead of casting them to the schema types
    #[arg(long = "no-cast")]
    pub no_cast: bool,
    #[command(flatten)]
    pub csv: CsvArgs,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// SQLite database file holding the table
    #[arg(long, requires = "table", conflicts_with = "statement")]
    pub db: Option<PathBuf>,
    #[arg(short = 't', long)]
    pub table: Option<String>,
    /// Parse this CREATE TABLE statement instead of reading a database
    #[arg(long, required_unless_present = "db")]
    pub statement: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long, required_unless_present = "dry_run")]
    pub db: Option<PathBuf>,
    /// YAML table definition
    #[arg(short = 'd', long)]
    pub definition: PathBuf,
    /// Print the generated statement without executing it
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(long)]
    pub db: PathBuf,
    /// SELECT statement to run
    #[arg(long)]
    pub sql: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_aliases_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn diff_keys_split_on_commas() {
        let cli = Cli::try_parse_from([
            "datautils", "diff", "--old", "a.csv", "--new", "b.csv", "-k", "id,region",
        ])
        .unwrap();
        let Commands::Diff(args) = cli.command else {
            panic!("expected diff command");
        };
        assert_eq!(args.keys, ["id", "region"]);
        assert_eq!(args.format, OutputFormat::Table);
    }
}
