//! `adatypes` command-line tool.
//!
//! Loads a TOML field definition schema and shows what the engine makes
//! of it.
//!
//! ```bash
//! # Dump the field definition table
//! adatypes types employees.toml
//!
//! # Format buffer for a query
//! adatypes format-buffer employees.toml --fields "AA,AB,PG[1]"
//!
//! # Parse a record buffer given in hex
//! adatypes parse employees.toml "0100000041" --fields "U4,GC"
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info};

use open_mainframe_adatypes::{
    format_bytes, BufferHelper, Definition, Endian, EngineConfig, FdtSchema, RequestMode,
    SecondCall,
};

#[derive(Parser, Debug)]
#[command(name = "adatypes")]
#[command(author, version, about = "ADABAS field definition and buffer tool", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dump the field definition table of a schema
    Types {
        /// Schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Dump the tree restricted to these fields
        #[arg(long, value_name = "QUERY")]
        fields: Option<String>,
    },

    /// Print the format buffer and record buffer size for a query
    FormatBuffer {
        /// Schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Field query, all fields when omitted
        #[arg(long, value_name = "QUERY")]
        fields: Option<String>,

        /// Generate the store format buffer
        #[arg(long)]
        store: bool,
    },

    /// Parse a record buffer and dump the values
    Parse {
        /// Schema file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Record buffer in hex
        #[arg(value_name = "HEX")]
        record: String,

        /// Field query, all fields when omitted
        #[arg(long, value_name = "QUERY")]
        fields: Option<String>,

        /// Print the values as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_vars();

    let filter = if cli.verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Types { schema, fields } => {
            let def = load(&schema, &config, fields.as_deref())?;
            print!("{}", def.dump_types(fields.is_some()));
            Ok(())
        }
        Commands::FormatBuffer {
            schema,
            fields,
            store,
        } => {
            let mut def = load(&schema, &config, fields.as_deref())?;
            let mode = if store {
                def.create_values(true)?;
                RequestMode::Store
            } else {
                RequestMode::Read
            };
            let option = def.buffer_option();
            let request = def.create_format_buffer(mode, &option)?;
            println!("{}", request.format_buffer);
            println!("record buffer length: {}", request.record_buffer_length);
            Ok(())
        }
        Commands::Parse {
            schema,
            record,
            fields,
            json,
        } => {
            let mut def = load(&schema, &config, fields.as_deref())?;
            let bytes = decode_hex(&record)?;
            println!("{}", format_bytes("record buffer", &bytes, 8, 16));
            let endian = if config.mainframe {
                Endian::Big
            } else {
                Endian::native()
            };
            let mut helper = BufferHelper::new(bytes, endian);
            let mut option = def.buffer_option();
            def.parse_buffer(&mut helper, &mut option)?;
            if json {
                let text = serde_json::to_string_pretty(&def.values_json()?).into_diagnostic()?;
                println!("{text}");
            } else {
                print!("{}", def.dump_values());
            }
            if def.need_second_call() == SecondCall::ReadSecond {
                let second = def.create_format_buffer(RequestMode::SecondCall, &option.with_second_call(1))?;
                println!("second call needed: {}", second.format_buffer);
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", EngineConfig::generate_default());
            Ok(())
        }
    }
}

/// Load `schema` and apply the optional field query.
fn load(schema: &Path, config: &EngineConfig, fields: Option<&str>) -> Result<Definition> {
    let mut def = FdtSchema::load(schema)?.to_definition_with(config.clone())?;
    info!(schema = %schema.display(), fields = def.file_tree().len() - 1, "schema loaded");
    if let Some(query) = fields {
        def.restrict_to_fields(query)?;
        debug!(query, "restricted");
    }
    Ok(def)
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        miette::bail!("record buffer must be an even number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).into_diagnostic())
        .collect()
}
