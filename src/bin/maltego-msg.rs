//! maltego-msg CLI - inspect, render and run transform messages
//!
//! XML goes to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::prelude::*;

use maltego_message::config::CatalogueConfig;
use maltego_message::entity::registry::{self, EntityRegistry};
use maltego_message::external::ExternalCommand;
use maltego_message::message::exception::ExceptionMessage;
use maltego_message::message::MaltegoMessage;
use maltego_message::xml::XmlModel;

const CATALOGUE_ENV: &str = "MALTEGO_ENTITY_CATALOGUE";

#[derive(Parser)]
#[command(name = "maltego-msg")]
#[command(version, about = "Inspect, render and run link-analysis transform messages", long_about = None)]
struct Cli {
    /// YAML entity catalogue to register on top of the built-ins
    /// (defaults to $MALTEGO_ENTITY_CATALOGUE)
    #[arg(long, global = true)]
    catalogue: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a message and render it again
    Render {
        /// Message file (stdin when omitted)
        input: Option<PathBuf>,

        /// Indent the output
        #[arg(short, long)]
        pretty: bool,

        /// Sort attributes and children for comparison
        #[arg(short, long, conflicts_with = "pretty")]
        canonical: bool,
    },

    /// Decode the entities of a request and print them as JSON
    Inspect {
        /// Request file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// List registered entity types
    Types {
        /// Also list the fields of each type
        #[arg(short, long)]
        fields: bool,
    },

    /// Validate an entity catalogue file
    CheckCatalogue {
        /// Path to the catalogue YAML
        path: PathBuf,
    },

    /// Run an external transform program on a request
    Run {
        /// Transform program
        program: String,

        /// Request file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Interpreter to run the program with (perl, ruby, java, ...)
        #[arg(long)]
        interpreter: Option<String>,

        /// Library directory handed to the interpreter
        #[arg(long)]
        lib_dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let catalogue = cli
        .catalogue
        .or_else(|| env::var_os(CATALOGUE_ENV).map(PathBuf::from));

    let result = match cli.command {
        Commands::Render { input, pretty, canonical } => render(input, pretty, canonical),
        Commands::CheckCatalogue { path } => check_catalogue(&path),
        command => install_registry(catalogue.as_deref()).and_then(|_| match command {
            Commands::Inspect { input } => inspect(input),
            Commands::Types { fields } => types(fields),
            Commands::Run { program, input, interpreter, lib_dir } => run(program, input, interpreter, lib_dir),
            Commands::Render { .. } | Commands::CheckCatalogue { .. } => Ok(()),
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Built-ins plus the optional catalogue, installed as the process-wide
/// registry.
fn install_registry(catalogue: Option<&Path>) -> Result<(), String> {
    let mut entities = EntityRegistry::with_builtins();
    if let Some(path) = catalogue {
        CatalogueConfig::load_from_file(path)
            .and_then(|config| config.apply(&mut entities))
            .map_err(|e| e.to_string())?;
    }
    registry::install(entities).map_err(|_| "entity registry is already installed".to_string())
}

fn read_input(input: Option<PathBuf>) -> Result<String, String> {
    match input {
        Some(path) => fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(buffer)
        }
    }
}

fn render(input: Option<PathBuf>, pretty: bool, canonical: bool) -> Result<(), String> {
    let message = MaltegoMessage::from_xml(&read_input(input)?).map_err(|e| e.to_string())?;
    let output = if canonical {
        message.render_canonical()
    } else if pretty {
        message.render_pretty()
    } else {
        message.render()
    };
    println!("{}", output.map_err(|e| e.to_string())?);
    Ok(())
}

fn inspect(input: Option<PathBuf>) -> Result<(), String> {
    let request = match MaltegoMessage::from_xml(&read_input(input)?).map_err(|e| e.to_string())? {
        MaltegoMessage::Request(request) => request,
        other => return Err(format!("expected a transform request, got {}", other.kind())),
    };

    let mut entities = Vec::with_capacity(request.entities.len());
    for element in &request.entities {
        let entity = registry::global().decode(element.clone()).map_err(|e| e.to_string())?;
        let fields = entity.to_dict().map_err(|e| e.to_string())?;
        entities.push(serde_json::json!({
            "type": entity.type_name(),
            "value": entity.value(),
            "weight": entity.weight(),
            "fields": fields,
        }));
    }

    let json = serde_json::json!({
        "entities": entities,
        "limits": { "soft": request.limits.soft, "hard": request.limits.hard },
    });
    println!("{}", serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?);
    Ok(())
}

fn types(show_fields: bool) -> Result<(), String> {
    for variant in registry::global().variants() {
        println!("{} (alias {})", variant.type_name(), variant.alias());
        if show_fields {
            for (wire_name, property) in variant.field_table() {
                if let Some(descriptor) = variant.descriptor(property) {
                    let pivot = if descriptor.is_value() { " [value]" } else { "" };
                    println!("    {} -> {} : {}{}", wire_name, property, descriptor.kind_name(), pivot);
                }
            }
        }
    }
    Ok(())
}

fn check_catalogue(path: &Path) -> Result<(), String> {
    let config = CatalogueConfig::load_from_file(path).map_err(|e| e.to_string())?;
    let mut entities = EntityRegistry::with_builtins();
    let registered = config.apply(&mut entities).map_err(|e| e.to_string())?;
    for type_name in &registered {
        println!("  ✓ {}", type_name);
    }
    println!("{} entity types declared in {}", registered.len(), path.display());
    Ok(())
}

fn run(
    program: String,
    input: Option<PathBuf>,
    interpreter: Option<String>,
    lib_dir: Option<PathBuf>,
) -> Result<(), String> {
    let request = match MaltegoMessage::from_xml(&read_input(input)?).map_err(|e| e.to_string())? {
        MaltegoMessage::Request(request) => request,
        other => return Err(format!("expected a transform request, got {}", other.kind())),
    };

    let mut command = ExternalCommand::new(program).map_err(|e| e.to_string())?;
    if let Some(interpreter) = interpreter {
        command = command.interpreter(interpreter, lib_dir);
    }

    let message = command.run_message(&request).unwrap_or_else(|err| {
        tracing::warn!("Transform failed: {}", err);
        let mut exception = ExceptionMessage::new();
        exception.append(err.to_exception());
        MaltegoMessage::Exception(exception)
    });
    println!("{}", message.render().map_err(|e| e.to_string())?);
    Ok(())
}
