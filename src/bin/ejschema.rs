//! ejschema CLI
//!
//! Validate JSON documents against their extended schemas, and manage
//! schema location maps.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ejschema::{
    ExtValidator, SchemaLocations, SchemaResolver, ValidateOptions, ViolationKind,
    DEFAULT_TAG_PREFIX,
};

// Exit codes
const INVALID: u8 = 1; // one or more input documents are invalid
const BADSCHEMA: u8 = 2; // problem with one or more schemas (including missing)
const BADINPUTS: u8 = 3; // bad inputs provided (including files not found)

#[derive(Parser)]
#[command(name = "ejschema")]
#[command(about = "Validate JSON documents against extended JSON Schemas")]
#[command(version)]
struct Cli {
    /// Provide additional progress messages (useful for troubleshooting)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more JSON documents against their schemas
    Validate {
        /// Files to validate
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// URI of the schema to assume for the document as a whole
        /// (overriding the document's own declaration)
        #[arg(long, short = 'S', value_name = "URI")]
        doc_schema: Option<String>,

        /// Either a directory containing cached schemas or a schema
        /// location file
        #[arg(long, short = 'L', value_name = "DIR_OR_FILE")]
        schema_location: Option<PathBuf>,

        /// Ignore any extension declarations when validating
        #[arg(long, short = 'g')]
        ignore_extensions: bool,

        /// Fail if an extension schema cannot be loaded (otherwise,
        /// unresolvable extensions are reported as warnings)
        #[arg(long, short = 'C')]
        strict: bool,

        /// Never fetch schemas over the network
        #[arg(long)]
        no_network: bool,

        /// Use a MongoDB-safe convention for the special validation
        /// properties, starting them with _ instead of $
        #[arg(long, short = 'M', conflicts_with = "tag_prefix")]
        mongodb_safe: bool,

        /// Expect the special validation properties to start with this
        /// prefix
        #[arg(long, value_name = "PRE", default_value = DEFAULT_TAG_PREFIX)]
        tag_prefix: String,

        /// Output one JSON result object per file (for automation)
        #[arg(long)]
        json: bool,

        /// Suppress messages explaining why documents are invalid
        #[arg(long, short)]
        quiet: bool,

        /// Suppress all output; the exit code indicates the result
        #[arg(long, short)]
        silent: bool,
    },

    /// Scan a directory for schema files and emit a location map
    Locations {
        /// Directory to scan
        dir: PathBuf,

        /// Write the map to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Record paths as scanned instead of directory-relative
        #[arg(long)]
        absolute: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("ejschema=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate {
            files,
            doc_schema,
            schema_location,
            ignore_extensions,
            strict,
            no_network,
            mongodb_safe,
            tag_prefix,
            json,
            quiet,
            silent,
        } => run_validate(ValidateArgs {
            files,
            doc_schema,
            schema_location,
            ignore_extensions,
            strict,
            no_network,
            mongodb_safe,
            tag_prefix,
            json_output: json,
            quiet,
            silent,
        }),

        Commands::Locations {
            dir,
            output,
            absolute,
        } => run_locations(&dir, output, absolute),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct ValidateArgs {
    files: Vec<PathBuf>,
    doc_schema: Option<String>,
    schema_location: Option<PathBuf>,
    ignore_extensions: bool,
    strict: bool,
    no_network: bool,
    mongodb_safe: bool,
    tag_prefix: String,
    json_output: bool,
    quiet: bool,
    silent: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let resolver = match &args.schema_location {
        Some(path) if path.is_dir() => SchemaResolver::from_directory(path),
        Some(path) => SchemaLocations::from_file(path).map(SchemaResolver::with_locations),
        None => Ok(SchemaResolver::new()),
    }
    .map_err(|e| {
        report_error(args.json_output, &e.to_string());
        e.exit_code() as u8
    })?
    .network(!args.no_network);

    let validator = ExtValidator::new(resolver);

    let prefix = if args.mongodb_safe {
        "_".to_string()
    } else {
        args.tag_prefix.clone()
    };
    let mut options = ValidateOptions::new()
        .ignore_extensions(args.ignore_extensions)
        .strict(args.strict)
        .tag_prefix(prefix);
    if let Some(uri) = &args.doc_schema {
        options = options.schema_uri(uri.as_str());
    }

    let mut any_invalid = false;
    let mut bad_schema = false;
    let mut bad_input = false;

    for file in &args.files {
        let name = file.display().to_string();
        match validator.validate_file(file, &options) {
            Ok(report) => {
                let passed = report.passed(args.strict);

                if args.json_output {
                    let result = serde_json::json!({
                        "file": name,
                        "valid": passed,
                        "violations": report.violations(),
                    });
                    println!("{result}");
                } else if passed {
                    if !args.quiet {
                        for violation in &report {
                            eprintln!("Warning: {violation}");
                        }
                    }
                    if !args.silent {
                        println!("{name}: valid!");
                    }
                } else {
                    if !args.quiet {
                        eprintln!("{name}:");
                        for violation in &report {
                            eprintln!("  {violation}");
                        }
                    }
                    if !args.silent {
                        println!("{name}: not valid.");
                    }
                }

                if report
                    .iter()
                    .any(|v| v.kind == ViolationKind::Structural)
                {
                    any_invalid = true;
                }
                if args.strict
                    && report
                        .iter()
                        .any(|v| v.kind == ViolationKind::SchemaUnavailable)
                {
                    bad_schema = true;
                }
            }
            Err(e) => {
                if args.json_output {
                    let result = serde_json::json!({
                        "file": name,
                        "valid": false,
                        "error": e.to_string(),
                    });
                    println!("{result}");
                } else if !args.quiet {
                    eprintln!("{name}: {e}");
                }
                if e.exit_code() == i32::from(BADSCHEMA) {
                    bad_schema = true;
                } else {
                    bad_input = true;
                }
            }
        }
    }

    if bad_schema {
        Err(BADSCHEMA)
    } else if any_invalid {
        Err(INVALID)
    } else if bad_input {
        Err(BADINPUTS)
    } else {
        Ok(())
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        let result = serde_json::json!({ "valid": false, "error": msg });
        println!("{result}");
    } else {
        eprintln!("Error: {msg}");
    }
}

fn run_locations(dir: &PathBuf, output: Option<PathBuf>, absolute: bool) -> Result<(), u8> {
    let locations = SchemaLocations::scan(dir).map_err(|e| {
        eprintln!("Error: {e}");
        e.exit_code() as u8
    })?;

    let relative_to = if absolute { None } else { Some(dir.as_path()) };

    match output {
        Some(path) => locations.save(&path, relative_to).map_err(|e| {
            eprintln!("Error writing {}: {}", path.display(), e);
            BADINPUTS
        })?,
        None => {
            let json = locations.to_json(relative_to);
            println!(
                "{}",
                serde_json::to_string_pretty(&json).expect("location map serializes")
            );
        }
    }

    Ok(())
}
