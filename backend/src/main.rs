//! statsflow CLI - extract normalized usage statistics from report grids
//!
//! # Main Commands
//!
//! ```bash
//! statsflow run report.csv --rules rules.json     # Apply a rule document
//! statsflow propose report.csv --description d.json --platform JSTOR
//! statsflow registry list                         # Manage stored definitions
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! statsflow check rules.json          # Structural validation only
//! statsflow grid report.csv           # Show the grid with coordinates
//! statsflow validate table.json       # Validate rows against the row schema
//! statsflow grammar                   # Rule document reference
//! statsflow example-definition        # A small valid rule document
//! ```

use clap::{Parser, Subcommand};
use serde_json::Value;
use statsflow::logs::LOG_BROADCASTER;
use statsflow::{
    example_definition, grammar_description, load_path, validate_row, DataDescriptionData,
    DefinitionOrigin, DefinitionRegistry, HttpProposer, NormalizedTable, ParserDefinition, Pipeline,
    PipelineOptions, Proposer, RepairOptions,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "statsflow")]
#[command(about = "Extract normalized usage statistics from spreadsheet reports", long_about = None)]
struct Cli {
    /// Don't echo progress logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a rule document to a grid file
    Run {
        /// Input CSV file
        grid: PathBuf,

        /// Rule document (JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,

        /// Skip row validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Check a rule document against the grammar
    Check {
        /// Rule document (JSON)
        rules: PathBuf,
    },

    /// Show a grid with row and column indices
    Grid {
        /// Input CSV file
        input: PathBuf,

        /// Rows to show
        #[arg(long, default_value = "30")]
        rows: usize,
    },

    /// Stored definitions first, then a proposed rule document
    Propose {
        /// Input CSV file
        grid: PathBuf,

        /// Data description (JSON)
        #[arg(short, long)]
        description: Option<PathBuf>,

        /// Platform name for stored definition lookup
        #[arg(short, long)]
        platform: Option<String>,

        /// Free-text note for the proposer
        #[arg(short, long)]
        note: Option<String>,

        /// Proposals before giving up
        #[arg(long, default_value = "5")]
        max_attempts: u32,

        /// Rows of the grid shown to the proposer
        #[arg(long, default_value = "30")]
        preview_rows: usize,

        /// Save the definition used to this file
        #[arg(long)]
        save_rules: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,

        /// Don't try stored definitions
        #[arg(long)]
        no_cache: bool,

        /// Don't store a newly proposed definition
        #[arg(long)]
        no_save: bool,

        /// Skip row validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Validate normalized rows (a table or an array of rows) against the row schema
    Validate {
        /// Input JSON file
        input: PathBuf,
    },

    /// Show the rule document grammar
    Grammar,

    /// Show an example rule document
    ExampleDefinition,

    /// Manage stored definitions
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List all stored definitions
    List,

    /// Show a stored definition
    Show {
        /// Definition ID
        id: String,
    },

    /// Import a rule document
    Import {
        /// Rule document (JSON)
        file: PathBuf,

        /// Platforms it serves
        #[arg(short, long)]
        platform: Vec<String>,
    },

    /// Delete a stored definition
    Delete {
        /// Definition ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.quiet {
        LOG_BROADCASTER.set_echo(false);
    }

    let result = match cli.command {
        Commands::Run {
            grid,
            rules,
            output,
            json,
            no_validate,
        } => cmd_run(&grid, &rules, output.as_deref(), json, no_validate).await,

        Commands::Check { rules } => cmd_check(&rules),

        Commands::Grid { input, rows } => cmd_grid(&input, rows),

        Commands::Propose {
            grid,
            description,
            platform,
            note,
            max_attempts,
            preview_rows,
            save_rules,
            output,
            json,
            no_cache,
            no_save,
            no_validate,
        } => {
            let options = PipelineOptions {
                rules_path: None,
                platform,
                user_note: note,
                skip_validation: no_validate,
                no_cache,
                no_save,
            };
            let repair = RepairOptions {
                max_attempts,
                preview_rows,
                ..RepairOptions::default()
            };
            cmd_propose(
                &grid,
                description.as_deref(),
                &options,
                repair,
                save_rules.as_deref(),
                output.as_deref(),
                json,
            )
            .await
        }

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Grammar => {
            println!("{}", grammar_description());
            Ok(())
        }

        Commands::ExampleDefinition => cmd_example_definition(),

        Commands::Registry { action } => cmd_registry(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(
    grid_path: &Path,
    rules: &Path,
    output: Option<&Path>,
    json: bool,
    no_validate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", grid_path.display());

    let mut registry = DefinitionRegistry::from_env();
    let pipeline = Pipeline::new(None, RepairOptions::default(), &registry)?;
    let options = PipelineOptions {
        rules_path: Some(rules.to_path_buf()),
        skip_validation: no_validate,
        ..PipelineOptions::default()
    };
    let report = pipeline.extract_file(grid_path, None, &mut registry, &options).await?;
    eprintln!(
        "   Rules: {} ({} area(s))",
        report.definition.parser_name,
        report.definition.areas.len()
    );
    eprintln!("\n⚙️  Extracted: {} records", report.table.len());
    if report.invalid_rows() > 0 {
        eprintln!("   ⚠️  {} invalid row(s)", report.invalid_rows());
    }

    write_table(&report.table, output, json)?;
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_check(rules: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Checking: {}", rules.display());

    let definition = ParserDefinition::from_json(&fs::read_to_string(rules)?)?;
    println!("✅ '{}' is a valid rule document", definition.parser_name);
    println!("   Areas: {}", definition.areas.len());
    if !definition.platforms.is_empty() {
        println!("   Platforms: {}", definition.platforms.join(", "));
    }
    if let Some(metrics) = &definition.available_metrics {
        println!("   Available metrics: {}", metrics.join(", "));
    }
    Ok(())
}

fn cmd_grid(input: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let grid = load_path(input)?;
    eprintln!("📄 {}: {} rows x {} columns\n", input.display(), grid.height(), grid.width());
    print!("{}", grid.preview(rows));
    Ok(())
}

async fn cmd_propose(
    grid_path: &Path,
    description: Option<&Path>,
    options: &PipelineOptions,
    repair: RepairOptions,
    save_rules: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", grid_path.display());

    let description: Option<DataDescriptionData> = match description {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };

    // Only needed when no stored definition works
    let proposer: Option<Arc<dyn Proposer>> = match HttpProposer::from_env() {
        Ok(proposer) => Some(Arc::new(proposer) as Arc<dyn Proposer>),
        Err(e) => {
            eprintln!("   ⚠️  {}", e);
            None
        }
    };

    let mut registry = DefinitionRegistry::from_env();
    let pipeline = Pipeline::new(proposer, repair, &registry)?;
    let report = pipeline
        .extract_file(grid_path, description.as_ref(), &mut registry, options)
        .await?;

    match &report.origin {
        DefinitionOrigin::Provided { path } => eprintln!("   Rules: {}", path.display()),
        DefinitionOrigin::Registry { id } => eprintln!("   Stored definition: {}", id),
        DefinitionOrigin::Proposed { saved_as } => {
            eprintln!("   Proposed by the repair loop");
            if let Some(id) = saved_as {
                eprintln!("   Saved as: {}", id);
            }
        }
    }
    eprintln!("\n⚙️  Extracted: {} records", report.table.len());

    if let Some(path) = save_rules {
        fs::write(path, report.definition.to_json()?)?;
        eprintln!("   💾 Rules saved to: {}", path.display());
    }

    write_table(&report.table, output, json)?;
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content: Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    let rows = match content {
        Value::Array(rows) => rows,
        Value::Object(mut table) => match table.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => return Err("expected an array of rows or a table with a 'rows' array".into()),
        },
        _ => return Err("expected an array of rows or a table with a 'rows' array".into()),
    };

    let mut valid = 0;
    let mut invalid = 0;
    for (i, row) in rows.iter().enumerate() {
        match validate_row(row) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Row {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);
    if invalid > 0 {
        return Err(format!("{} invalid row(s)", invalid).into());
    }
    Ok(())
}

fn cmd_example_definition() -> Result<(), Box<dyn std::error::Error>> {
    let definition = ParserDefinition::from_value(&example_definition())?;
    println!("{}", definition.to_json()?);
    Ok(())
}

fn cmd_registry(action: RegistryAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = DefinitionRegistry::from_env();

    match action {
        RegistryAction::List => {
            let definitions = registry.list();
            if definitions.is_empty() {
                eprintln!("📋 No definitions stored yet in {}.", registry.dir().display());
                eprintln!("   Use 'statsflow registry import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored definitions ({}):\n", definitions.len());
            for d in definitions {
                println!("  📄 {} ({})", d.name, d.id);
                if !d.platforms.is_empty() {
                    println!("     Platforms: {}", d.platforms.join(", "));
                }
                println!("     Success rate: {:.0}%", d.success_rate * 100.0);
                println!("     Uses: {}", d.use_count);
                if let Some(last) = &d.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        RegistryAction::Show { id } => {
            let d = registry.get(&id)?;
            println!("📄 Definition: {} ({})\n", d.name, d.id);
            println!("Platforms: {}", d.platforms.join(", "));
            println!("Created: {}", d.created_at);
            println!("Success rate: {:.0}%", d.success_rate * 100.0);
            println!("Uses: {}", d.use_count);
            println!("\nRule document:");
            println!("{}", d.definition.to_json()?);
        }

        RegistryAction::Import { file, platform } => {
            eprintln!("📥 Importing rule document from: {}", file.display());
            let id = registry.import(&file, platform)?;
            eprintln!("✅ Definition saved with ID: {}", id);
        }

        RegistryAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Definition deleted: {}", id);
        }
    }

    Ok(())
}

fn write_table(table: &NormalizedTable, path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let content = if json {
        format!("{}\n", serde_json::to_string_pretty(table)?)
    } else {
        table.to_csv()?
    };
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
