//! ID Card CLI
//!
//! Commands: options, validate, create, list, show, payload, delete
//! Outputs JSON to stdout
//! Returns 2 on validation failure, 1 on any other failure

use clap::{Parser, Subcommand};
use env_logger::Env;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use idcard_core::{
    derive_payload,
    record::{class_options, Allergy, BUS_ROUTES},
    CardConfig, CardPipeline, FileByteStore, PhotoIntake, PipelineError, RawStudentInput,
    TemplateVariant,
};

#[derive(Parser)]
#[command(name = "idcard-cli")]
#[command(about = "Student ID Card Generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the saved-cards roster
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Card configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List classes, bus routes, allergies and templates
    Options,

    /// Validate a student record without saving it
    Validate {
        /// JSON payload (student fields)
        #[arg(short, long)]
        payload: String,

        /// Photo file, overrides any photo in the payload
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Validate, save, and optionally export a card
    Create {
        /// JSON payload (student fields)
        #[arg(short, long)]
        payload: String,

        /// Photo file, overrides any photo in the payload
        #[arg(long)]
        photo: Option<PathBuf>,

        /// Template: blue or green
        #[arg(short, long, default_value = "blue")]
        template: TemplateVariant,

        /// Write the PNG into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List saved cards
    List,

    /// Show a saved card, optionally exporting it
    Show {
        #[arg(short, long)]
        position: usize,

        #[arg(short, long, default_value = "blue")]
        template: TemplateVariant,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the QR payload of a saved card
    Payload {
        #[arg(short, long)]
        position: usize,
    },

    /// Delete a saved card
    Delete {
        #[arg(short, long)]
        position: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env = Env::default().default_filter_or("warn");
    env_logger::Builder::from_env(env).init();

    let config = match &cli.config {
        Some(path) => match CardConfig::load(path) {
            Ok(c) => c,
            Err(e) => return fail(format!("Failed to load config: {e}")),
        },
        None => CardConfig::default(),
    };

    let store_dir = cli.store.clone().unwrap_or_else(default_store_dir);
    let intake = PhotoIntake::new(config.max_photo_bytes);
    let mut pipeline = CardPipeline::new(FileByteStore::new(store_dir), config);

    match cli.command {
        Commands::Options => {
            let allergies: Vec<_> = Allergy::ALL
                .iter()
                .map(|a| json!({ "id": a.code(), "label": a.label() }))
                .collect();
            let templates: Vec<_> = TemplateVariant::ALL
                .iter()
                .map(|t| json!({ "id": t.id(), "name": t.display_name() }))
                .collect();
            emit(&json!({
                "classes": class_options(),
                "busRoutes": BUS_ROUTES,
                "allergies": allergies,
                "templates": templates,
            }));
            ExitCode::SUCCESS
        }

        Commands::Validate { payload, photo } => {
            let input = match read_input(&payload, photo.as_deref(), &intake) {
                Ok(i) => i,
                Err(e) => return fail(e),
            };
            match pipeline.validate(&input) {
                Ok(record) => {
                    emit(&json!({ "valid": true, "qrPayload": derive_payload(&record) }));
                    ExitCode::SUCCESS
                }
                Err(errors) => {
                    emit(&json!({ "valid": false, "violations": errors.violations() }));
                    ExitCode::from(2)
                }
            }
        }

        Commands::Create { payload, photo, template, out } => {
            let input = match read_input(&payload, photo.as_deref(), &intake) {
                Ok(i) => i,
                Err(e) => return fail(e),
            };
            pipeline.set_template(template);
            let entry = match pipeline.submit(&input) {
                Ok(entry) => entry,
                Err(PipelineError::ValidationFailed(errors)) => {
                    emit(&json!({ "success": false, "violations": errors.violations() }));
                    return ExitCode::from(2);
                }
                Err(e) => return fail(e.to_string()),
            };
            let mut output = json!({ "success": true, "position": entry.position });
            if let Some(dir) = out {
                match download(&pipeline, &dir) {
                    Ok(card) => output["card"] = card,
                    Err(e) => return fail(e),
                }
            }
            emit(&output);
            ExitCode::SUCCESS
        }

        Commands::List => {
            let cards = pipeline.saved_cards();
            if cards.is_empty() {
                log::info!("No saved cards yet. Create your first ID card!");
            }
            emit(&json!({ "count": cards.len(), "cards": cards }));
            ExitCode::SUCCESS
        }

        Commands::Show { position, template, out } => {
            pipeline.set_template(template);
            if let Err(e) = pipeline.select_saved(position) {
                return fail(e.to_string());
            }
            let Some(composition) = pipeline.preview() else {
                return fail("Nothing selected".to_string());
            };
            let mut output = json!({
                "success": true,
                "template": template,
                "size": [composition.width, composition.height],
                "texts": composition.texts(),
                "badges": composition.badge_labels(),
                "qrPayload": composition.qr_payload(),
            });
            if let Some(dir) = out {
                match download(&pipeline, &dir) {
                    Ok(card) => output["card"] = card,
                    Err(e) => return fail(e),
                }
            }
            emit(&output);
            ExitCode::SUCCESS
        }

        Commands::Payload { position } => match pipeline.select_saved(position) {
            Ok(record) => {
                println!("{}", derive_payload(record));
                ExitCode::SUCCESS
            }
            Err(e) => fail(e.to_string()),
        },

        Commands::Delete { position } => match pipeline.delete_saved(position) {
            Ok(removed) => {
                emit(&json!({ "success": true, "deleted": removed.name(), "remaining": pipeline.saved().len() }));
                ExitCode::SUCCESS
            }
            Err(e) => fail(e.to_string()),
        },
    }
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("idcard"))
        .unwrap_or_else(|| PathBuf::from(".idcard"))
}

fn read_input(payload: &str, photo: Option<&Path>, intake: &PhotoIntake) -> Result<RawStudentInput, String> {
    let mut input: RawStudentInput =
        serde_json::from_str(payload).map_err(|e| format!("Invalid payload: {e}"))?;
    if let Some(path) = photo {
        input.photo = intake.from_path(path).map_err(|e| e.to_string())?;
    }
    Ok(input)
}

fn download(pipeline: &CardPipeline<FileByteStore>, dir: &Path) -> Result<serde_json::Value, String> {
    let card = pipeline.download().map_err(|e| e.to_string())?;
    let path = card.save_to(dir).map_err(|e| e.to_string())?;
    let mut value = serde_json::to_value(&card).map_err(|e| e.to_string())?;
    value["path"] = json!(path);
    Ok(value)
}

fn emit(value: &serde_json::Value) {
    println!("{value:#}");
}

fn fail(message: String) -> ExitCode {
    emit(&json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}
