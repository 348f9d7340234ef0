//! Module Spec CLI - edit, validate, export and publish a module spec
//!
//! The working document lives in a state directory (`--state`).
//! Outputs JSON to stdout, logs to stderr.
//! Exit codes: 0 success, 1 error, 2 validation failure.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use modspec_core::{
    config::{ConfigError, DEFAULT_CONFIG_FILE},
    logging,
    publish::PublishError,
    spec::sanitize_field_name,
    store::{StoreError, PUBLISH_TARGET_FILE},
    BuilderConfig, CliPublisher, ContentType, EditorSession, ExportError, ExportPipeline,
    FieldKind, FieldPatch, FieldType, ModulePatch, PublishRequest, Publisher,
    SpecError, SpecStore,
};

#[derive(Parser)]
#[command(name = "modspec-cli")]
#[command(about = "Module Spec CLI - build content modules from a structured spec")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the working spec
    #[arg(short, long, default_value = ".modspec")]
    state: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new spec from defaults
    New {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        /// Overwrite an existing spec
        #[arg(long)]
        force: bool,
    },

    /// Print the working spec
    Show,

    /// Validate the working spec
    Validate,

    /// Edit module metadata
    Module {
        #[command(subcommand)]
        command: ModuleCommand,
    },

    /// Edit fields
    Field {
        #[command(subcommand)]
        command: FieldCommand,
    },

    /// Edit the layout tree
    Node {
        #[command(subcommand)]
        command: NodeCommand,
    },

    /// Bind a slot to a field (omit --field to unbind)
    Bind {
        #[arg(long)]
        slot: String,
        #[arg(long)]
        field: Option<String>,
    },

    /// Print generated files
    Generate,

    /// Write generated files to a directory
    Export {
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Set the saved publish target
    Target {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        remote_base: Option<String>,
    },

    /// Upload generated files with the platform CLI
    Publish {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        remote_base: Option<String>,
    },
}

#[derive(Subcommand)]
enum ModuleCommand {
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        /// Comma separated, e.g. SITE_PAGE,LANDING_PAGE
        #[arg(long, value_delimiter = ',')]
        content_types: Option<Vec<String>>,
    },
}

#[derive(Subcommand)]
enum FieldCommand {
    /// Add a field: text, boolean or image
    Add {
        #[arg(short = 't', long = "type")]
        field_type: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        required: Option<bool>,
        /// Default value, read according to the field's type
        #[arg(long)]
        default: Option<String>,
        #[arg(long)]
        max_length: Option<u32>,
        #[arg(long)]
        alt: Option<String>,
    },
    /// Change a field's type (drops type-specific settings)
    Retype {
        id: String,
        #[arg(short = 't', long = "type")]
        field_type: String,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum NodeCommand {
    AddSlot {
        #[arg(long)]
        parent: String,
    },
    AddStack {
        #[arg(long)]
        parent: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Spec already exists at {0} (use --force)")]
    AlreadyExists(PathBuf),
    #[error("Invalid value for {0}: {1}")]
    InvalidArgument(&'static str, String),
}

fn main() -> ExitCode {
    logging::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(CliError::Export(ExportError::ValidationFailed(issues))) => {
            let output = json!({ "success": false, "error": "Validation failed", "issues": issues });
            println!("{output}");
            ExitCode::from(2)
        }
        Err(e) => {
            let output = json!({ "success": false, "error": e.to_string() });
            println!("{output}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = BuilderConfig::load(&cli.config)?;
    let store = SpecStore::new(&cli.state);
    let mut session = EditorSession::with_validator(config.validator());

    if !matches!(cli.command, Commands::New { .. } | Commands::Target { .. }) && store.has_spec() {
        session.set_spec(store.load_draft()?);
    }

    match cli.command {
        Commands::New { name, slug, force } => {
            if store.has_spec() && !force {
                return Err(CliError::AlreadyExists(store.spec_path()));
            }
            session.reset_spec();
            session.update_module(ModulePatch { name, slug, content_types: None });
            save_and_print(&store, &session, json!({}))
        }

        Commands::Show => {
            print_json(&json!({ "spec": session.spec() }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate => {
            let issues = session.issues();
            print_json(&json!({ "valid": issues.is_empty(), "issues": issues }))?;
            Ok(if issues.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }

        Commands::Module { command: ModuleCommand::Set { name, slug, content_types } } => {
            let content_types = content_types
                .map(|list| {
                    list.iter()
                        .map(|s| s.trim().parse::<ContentType>())
                        .collect::<Result<BTreeSet<_>, _>>()
                })
                .transpose()?;
            session.update_module(ModulePatch { name, slug, content_types });
            save_and_print(&store, &session, json!({}))
        }

        Commands::Field { command } => run_field(command, &store, &mut session),

        Commands::Node { command } => {
            let (parent, add_slot) = match command {
                NodeCommand::AddSlot { parent } => (parent, true),
                NodeCommand::AddStack { parent } => (parent, false),
            };
            session.select_node(Some(parent));
            let added = if add_slot {
                session.add_slot_to_selected()
            } else {
                session.add_stack_to_selected()
            };
            save_and_print(&store, &session, json!({ "nodeId": added }))
        }

        Commands::Bind { slot, field } => {
            session.update_slot_binding(&slot, field);
            save_and_print(&store, &session, json!({}))
        }

        Commands::Generate => {
            let pipeline = ExportPipeline::new(config.validator());
            let bundle = pipeline.export(&session.snapshot())?;
            print_json(&json!({ "success": true, "files": bundle.files }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Export { out } => {
            let pipeline = ExportPipeline::new(config.validator());
            let bundle = pipeline.export(&session.snapshot())?;
            let written = bundle.write_to(&out)?;
            print_json(&json!({
                "success": true,
                "id": bundle.id,
                "slug": bundle.slug,
                "archive": bundle.archive_name(),
                "contentHash": bundle.content_hash,
                "engineVersion": bundle.engine_version,
                "createdAt": bundle.created_at,
                "written": written,
            }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Target { account, remote_base } => {
            let base = store.load_publish_target();
            let target = base.merged(account.as_deref(), remote_base.as_deref());
            store.save_publish_target(&target)?;
            print_json(&json!({ "success": true, "target": target }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Publish { account, remote_base } => {
            let saved = if store.dir().join(PUBLISH_TARGET_FILE).exists() {
                store.load_publish_target()
            } else {
                config.publish_target()
            };
            let target = saved.merged(account.as_deref(), remote_base.as_deref());

            let pipeline = ExportPipeline::new(config.validator());
            let bundle = pipeline.export(&session.snapshot())?;
            let request = PublishRequest::from_bundle(&target, &bundle);
            let outcome = CliPublisher::new(config.publish.cli_bin.clone()).publish(&request)?;

            print_json(&json!({
                "success": outcome.ok,
                "remotePath": request.remote_path(),
                "logs": outcome.logs,
            }))?;
            Ok(if outcome.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn run_field(
    command: FieldCommand,
    store: &SpecStore,
    session: &mut EditorSession,
) -> Result<ExitCode, CliError> {
    match command {
        FieldCommand::Add { field_type } => {
            let id = session.add_field(field_type.parse::<FieldType>()?);
            save_and_print(store, session, json!({ "fieldId": id }))
        }
        FieldCommand::Update { id, name, label, required, default, max_length, alt } => {
            let mut patch = FieldPatch {
                name: name.as_deref().map(sanitize_field_name),
                label,
                required,
                max_length: max_length.map(Some),
                default_alt: alt.map(Some),
                ..Default::default()
            };
            if let (Some(raw), Some(field)) = (default, session.spec().field(&id)) {
                match field.kind {
                    FieldKind::Text { .. } => patch.text_default = Some(Some(raw)),
                    FieldKind::Boolean { .. } => {
                        let value = raw
                            .parse::<bool>()
                            .map_err(|_| CliError::InvalidArgument("--default", raw.clone()))?;
                        patch.boolean_default = Some(Some(value));
                    }
                    FieldKind::Image { .. } => patch.default_alt = Some(Some(raw)),
                }
            }
            session.update_field(&id, &patch);
            save_and_print(store, session, json!({}))
        }
        FieldCommand::Retype { id, field_type } => {
            session.replace_field_type(&id, field_type.parse::<FieldType>()?);
            save_and_print(store, session, json!({}))
        }
        FieldCommand::Remove { id } => {
            session.remove_field(&id);
            save_and_print(store, session, json!({}))
        }
    }
}

/// Persist the draft and report it with its current issues.
fn save_and_print(
    store: &SpecStore,
    session: &EditorSession,
    mut extra: serde_json::Value,
) -> Result<ExitCode, CliError> {
    store.save_spec(session.spec())?;
    let issues = session.issues();
    extra["success"] = json!(true);
    extra["issues"] = json!(issues);
    extra["spec"] = json!(session.spec());
    print_json(&extra)?;
    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
