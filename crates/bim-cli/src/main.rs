//! CLI mínima sobre el `BuildService`.
//!
//! `bim-cli run --program edificio.json` crea un workflow y lo ejecuta
//! completo; `bim-cli reviews list` / `reviews resolve` operan sobre la cola
//! persistida (rutas de `BIMFLOW_REVIEW_QUEUE_PATH` / `BIMFLOW_FEEDBACK_PATH`);
//! `bim-cli call <metodo> --params '{...}'` invoca cualquier operación.
use bimflow_rust::BuildService;
use clap::{Parser, Subcommand};
use log::debug;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bim-cli", about = "Phased building workflows with confidence-gated execution")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a workflow from a program file and execute every eligible phase
    Run {
        /// JSON building program (buildingType, numberOfStories, footprint, ...)
        #[arg(long)]
        program: PathBuf,
        /// Execute operations directly, bypassing the confidence gate
        #[arg(long)]
        no_gating: bool,
        /// Queue every gated operation for review instead of auto-executing
        #[arg(long)]
        no_auto_execute: bool,
        /// Leave optional phases out of the workflow
        #[arg(long)]
        skip_optional: bool,
        /// Keep executing phases after a failure
        #[arg(long)]
        continue_on_error: bool,
    },
    /// List the phase catalog
    Phases {
        /// Print the dependency graph instead of the definitions
        #[arg(long)]
        graph: bool,
    },
    /// Inspect or resolve persisted review items
    Reviews {
        #[command(subcommand)]
        action: ReviewAction,
    },
    /// Call any named operation with JSON params
    Call {
        method: String,
        /// Inline JSON object
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,
        /// File with a JSON object
        #[arg(long)]
        params_file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewAction {
    /// Pending review items
    List,
    /// Queue and feedback statistics
    Stats,
    /// Approve, reject or approve with modified params
    Resolve {
        #[arg(long)]
        id: String,
        /// Approve | Reject | ApproveModified
        #[arg(long)]
        decision: String,
        #[arg(long)]
        notes: Option<String>,
        /// Replacement params (JSON) for ApproveModified
        #[arg(long)]
        params: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter)
                                     .with_writer(std::io::stderr)
                                     .try_init();
}

fn parse_json(label: &str, text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| format!("{label} is not valid json: {e}"))
}

fn read_json(path: &PathBuf) -> Result<Value, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    parse_json(&path.display().to_string(), &text)
}

/// Añade un campo al objeto de parámetros.
fn with_param(mut params: Value, key: &str, value: Value) -> Value {
    if let Value::Object(fields) = &mut params {
        fields.insert(key.to_string(), value);
    }
    params
}

async fn run_command(service: &BuildService, command: Command) -> Result<Value, String> {
    match command {
        Command::Run { program,
                       no_gating,
                       no_auto_execute,
                       skip_optional,
                       continue_on_error, } => {
            let mut params = read_json(&program)?;
            params = with_param(params, "useConfidenceGating", json!(!no_gating));
            params = with_param(params, "autoExecuteHighConfidence", json!(!no_auto_execute));
            params = with_param(params, "skipOptionalPhases", json!(skip_optional));
            params = with_param(params, "stopOnError", json!(!continue_on_error));
            let created = service.dispatch("createWorkflow", &params).await;
            let Some(workflow_id) = created["workflowId"].as_str() else {
                return Ok(created);
            };
            debug!("workflow created workflow_id={workflow_id}");
            Ok(service.dispatch("executeAll", &json!({"workflowId": workflow_id})).await)
        }
        Command::Phases { graph } => {
            let method = if graph { "getDependencyGraph" } else { "getPhaseDefinitions" };
            Ok(service.dispatch(method, &json!({})).await)
        }
        Command::Reviews { action } => match action {
            ReviewAction::List => Ok(service.dispatch("getPendingReviews", &json!({})).await),
            ReviewAction::Stats => {
                let queue = service.dispatch("getQueueStats", &json!({})).await;
                let feedback = service.dispatch("getFeedbackStats", &json!({})).await;
                Ok(json!({"success": queue["success"] == json!(true) && feedback["success"] == json!(true),
                          "queue": queue,
                          "feedback": feedback}))
            }
            ReviewAction::Resolve { id,
                                    decision,
                                    notes,
                                    params, } => {
                let modified = params.map(|p| parse_json("--params", &p)).transpose()?;
                let request = json!({"reviewId": id,
                                     "decision": decision,
                                     "notes": notes,
                                     "modifiedParams": modified});
                Ok(service.dispatch("submitReview", &request).await)
            }
        },
        Command::Call { method,
                        params,
                        params_file, } => {
            let params = match (params, params_file) {
                (Some(text), _) => parse_json("--params", &text)?,
                (None, Some(path)) => read_json(&path)?,
                (None, None) => json!({}),
            };
            Ok(service.dispatch(&method, &params).await)
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let service = match BuildService::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[bim-cli] configuration error: {e}");
            std::process::exit(2);
        }
    };
    let response = match run_command(&service, cli.command).await {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("[bim-cli] {msg}");
            std::process::exit(3);
        }
    };
    match serde_json::to_string_pretty(&response) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("[bim-cli] cannot render response: {e}");
            std::process::exit(5);
        }
    }
    if response["success"] != json!(true) {
        std::process::exit(1);
    }
}
