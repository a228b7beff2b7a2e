//! Transporte JSON-lines sobre stdio.
//!
//! Cada línea de entrada es `{"method": ..., "params": {...}, "id"?: ...}` y
//! produce exactamente una línea de salida con el envelope de respuesta (con
//! el mismo `id` si la petición lo traía). Los logs van a stderr.
use bimflow_rust::service::failure;
use bimflow_rust::{ApiError, BuildService};
use log::{error, info};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter)
                                     .with_writer(std::io::stderr)
                                     .try_init();
}

async fn handle_line(service: &BuildService, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return failure(&ApiError::Validation(format!("invalid request json: {e}"))),
    };
    let id = request.get("id").cloned();
    let mut response = match request.get("method").and_then(Value::as_str) {
        Some(method) => {
            let params = request.get("params").cloned().unwrap_or_else(|| json!({}));
            service.dispatch(method, &params).await
        }
        None => failure(&ApiError::missing_param("method")),
    };
    if let (Some(id), Value::Object(fields)) = (id, &mut response) {
        fields.insert("id".into(), id);
    }
    response
}

#[tokio::main]
async fn main() {
    init_tracing();
    let service = match BuildService::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("cannot start build service: {e}");
            std::process::exit(2);
        }
    };
    info!("bimflow listening on stdin (json-lines)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read failed error={e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&service, &line).await;
        let mut out = response.to_string();
        out.push('\n');
        if let Err(e) = stdout.write_all(out.as_bytes()).await {
            error!("stdout write failed error={e}");
            break;
        }
        let _ = stdout.flush().await;
    }
    info!("bimflow stdin closed, exiting");
}
