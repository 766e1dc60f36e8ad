//! Factory Kernel Report Binary
//!
//! Opens the kernel against its snapshot file and prints what is in force
//! at one topology node as JSON on stdout.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `FACTORY_SNAPSHOT_PATH`: snapshot file (default: ./data/factory-kernel.json)
//! - `FACTORY_AUDIT_CAPACITY`: audit entries retained (default: 500)
//! - `FACTORY_PERSISTENCE`: "best_effort" or "strict" (default: best_effort)
//! - `FACTORY_COMPLIANCE_MODE`: "closest_wins" or "union" (default: closest_wins)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin factory_kernel -- STATION STN-A4
//! cargo run --bin factory_kernel -- GLOBAL
//! ```
//!
//! Logs go to stderr so stdout stays valid JSON.

use std::process::ExitCode;

use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use factory_capability_kernel::{
    EntityId, FactoryKernel, JsonFileStore, KernelConfig, KernelResult, Scope,
};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "factory_kernel=info,factory_capability_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn report(kernel: &FactoryKernel<JsonFileStore>, scope: Scope, scope_id: &EntityId) -> KernelResult<serde_json::Value> {
    let flags = kernel.effective_flags(scope, scope_id)?;
    let compliance = kernel.effective_compliance(scope, scope_id)?;

    Ok(json!({
        "scope": scope,
        "scope_id": scope_id,
        "compliance_mode": kernel.config().compliance_mode,
        "flags": flags,
        "compliance": compliance,
    }))
}

fn main() -> ExitCode {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = std::env::args().skip(1).collect();

    let scope_arg = args.first().map(String::as_str).unwrap_or("STATION");
    let Some(scope) = Scope::from_str(scope_arg) else {
        eprintln!("unknown scope '{}': expected GLOBAL, ENTERPRISE, PLANT, LINE or STATION", scope_arg);
        return ExitCode::from(2);
    };
    let scope_id = EntityId::new(args.get(1).map(String::as_str).unwrap_or(match scope {
        Scope::Global => "GLOBAL",
        _ => "STN-A4",
    }));

    let config = KernelConfig::from_env();
    info!(
        version = version,
        snapshot_path = %config.snapshot_path.display(),
        persistence = %config.persistence_policy,
        compliance_mode = %config.compliance_mode,
        "Starting factory kernel"
    );

    let store = JsonFileStore::new(config.snapshot_path.clone());
    let kernel = match FactoryKernel::open(config, store) {
        Ok(kernel) => kernel,
        Err(e) => {
            error!(error = %e, code = e.code(), "Failed to open kernel");
            return ExitCode::FAILURE;
        }
    };

    match report(&kernel, scope, &scope_id) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to encode report");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(error = %e, code = e.code(), scope = %scope, scope_id = %scope_id, "Query failed");
            eprintln!("{}: {}", e.code(), e);
            ExitCode::from(if e.is_client_error() { 2 } else { 1 })
        }
    }
}
