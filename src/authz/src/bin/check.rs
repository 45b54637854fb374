//! # authz-check
//!
//! Evaluates one resource path against a configuration file, for testing
//! policies from the command line.
//!
//! ```text
//! AUTHZ_CONFIG=authz.yaml authz-check <path> [claims-json] [request-json]
//! ```
//!
//! Prints `ALLOW` or `DENY` and exits with status 1 on denial. Claims default
//! to none (`null`) and the request to `{}`.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `AUTHZ_CONFIG` - configuration file (`.yaml`, `.yml` or `.json`)
//! - `AUTHZ_ENFORCEMENT_MODE` - overrides the configured enforcement mode
//! - `RUST_LOG` - log level (default: warn)

use std::process::ExitCode;

use anyhow::{bail, Context};
use recloak_authz::{Claims, EnforcementMode, Engine};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: authz-check <path> [claims-json] [request-json]";

/// One check, as given by the environment and the command line
#[derive(Debug)]
struct CheckArgs {
    config_path: String,
    mode: Option<EnforcementMode>,
    path: String,
    claims: Option<Claims>,
    request: Value,
}

impl CheckArgs {
    fn parse(
        config_path: Option<String>,
        mode: Option<String>,
        args: impl IntoIterator<Item = String>,
    ) -> anyhow::Result<Self> {
        let config_path =
            config_path.context("AUTHZ_CONFIG must point to an authorization config file")?;
        let mode = mode.map(|raw| raw.parse()).transpose()?;

        let mut args = args.into_iter();
        let Some(path) = args.next() else {
            bail!(USAGE);
        };

        let claims: Option<Claims> = match args.next() {
            Some(raw) => serde_json::from_str(&raw).context("claims argument is not valid JSON")?,
            None => None,
        };
        let request: Value = match args.next() {
            Some(raw) => serde_json::from_str(&raw).context("request argument is not valid JSON")?,
            None => Value::Object(Default::default()),
        };

        Ok(Self {
            config_path,
            mode,
            path,
            claims,
            request,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    fn status(&self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Deny(_) => 1,
        }
    }
}

/// Build the engine and evaluate; evaluation failures are errors, not denials
fn check(args: &CheckArgs) -> anyhow::Result<Decision> {
    let engine = Engine::from_file(&args.config_path)
        .with_context(|| format!("failed to build engine from {}", args.config_path))?;

    if let Some(mode) = args.mode {
        engine.set_enforcement_mode(mode);
    }

    info!(path = %args.path, mode = %engine.enforcement_mode(), "Checking access");

    match engine.authorize(&args.path, args.claims.as_ref(), &args.request) {
        Ok(()) => Ok(Decision::Allow),
        Err(e) if e.is_denied() => Ok(Decision::Deny(e.to_string())),
        Err(e) => {
            error!(error = %e, "Evaluation failed");
            Err(e.into())
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CheckArgs::parse(
        std::env::var("AUTHZ_CONFIG").ok(),
        std::env::var("AUTHZ_ENFORCEMENT_MODE").ok(),
        std::env::args().skip(1),
    )?;

    let decision = check(&args)?;
    match &decision {
        Decision::Allow => println!("ALLOW {}", args.path),
        Decision::Deny(reason) => println!("DENY {}: {reason}", args.path),
    }

    Ok(ExitCode::from(decision.status()))
}
