//! controls-runner: headless driver for the GTC-45 control engine.
//!
//! Usage:
//!   controls-runner --data-dir ./data --position position.json
//!   controls-runner --db controls.db --company acme --seed-templates
//!   controls-runner --db controls.db --company acme --suggest hazards.json
//!   controls-runner --db controls.db --company acme --inconsistencies
//!   controls-runner --db controls.db --ipc-mode

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gtc45_core::{
    engine::ControlEngine,
    hazard::{HazardExposure, RawHazardRecord},
    learning::ApplicationInput,
    position::RawPositionProfile,
    store::TemplateStore,
};
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    EvaluatePosition {
        position: RawPositionProfile,
    },
    SeedTemplates {
        company_id: String,
    },
    Suggest {
        company_id: String,
        hazards: Vec<RawHazardRecord>,
    },
    RecordApplication {
        company_id: String,
        template_id: String,
        application: ApplicationInput,
    },
    AutoRevise {
        company_id: String,
        template_id: String,
    },
    Inconsistencies {
        company_id: String,
    },
    AuditLog {
        company_id: String,
    },
    Quit,
}

#[derive(Serialize)]
struct Report<T: Serialize> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    body: T,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let seed = args.iter().any(|a| a == "--seed-templates");
    let inconsistencies = args.iter().any(|a| a == "--inconsistencies");
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let company = arg_value(&args, "--company");

    let store = TemplateStore::open(db)?;
    let engine = ControlEngine::build(data_dir, store)?;

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    if let Some(path) = arg_value(&args, "--position") {
        let raw: RawPositionProfile = read_json(path)?;
        let profile = raw.normalize()?;
        let evaluation = engine.evaluate_position(&profile)?;
        let exams = evaluation.controls.exam_lines(engine.exams());
        print_report(&serde_json::json!({
            "evaluation": evaluation,
            "exams": exams,
        }))?;
    }

    let needs_company = seed || inconsistencies || arg_value(&args, "--suggest").is_some();
    let company = match company {
        Some(c) => c,
        None if needs_company => anyhow::bail!("--company is required for template reports"),
        None => return Ok(()),
    };

    if seed {
        let seeded = engine.seed_company_templates(company)?;
        print_report(&serde_json::json!({ "seeded": seeded }))?;
    }
    if let Some(path) = arg_value(&args, "--suggest") {
        let raw: Vec<RawHazardRecord> = read_json(path)?;
        let hazards = exposures(raw)?;
        let suggestions = engine.suggest(company, &hazards)?;
        print_report(&serde_json::json!({ "suggestions": suggestions }))?;
    }
    if inconsistencies {
        let reports = engine.company_inconsistencies(company)?;
        print_report(&serde_json::json!({ "inconsistencies": reports }))?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &ControlEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        // Engine errors are answered, not fatal: the caller decides.
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("command failed: {e:#}");
                serde_json::json!({ "error": format!("{e:#}") })
            }
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &ControlEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::EvaluatePosition { position } => {
            let evaluation = engine.evaluate_position(&position.normalize()?)?;
            serde_json::to_value(evaluation)?
        }
        IpcCommand::SeedTemplates { company_id } => {
            serde_json::to_value(engine.seed_company_templates(&company_id)?)?
        }
        IpcCommand::Suggest {
            company_id,
            hazards,
        } => serde_json::to_value(engine.suggest(&company_id, &exposures(hazards)?)?)?,
        IpcCommand::RecordApplication {
            company_id,
            template_id,
            application,
        } => {
            let (record, template) =
                engine.record_application(&company_id, &template_id, &application)?;
            serde_json::json!({ "record": record, "template": template })
        }
        IpcCommand::AutoRevise {
            company_id,
            template_id,
        } => serde_json::to_value(engine.auto_revise_template(&company_id, &template_id)?)?,
        IpcCommand::Inconsistencies { company_id } => {
            serde_json::to_value(engine.company_inconsistencies(&company_id)?)?
        }
        IpcCommand::AuditLog { company_id } => {
            serde_json::to_value(engine.audit_log(&company_id)?)?
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn exposures(raw: Vec<RawHazardRecord>) -> Result<Vec<HazardExposure>> {
    Ok(raw
        .into_iter()
        .map(RawHazardRecord::normalize)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|h| h.hazard)
        .collect())
}

fn print_report<T: Serialize>(body: &T) -> Result<()> {
    let report = Report {
        generated_at: Utc::now(),
        body,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
