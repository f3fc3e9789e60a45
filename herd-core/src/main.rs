use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use herd_core::backend::domain::herd_service::find_animal;
use herd_core::backend::domain::models::lineage::{DescendantGrouping, GenerationReport, LineageView};
use herd_core::backend::domain::LineageService;
use herd_core::backend::Backend;

const USAGE: &str = "usage: herd-core <command>

commands:
  kpis                                herd-wide indicators
  deps                                DEP reports, best index first
  lineage <animal> [--group <by>]     ancestors, siblings and descendants;
                                      <by> is status, sex or year
  predict-weight <animal> <YYYY-MM-DD>
  predict-slaughter <animal> <arrobas>

<animal> is a record id, ear tag or name. Data is read from $HERD_DATA_DIR
or ~/Documents/Herd Manager.";

#[derive(Debug, PartialEq)]
enum Command {
    Kpis,
    Deps,
    Lineage(String, DescendantGrouping),
    PredictWeight(String, NaiveDate),
    PredictSlaughter(String, f64),
}

fn parse_command(args: &[String]) -> Result<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["kpis"] => Ok(Command::Kpis),
        ["deps"] => Ok(Command::Deps),
        ["lineage", animal] => Ok(Command::Lineage(animal.to_string(), DescendantGrouping::None)),
        ["lineage", animal, "--group", grouping] => {
            let grouping = DescendantGrouping::from_string(grouping).map_err(anyhow::Error::msg)?;
            Ok(Command::Lineage(animal.to_string(), grouping))
        }
        ["predict-weight", animal, date] => {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid target date '{}', expected YYYY-MM-DD", date))?;
            Ok(Command::PredictWeight(animal.to_string(), date))
        }
        ["predict-slaughter", animal, arrobas] => {
            let arrobas: f64 = arrobas
                .parse()
                .with_context(|| format!("Invalid arroba target '{}'", arrobas))?;
            if !arrobas.is_finite() || arrobas <= 0.0 {
                bail!("Arroba target must be a positive number");
            }
            Ok(Command::PredictSlaughter(animal.to_string(), arrobas))
        }
        _ => bail!("{}", USAGE),
    }
}

/// Lineage view with per-generation counts and display groups
#[derive(Serialize)]
struct LineageReport<'a> {
    #[serde(flatten)]
    view: &'a LineageView,
    generations: Vec<GenerationReport>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let backend = Backend::new_default()?;
    let today = Local::now().date_naive();
    info!("Running {:?} against {}", command, backend.data_directory.display());

    match command {
        Command::Kpis => {
            let metrics = backend.herd_service.build_metrics(today).await?;
            print_json(&metrics.calculate_kpis())
        }
        Command::Deps => {
            let metrics = backend.herd_service.build_metrics(today).await?;
            print_json(&metrics.get_all_deps())
        }
        Command::Lineage(reference, grouping) => {
            let metrics = backend.herd_service.build_metrics(today).await?;
            let animal = find_animal(metrics.snapshot(), &reference)?;
            let view = backend
                .lineage_service
                .lineage_for(&metrics, &animal.id)
                .with_context(|| format!("No lineage for {}", animal.id))?;
            print_json(&LineageReport {
                view: view.as_ref(),
                generations: LineageService::generation_reports(&view.descendants, grouping),
            })
        }
        Command::PredictWeight(reference, target_date) => {
            let snapshot = backend.herd_service.load_snapshot().await?;
            let animal = find_animal(&snapshot, &reference)?;
            print_json(&backend.growth_service.predict_weight(animal, target_date, today))
        }
        Command::PredictSlaughter(reference, arrobas) => {
            let snapshot = backend.herd_service.load_snapshot().await?;
            let animal = find_animal(&snapshot, &reference)?;
            print_json(&backend.growth_service.predict_slaughter_date(animal, arrobas, today))
        }
    }
}
