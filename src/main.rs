use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use codeblue_config::ScenarioDef;
use codeblue_runtime::{ChannelObserver, EngineConfig, ScenarioEngine, Step};
use codeblue_scenario::Scenario;

/// Codeblue - A branching clinical training scenario engine
#[derive(Parser)]
#[command(name = "codeblue")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log engine activity to stderr
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a scenario document and report problems and warnings
  Validate {
    /// Path to the scenario file (JSON)
    scenario_file: PathBuf,
  },

  /// Print the phase graph of a scenario
  Inspect {
    /// Path to the scenario file (JSON)
    scenario_file: PathBuf,
  },

  /// Run a scenario against a script of transitions and ticks
  Run {
    /// Path to the scenario file (JSON)
    scenario_file: PathBuf,

    /// JSON array of steps; read from stdin when omitted
    #[arg(long)]
    script: Option<PathBuf>,

    /// Logical start time in milliseconds
    #[arg(long, default_value_t = 0)]
    start: u64,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let Some(command) = cli.command else {
    println!("codeblue - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()?;
  rt.block_on(async {
    match command {
      Commands::Validate { scenario_file } => validate(&scenario_file).await,
      Commands::Inspect { scenario_file } => inspect(&scenario_file).await,
      Commands::Run {
        scenario_file,
        script,
        start,
      } => run(&scenario_file, script.as_deref(), start).await,
    }
  })
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

async fn validate(scenario_file: &Path) -> Result<()> {
  let scenario = load_scenario(scenario_file).await?;

  eprintln!(
    "Scenario '{}' is valid ({} phases, {} events)",
    scenario.id(),
    scenario.phases().len(),
    scenario.events().len()
  );

  for lint in scenario.lints() {
    eprintln!("warning: {lint}");
  }

  let output = serde_json::json!({
    "id": scenario.id(),
    "title": scenario.title(),
    "phases": scenario.phases().len(),
    "events": scenario.events().len(),
    "lints": scenario.lints(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn inspect(scenario_file: &Path) -> Result<()> {
  let scenario = load_scenario(scenario_file).await?;
  let graph = scenario.graph();

  let phases: serde_json::Map<String, serde_json::Value> = scenario
    .phases()
    .iter()
    .map(|(key, phase)| {
      let transitions: Vec<serde_json::Value> = phase
        .transitions
        .iter()
        .map(|t| {
          serde_json::json!({
            "label": t.label,
            "to": t.to,
            "guarded": t.condition.is_some(),
          })
        })
        .collect();
      let value = serde_json::json!({
        "description": phase.description,
        "isEnd": phase.is_end,
        "upstream": graph.upstream(key),
        "transitions": transitions,
      });
      (key.clone(), value)
    })
    .collect();

  let output = serde_json::json!({
    "id": scenario.id(),
    "initialPhase": scenario.initial_phase(),
    "endPhases": graph.end_phases(),
    "reachable": graph.reachable_from(scenario.initial_phase()),
    "optimalPath": scenario.optimal_path(),
    "phases": phases,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn run(scenario_file: &Path, script: Option<&Path>, start: u64) -> Result<()> {
  let scenario = Arc::new(load_scenario(scenario_file).await?);

  let steps: Vec<Step> = match script {
    Some(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read script file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse script file: {}", path.display()))?
    }
    None => read_steps_from_stdin()?,
  };

  eprintln!("Loaded scenario: {} ({} steps)", scenario.title(), steps.len());

  let (observer, mut receiver) = ChannelObserver::channel();
  let mut engine = ScenarioEngine::start_with(scenario, observer, EngineConfig::default(), start)
    .context("failed to start scenario")?;

  let mut outcomes = Vec::with_capacity(steps.len());
  let mut error = None;
  for (index, step) in steps.iter().enumerate() {
    match engine.apply(step) {
      Ok(outcome) => outcomes.push(outcome),
      Err(err) => {
        warn!(index, step = ?step, error = %err, "step_failed");
        eprintln!("Step {index} failed: {err}");
        error = Some(serde_json::json!({
          "index": index,
          "message": err.to_string(),
          "recoverable": err.is_recoverable(),
        }));
        break;
      }
    }
  }

  let snapshot = engine.snapshot();
  info!(
    instance_id = %snapshot.instance_id,
    phase = %snapshot.current_phase,
    clock = snapshot.clock,
    steps = outcomes.len(),
    "run_finished"
  );
  drop(engine);

  let mut events = Vec::new();
  while let Some(event) = receiver.recv().await {
    events.push(event);
  }

  let output = serde_json::json!({
    "outcomes": outcomes,
    "error": error,
    "events": events,
    "final": snapshot,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn load_scenario(scenario_file: &Path) -> Result<Scenario> {
  let content = tokio::fs::read_to_string(scenario_file)
    .await
    .with_context(|| format!("failed to read scenario file: {}", scenario_file.display()))?;

  let def = ScenarioDef::from_json(&content)
    .with_context(|| format!("failed to parse scenario file: {}", scenario_file.display()))?;

  let scenario = Scenario::load(def)
    .with_context(|| format!("invalid scenario: {}", scenario_file.display()))?;
  info!(
    scenario_id = %scenario.id(),
    path = %scenario_file.display(),
    lints = scenario.lints().len(),
    "scenario_file_loaded"
  );
  Ok(scenario)
}

fn read_steps_from_stdin() -> Result<Vec<Step>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, just start the scenario
    return Ok(Vec::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read steps from stdin")?;

  if input.trim().is_empty() {
    Ok(Vec::new())
  } else {
    serde_json::from_str(&input).context("failed to parse steps JSON from stdin")
  }
}
