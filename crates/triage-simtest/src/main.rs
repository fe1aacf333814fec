//! Triage Headless Simulation Harness
//!
//! Runs a scenario end to end with a scripted operator standing in for the
//! human, then checks the run held together: every patient completed, no
//! tier was promised more beds than it has, and the same seed replays the
//! same log.
//!
//! Usage:
//!   cargo run -p triage-simtest
//!   cargo run -p triage-simtest -- --verbose --records run.jsonl
//!   RUST_LOG=debug cargo run -p triage-simtest -- --config my_scenario.json

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use hecs::Entity;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use triage_core::error::EngineError;
use triage_core::prelude::*;
use triage_core::records::TriageDecisionRecord;

#[derive(Parser, Debug)]
#[command(name = "triage-simtest")]
#[command(about = "Run a triage scenario headless and check the outcome")]
struct Args {
    /// Scenario file
    #[arg(short, long, default_value = "crates/triage-simtest/data/scenario.json")]
    config: PathBuf,

    /// Give up after this many ticks
    #[arg(short, long, default_value_t = 5000)]
    ticks: u64,

    /// Ticks the scripted operator looks at a patient before deciding
    #[arg(long, default_value_t = 3)]
    think_ticks: u64,

    /// Write every record of the main run as JSON lines
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Print passing checks too
    #[arg(short, long)]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    println!("=== Triage Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario
    let config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => {
            results.push(TestResult {
                name: "config_loads".into(),
                passed: true,
                detail: format!(
                    "{} patients, {}/{}/{} beds, {:?}",
                    config.patients.max_patients,
                    config.hospital.waiting_room_beds,
                    config.hospital.ward_beds,
                    config.hospital.icu_beds,
                    config.policy
                ),
            });
            config
        }
        Err(e) => {
            results.push(TestResult {
                name: "config_loads".into(),
                passed: false,
                detail: e.to_string(),
            });
            finish(&results, args.verbose);
            return;
        }
    };

    // 2. Main run
    let sink = match args.records.as_ref().map(File::create).transpose() {
        Ok(file) => file.map(BufWriter::new),
        Err(e) => {
            results.push(TestResult {
                name: "records_file".into(),
                passed: false,
                detail: e.to_string(),
            });
            None
        }
    };
    let main_run = match run_scenario(config.clone(), args.ticks, args.think_ticks, sink) {
        Ok(run) => run,
        Err(e) => {
            results.push(TestResult {
                name: "run_completes".into(),
                passed: false,
                detail: e.to_string(),
            });
            finish(&results, args.verbose);
            return;
        }
    };
    results.extend(validate_run("shared", &config, &main_run));

    // 3. Determinism
    results.extend(validate_determinism(&config, &main_run, args.ticks, args.think_ticks));

    // 4. Fully automated variant
    results.extend(validate_fully_automated(&config, args.ticks));

    finish(&results, args.verbose);
}

fn finish(results: &[TestResult], verbose: bool) {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, total, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Scripted operator ───────────────────────────────────────────────────

/// Decides every patient handed to it once it has looked at them for
/// `think_ticks`. Takes the engine's proposal and steps down a tier while
/// the proposed one is full.
struct ScriptedOperator {
    think_ticks: u64,
    first_seen: HashMap<Entity, u64>,
    decided: usize,
}

impl ScriptedOperator {
    fn new(think_ticks: u64) -> Self {
        Self {
            think_ticks,
            first_seen: HashMap::new(),
            decided: 0,
        }
    }

    fn act(&mut self, engine: &mut TriageEngine) {
        let now = engine.current_tick();
        for view in engine.operator_queue() {
            let seen = *self.first_seen.entry(view.patient).or_insert(now);
            if now.saturating_sub(seen) < self.think_ticks {
                continue;
            }
            let mut tier = view.planned_decision.unwrap_or(CareTier::Home);
            loop {
                match engine.submit_human_decision(view.patient, tier) {
                    Ok(()) => {
                        debug!(patient = %view.name, %tier, "scripted operator decided");
                        self.first_seen.remove(&view.patient);
                        self.decided += 1;
                        break;
                    }
                    Err(OperatorError::NoCapacity(_)) => tier = tier.fallback(),
                    Err(e) => {
                        warn!(patient = %view.name, "scripted operator rejected: {e}");
                        break;
                    }
                }
            }
        }
    }
}

// ── Running ─────────────────────────────────────────────────────────────

struct RunSummary {
    ticks: u64,
    done: bool,
    admitted: usize,
    completed: usize,
    records: Vec<String>,
    decisions: Vec<TriageDecisionRecord>,
    /// Ticks that ended with patients waiting on the operator.
    operator_ticks: usize,
    operator_decisions: usize,
    operator_backlog: usize,
    bed_violations: Vec<String>,
}

fn run_scenario(
    config: SimulationConfig,
    max_ticks: u64,
    think_ticks: u64,
    mut sink: Option<BufWriter<File>>,
) -> Result<RunSummary, EngineError> {
    let mut engine = TriageEngine::new(config)?;
    let mut operator = ScriptedOperator::new(think_ticks);
    let mut summary = RunSummary {
        ticks: 0,
        done: false,
        admitted: 0,
        completed: 0,
        records: Vec::new(),
        decisions: Vec::new(),
        operator_ticks: 0,
        operator_decisions: 0,
        operator_backlog: 0,
        bed_violations: Vec::new(),
    };

    while !engine.is_done() && engine.current_tick() < max_ticks {
        operator.act(&mut engine);
        let report = engine.tick()?;

        if !engine.operator_queue().is_empty() {
            summary.operator_ticks += 1;
        }
        for record in report.records() {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    if let Some(out) = sink.as_mut() {
                        if let Err(e) = writeln!(out, "{line}") {
                            warn!("dropping records file: {e}");
                            sink = None;
                        }
                    }
                    summary.records.push(line);
                }
                Err(e) => warn!(tick = report.tick, "unserializable record: {e}"),
            }
        }
        summary.decisions.extend(report.decisions);
        summary.bed_violations.extend(bed_violations(&engine, report.tick));
    }
    if let Some(mut out) = sink {
        if let Err(e) = out.flush() {
            warn!("records file incomplete: {e}");
        }
    }

    summary.ticks = engine.current_tick();
    summary.done = engine.is_done();
    summary.admitted = engine.admitted_count();
    summary.completed = engine.completed_count();
    summary.operator_decisions = operator.decided;
    summary.operator_backlog = engine.operator_queue().len();
    info!(
        ticks = summary.ticks,
        completed = summary.completed,
        records = summary.records.len(),
        "run finished"
    );
    Ok(summary)
}

/// Occupants that don't point back at their bed, and limited tiers with
/// more finalized patients heading in than free beds.
fn bed_violations(engine: &TriageEngine, tick: u64) -> Vec<String> {
    let mut violations = Vec::new();
    for (bed_entity, bed) in engine.world.query::<&Bed>().iter() {
        let Some(occupant) = bed.occupant else {
            continue;
        };
        let back = engine.world.get::<&Location>(occupant).ok().and_then(|l| l.bed());
        if back != Some(bed_entity) {
            violations.push(format!("tick {tick}: {} bed {} occupant elsewhere", bed.tier, bed.number));
        }
    }
    for tier in [CareTier::Ward, CareTier::Icu] {
        let heading_in = engine
            .world
            .query::<(&Phase, &Location)>()
            .iter()
            .filter(|(_, (phase, location))| {
                phase.finalized_tier() == Some(tier)
                    && location
                        .bed()
                        .and_then(|b| engine.world.get::<&Bed>(b).ok().map(|bed| bed.tier))
                        != Some(tier)
            })
            .count();
        let free = engine.free_beds(tier);
        if heading_in > free {
            violations.push(format!("tick {tick}: {heading_in} patients heading for {free} free {tier} beds"));
        }
    }
    violations
}

// ── 1. Main run ─────────────────────────────────────────────────────────

fn validate_run(label: &str, config: &SimulationConfig, run: &RunSummary) -> Vec<TestResult> {
    println!("--- Run ({label}) ---");
    let mut results = Vec::new();
    let expected = config.patients.max_patients;

    results.push(TestResult {
        name: format!("{label}_run_completes"),
        passed: run.done,
        detail: format!("{} ticks, {}/{} patients completed", run.ticks, run.completed, expected),
    });

    results.push(TestResult {
        name: format!("{label}_all_admitted"),
        passed: run.admitted == expected,
        detail: format!("{}/{} admitted", run.admitted, expected),
    });

    results.push(TestResult {
        name: format!("{label}_beds_consistent"),
        passed: run.bed_violations.is_empty(),
        detail: match run.bed_violations.first() {
            None => "no bed promised twice".into(),
            Some(first) => format!("{} violations, first: {}", run.bed_violations.len(), first),
        },
    });

    let mut seen = BTreeSet::new();
    let repeats: Vec<u32> = run
        .decisions
        .iter()
        .filter(|d| !seen.insert(d.patient_id))
        .map(|d| d.patient_id)
        .collect();
    results.push(TestResult {
        name: format!("{label}_decided_once"),
        passed: repeats.is_empty(),
        detail: if repeats.is_empty() {
            format!("{} binding decisions", run.decisions.len())
        } else {
            format!("patients decided twice: {repeats:?}")
        },
    });

    let human = run
        .decisions
        .iter()
        .filter(|d| d.decided_by == DecisionMaker::Human)
        .count();
    results.push(TestResult {
        name: format!("{label}_operator_decisions_logged"),
        passed: human == run.operator_decisions && run.operator_backlog == 0,
        detail: format!(
            "{} ticks with operator work, {} operator decisions, {} logged, {} left waiting",
            run.operator_ticks, run.operator_decisions, human, run.operator_backlog
        ),
    });

    println!("  {} ticks, {} records", run.ticks, run.records.len());
    results
}

// ── 2. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(
    config: &SimulationConfig,
    first: &RunSummary,
    max_ticks: u64,
    think_ticks: u64,
) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    match run_scenario(config.clone(), max_ticks, think_ticks, None) {
        Ok(second) => {
            let diverged = first
                .records
                .iter()
                .zip(&second.records)
                .position(|(a, b)| a != b);
            let same = diverged.is_none() && first.records.len() == second.records.len();
            results.push(TestResult {
                name: "same_seed_same_records".into(),
                passed: same,
                detail: match diverged {
                    None if same => format!("{} records replayed", first.records.len()),
                    None => format!("{} vs {} records", first.records.len(), second.records.len()),
                    Some(i) => format!("records diverge at line {i}"),
                },
            });
        }
        Err(e) => results.push(TestResult {
            name: "same_seed_same_records".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }
    results
}

// ── 3. Fully automated ──────────────────────────────────────────────────

fn validate_fully_automated(config: &SimulationConfig, max_ticks: u64) -> Vec<TestResult> {
    let config = SimulationConfig {
        policy: DecisionPolicy::FullyAutomated,
        ..config.clone()
    };

    match run_scenario(config.clone(), max_ticks, 0, None) {
        Ok(run) => {
            let mut results = validate_run("automated", &config, &run);
            let human = run
                .decisions
                .iter()
                .filter(|d| d.decided_by != DecisionMaker::Agent)
                .count();
            results.push(TestResult {
                name: "automated_never_defers".into(),
                passed: run.operator_ticks == 0 && human == 0,
                detail: format!("{} ticks with operator work, {} non-agent decisions", run.operator_ticks, human),
            });
            results
        }
        Err(e) => vec![TestResult {
            name: "automated_run_completes".into(),
            passed: false,
            detail: e.to_string(),
        }],
    }
}
