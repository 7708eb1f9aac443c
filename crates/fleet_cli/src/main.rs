use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_core::clock::{Clock, ManualClock, SystemClock};
use fleet_core::feed::SyntheticFeed;
use fleet_core::metrics::{DashboardMetrics, LatencySummary, Recommendation};
use fleet_core::model::Event;
use fleet_core::oracle::RuleBasedOracle;
use fleet_core::routing::{build_route_provider, RouteProviderKind};
use fleet_core::systems::movement::MovementReport;
use fleet_core::{FleetConfig, FleetStore};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "fleet",
    about = "Drive the fleet core through observe, decide, act cycles",
    long_about = "Runs the monitor, matcher, route adaptation, and movement pipelines\n\
                  over a synthetic fleet with the rule-based decision oracle.\n\
                  Cost and target settings are read from the environment."
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format for results on stdout
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a fleet and run full cycles
    Run {
        #[command(flatten)]
        fleet: FleetArgs,
        /// Number of cycles
        #[arg(long, default_value_t = 10)]
        cycles: usize,
        /// Loads posted to the board before each cycle
        #[arg(long, default_value_t = 2)]
        new_loads: usize,
        /// Simulated minutes between cycles
        #[arg(long, default_value_t = 15)]
        step_minutes: u64,
    },
    /// Initialize a fleet and run a single monitor cycle
    Monitor {
        #[command(flatten)]
        fleet: FleetArgs,
    },
    /// Initialize a fleet, run one matcher pass, and print the dashboard
    Dashboard {
        #[command(flatten)]
        fleet: FleetArgs,
    },
}

#[derive(Args)]
struct FleetArgs {
    /// Number of vehicles
    #[arg(long, default_value_t = 10)]
    vehicles: usize,
    /// Number of loads on the initial board
    #[arg(long, default_value_t = 20)]
    loads: usize,
    /// Seed for the synthetic feed; overrides FLEET_SEED
    #[arg(long)]
    seed: Option<u64>,
    /// Follow the wall clock instead of a simulated one
    #[arg(long)]
    wall_clock: bool,
    /// OSRM endpoint for road routes, e.g. http://localhost:5000
    #[cfg(feature = "osrm")]
    #[arg(long, env = "OSRM_ENDPOINT")]
    osrm_endpoint: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

// ── helpers ────────────────────────────────────────────────────────

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(feature = "osrm")]
fn route_kind(args: &FleetArgs) -> RouteProviderKind {
    match &args.osrm_endpoint {
        Some(endpoint) => RouteProviderKind::Osrm {
            endpoint: endpoint.clone(),
        },
        None => RouteProviderKind::StraightLine,
    }
}

#[cfg(not(feature = "osrm"))]
fn route_kind(_args: &FleetArgs) -> RouteProviderKind {
    RouteProviderKind::StraightLine
}

/// Store over a synthetic feed, plus the manual clock when the run is simulated.
fn build_store(args: &FleetArgs) -> Result<(FleetStore, Option<Arc<ManualClock>>), String> {
    let mut config = FleetConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    let seed = config.seed;
    let store = FleetStore::new(
        config,
        Box::new(SyntheticFeed::new(seed)),
        Arc::new(RuleBasedOracle::default()),
    )
    .with_route_provider(build_route_provider(&route_kind(args)));

    if args.wall_clock {
        return Ok((store.with_clock(Arc::new(SystemClock)), None));
    }
    let clock = Arc::new(ManualClock::new(SystemClock.now_ms()));
    Ok((store.with_clock(clock.clone()), Some(clock)))
}

fn print<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), String> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
            println!("{json}");
        }
        OutputFormat::Text => text(value),
    }
    Ok(())
}

// ── commands ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct CycleSummary {
    cycle: usize,
    events_collected: usize,
    idle_alerts: usize,
    candidates_presented: usize,
    trips_created: usize,
    pairs_skipped: usize,
    match_rationale: String,
    route_actions: Vec<String>,
    movement: MovementReport,
}

#[derive(Serialize)]
struct RunSummary {
    cycles: Vec<CycleSummary>,
    dashboard: DashboardMetrics,
    decision_latency: LatencySummary,
    recommendations: Vec<Recommendation>,
}

fn run(
    args: &FleetArgs,
    cycles: usize,
    new_loads: usize,
    step_minutes: u64,
    format: OutputFormat,
) -> Result<(), String> {
    let (store, clock) = build_store(args)?;
    store
        .initialize(args.vehicles, args.loads)
        .map_err(|err| err.to_string())?;

    let mut summaries = Vec::with_capacity(cycles);
    for cycle in 1..=cycles {
        if new_loads > 0 {
            store
                .post_synthetic_loads(new_loads)
                .map_err(|err| err.to_string())?;
        }
        let monitor = store.run_monitor_cycle();
        let matched = store.run_matcher();
        let adaptations = store.adapt_en_route_trips();
        let movement = store.simulate_movement();

        info!(
            cycle,
            trips_created = matched.trips_created.len(),
            completed = movement.completed,
            "cycle finished"
        );
        summaries.push(CycleSummary {
            cycle,
            events_collected: monitor.events_collected,
            idle_alerts: monitor.idle_alerts.len(),
            candidates_presented: matched.candidates_presented,
            trips_created: matched.trips_created.len(),
            pairs_skipped: matched.skipped.len(),
            match_rationale: matched.rationale,
            route_actions: adaptations.into_iter().map(|a| a.action_taken).collect(),
            movement,
        });

        if let Some(clock) = &clock {
            clock.advance_minutes(step_minutes);
        }
    }

    let summary = RunSummary {
        cycles: summaries,
        dashboard: store.dashboard(),
        decision_latency: store.decision_latency(),
        recommendations: store.recommendations(),
    };
    print(format, &summary, |s| {
        for c in &s.cycles {
            println!(
                "cycle {:>3}: {} events, {} idle alerts, {} trips created, {} skipped, {} route decisions, {} completed",
                c.cycle,
                c.events_collected,
                c.idle_alerts,
                c.trips_created,
                c.pairs_skipped,
                c.route_actions.len(),
                c.movement.completed,
            );
        }
        print_dashboard(&s.dashboard, &s.decision_latency, &s.recommendations);
    })
}

#[derive(Serialize)]
struct MonitorSummary {
    events_collected: usize,
    position_updates: usize,
    traffic_alerts: usize,
    idle_alerts: Vec<Event>,
}

fn monitor(args: &FleetArgs, format: OutputFormat) -> Result<(), String> {
    let (store, _) = build_store(args)?;
    store
        .initialize(args.vehicles, args.loads)
        .map_err(|err| err.to_string())?;
    let report = store.run_monitor_cycle();
    let summary = MonitorSummary {
        events_collected: report.events_collected,
        position_updates: report.position_updates,
        traffic_alerts: report.traffic_alerts,
        idle_alerts: report.idle_alerts,
    };
    print(format, &summary, |s| {
        println!(
            "{} events collected ({} position updates, {} traffic alerts)",
            s.events_collected, s.position_updates, s.traffic_alerts
        );
        for alert in &s.idle_alerts {
            if let Some(vehicle_id) = alert.vehicle_id() {
                println!("idle timeout: {vehicle_id}");
            }
        }
    })
}

#[derive(Serialize)]
struct DashboardSummary {
    dashboard: DashboardMetrics,
    decision_latency: LatencySummary,
    recommendations: Vec<Recommendation>,
}

fn dashboard(args: &FleetArgs, format: OutputFormat) -> Result<(), String> {
    let (store, _) = build_store(args)?;
    store
        .initialize(args.vehicles, args.loads)
        .map_err(|err| err.to_string())?;
    store.run_matcher();
    let summary = DashboardSummary {
        dashboard: store.dashboard(),
        decision_latency: store.decision_latency(),
        recommendations: store.recommendations(),
    };
    print(format, &summary, |s| {
        print_dashboard(&s.dashboard, &s.decision_latency, &s.recommendations)
    })
}

fn print_dashboard(
    metrics: &DashboardMetrics,
    latency: &LatencySummary,
    recommendations: &[Recommendation],
) {
    println!(
        "vehicles        {} ({} available)",
        metrics.total_vehicles, metrics.available_vehicles
    );
    println!("loads available {}", metrics.available_loads);
    println!("active trips    {}", metrics.active_trips);
    println!("utilization     {:.1}%", metrics.fleet_utilization_rate * 100.0);
    println!("empty returns   {:.1}%", metrics.empty_return_rate * 100.0);
    println!("revenue per km  {:.2}", metrics.revenue_per_km);
    println!("idle minutes    {:.1}", metrics.total_idle_minutes);
    println!("profit margin   {:.1}%", metrics.avg_profit_margin * 100.0);
    println!(
        "oracle latency  p50 {} ms, p95 {} ms over {} calls",
        latency.p50_ms, latency.p95_ms, latency.samples
    );
    for recommendation in recommendations {
        match recommendation {
            Recommendation::Refuel {
                vehicle_id,
                fuel_level_percent,
            } => println!("- refuel {vehicle_id} ({fuel_level_percent:.1}% fuel)"),
            Recommendation::RestDriver {
                vehicle_id,
                hours_remaining,
            } => println!("- rest driver of {vehicle_id} ({hours_remaining:.1} h left)"),
            Recommendation::RaiseUtilization { current, target } => println!(
                "- utilization {:.1}% is below the {:.1}% target",
                current * 100.0,
                target * 100.0
            ),
            Recommendation::ReduceEmptyLegs { current, target } => println!(
                "- empty returns {:.1}% exceed the {:.1}% target",
                current * 100.0,
                target * 100.0
            ),
        }
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let result = match &cli.command {
        Commands::Run {
            fleet,
            cycles,
            new_loads,
            step_minutes,
        } => run(fleet, *cycles, *new_loads, *step_minutes, cli.format),
        Commands::Monitor { fleet } => monitor(fleet, cli.format),
        Commands::Dashboard { fleet } => dashboard(fleet, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fleet command failed");
            ExitCode::FAILURE
        }
    }
}
