//! Command-line front end: generate a doubles schedule and print it as text, JSON or CSV.
//! Run with: cargo run --bin schedule -- --courts 2 --players 10 --rounds 7
//! Ctrl-C cancels the search; rounds finished so far are still printed.
//! Engine tunables can be read from a JSON file (`--config`, or env SCHEDULE_CONFIG).

use clap::{Parser, ValueEnum};
use doubles_scheduler::{
    EngineConfig, FairnessWeights, FixedPair, GenerationHooks, GenerationJob, GenerationParams,
    GenerationSession, Pair, Round, Schedule, ScheduleError, ScheduleGenerator, StrategyKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "schedule", about = "Fair doubles court assignments for a round-robin session")]
struct Args {
    /// Number of courts (4 players each)
    #[arg(long, default_value_t = 2)]
    courts: usize,
    /// Number of players, ids 1..=players
    #[arg(long, default_value_t = 8)]
    players: usize,
    /// Number of rounds to generate
    #[arg(long, default_value_t = 7)]
    rounds: usize,
    /// Round-generation strategy: greedy or randomized
    #[arg(long, default_value = "greedy", value_parser = parse_strategy)]
    strategy: StrategyKind,
    /// Fixed teammates, e.g. --fixed-pair 1-2 (repeatable)
    #[arg(long = "fixed-pair", value_parser = parse_pair)]
    fixed_pairs: Vec<FixedPair>,
    #[arg(long, default_value_t = 1.0)]
    pair_weight: f64,
    #[arg(long, default_value_t = 1.0)]
    opponent_weight: f64,
    #[arg(long, default_value_t = 1.0)]
    rest_weight: f64,
    /// Seed for reproducible schedules
    #[arg(long)]
    seed: Option<u64>,
    /// Shuffle court order within each round (display only)
    #[arg(long)]
    shuffle_courts: bool,
    /// JSON file with engine settings
    #[arg(long, env = "SCHEDULE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn parse_strategy(s: &str) -> Result<StrategyKind, String> {
    s.parse().map_err(|e: ScheduleError| e.to_string())
}

fn parse_pair(s: &str) -> Result<FixedPair, String> {
    let (a, b) = s
        .split_once(['-', ','])
        .ok_or_else(|| format!("expected two ids like 1-2, got '{s}'"))?;
    let a = a.trim().parse().map_err(|_| format!("bad player id '{a}'"))?;
    let b = b.trim().parse().map_err(|_| format!("bad player id '{b}'"))?;
    Ok(Pair::new(a, b))
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(EngineConfig::from_json(&text)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// One CSV row per court; resting players go on the first court's row.
#[derive(Serialize)]
struct CsvRow {
    round: u32,
    court: usize,
    team_a_1: u32,
    team_a_2: u32,
    team_b_1: u32,
    team_b_2: u32,
    resting: String,
}

fn write_csv(rounds: &[Round]) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for round in rounds {
        let resting = round
            .resting_players
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        for (i, m) in round.matches.iter().enumerate() {
            wtr.serialize(CsvRow {
                round: round.round_number,
                court: i + 1,
                team_a_1: m.pair_a.player1,
                team_a_2: m.pair_a.player2,
                team_b_1: m.pair_b.player1,
                team_b_2: m.pair_b.player2,
                resting: if i == 0 { resting.clone() } else { String::new() },
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn write_text(rounds: &[Round], schedule: Option<&Schedule>) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for round in rounds {
        writeln!(out, "Round {}", round.round_number)?;
        for (i, m) in round.matches.iter().enumerate() {
            writeln!(
                out,
                "  Court {}: {} & {}  vs  {} & {}",
                i + 1,
                m.pair_a.player1,
                m.pair_a.player2,
                m.pair_b.player1,
                m.pair_b.player2
            )?;
        }
        if !round.resting_players.is_empty() {
            let resting: Vec<String> = round.resting_players.iter().map(|p| p.to_string()).collect();
            writeln!(out, "  Resting: {}", resting.join(", "))?;
        }
    }
    if let Some(schedule) = schedule {
        let e = &schedule.evaluation;
        writeln!(
            out,
            "\nScore {:.4} (pair sd {:.4}, opponent sd {:.4}, rest sd {:.4})",
            e.total_score, e.pair_std_dev, e.oppo_std_dev, e.rest_std_dev
        )?;
        writeln!(out, "{:>6} {:>6} {:>6} {:>9} {:>10}", "player", "games", "rests", "partners", "opponents")?;
        for s in schedule.player_stats() {
            writeln!(
                out,
                "{:>6} {:>6} {:>6} {:>9} {:>10}",
                s.player, s.games_played, s.times_rested, s.distinct_partners, s.distinct_opponents
            )?;
        }
    }
    Ok(())
}

fn print_rounds(
    rounds: &[Round],
    schedule: Option<&Schedule>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => write_text(rounds, schedule)?,
        OutputFormat::Csv => write_csv(rounds)?,
        OutputFormat::Json => {
            let json = match schedule {
                Some(s) => serde_json::to_string_pretty(s)?,
                None => serde_json::to_string_pretty(rounds)?,
            };
            println!("{json}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let mut params = GenerationParams::new(args.courts, args.players, args.rounds)
        .with_strategy(args.strategy)
        .with_fixed_pairs(args.fixed_pairs.clone())
        .with_weights(FairnessWeights::new(args.pair_weight, args.opponent_weight, args.rest_weight));
    if let Some(seed) = args.seed {
        params = params.with_seed(seed);
    }

    let mut session = GenerationSession::new(ScheduleGenerator::new(config));
    let token = session.start();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, cancelling");
            ctrl_c_token.cancel();
        }
    });

    let mut last_logged = 0u64;
    let hooks = GenerationHooks::new(token).with_progress(move |p| {
        let decile = (p.percentage / 10.0) as u64;
        if decile > last_logged {
            last_logged = decile;
            log::info!(
                "{:.0}% ({} / {} evaluations, round {} of {})",
                p.percentage,
                p.current_evaluations,
                p.total_evaluations,
                p.current_round,
                p.total_rounds
            );
        }
    });

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    match session.run(GenerationJob::Fresh(params), hooks).await {
        Ok(mut schedule) => {
            if args.shuffle_courts {
                for round in &mut schedule.rounds {
                    round.shuffle_courts(&mut rng);
                }
            }
            print_rounds(&schedule.rounds, Some(&schedule), args.format)
        }
        Err(ScheduleError::Cancelled { completed_rounds }) => {
            log::warn!("Cancelled; printing {} completed round(s)", completed_rounds.len());
            print_rounds(&completed_rounds, None, args.format)
        }
        Err(e) => {
            log::error!("{e}");
            Err(e.into())
        }
    }
}
