use anyhow::{Context, Result};
use clap::Parser;
use frontsim_core::game::Winner;
use frontsim_core::testing::{new_match, MatchSettings};
use frontsim_core::{Config, Difficulty, Game, UnitType};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless Nation AI match runner", long_about = None)]
struct Args {
    /// Map and match seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 1000)]
    ticks: u64,

    /// Nation difficulty (easy, medium, hard, impossible)
    #[arg(long)]
    difficulty: Option<Difficulty>,

    /// Number of Nations
    #[arg(long, default_value_t = 4)]
    nations: u32,

    /// Number of bots (defaults to the config's `bots`)
    #[arg(long)]
    bots: Option<u32>,

    /// Passive human seats that never act
    #[arg(long, default_value_t = 0)]
    humans: u32,

    /// Map width and height in tiles
    #[arg(long, default_value_t = 128)]
    size: u32,

    /// JSON rules file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Config::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(difficulty) = args.difficulty {
        config.game.difficulty = difficulty;
    }
    let settings = MatchSettings {
        seed: args.seed,
        size: args.size,
        nations: args.nations,
        bots: args.bots.unwrap_or(config.game.bots),
        humans: args.humans,
        config,
    };

    let mut game = new_match(&settings);
    for _ in 0..args.ticks {
        game.execute_next_tick();
        if game.ticks() % 500 == 0 {
            log::info!("tick {}: {} players alive", game.ticks(), game.players().len());
        }
        if game.winner().is_some() {
            break;
        }
    }

    println!(
        "{:<16} {:>8} {:>10} {:>12} {:>7} {:>6} {:>6}",
        "player", "tiles", "troops", "gold", "cities", "silos", "alive"
    );
    for id in game.all_players() {
        let p = game.player(id);
        println!(
            "{:<16} {:>8} {:>10.0} {:>12} {:>7} {:>6} {:>6}",
            p.name(),
            p.num_tiles_owned(),
            p.troops(),
            p.gold(),
            p.units_owned(UnitType::City),
            p.units_owned(UnitType::MissileSilo),
            p.is_alive()
        );
    }
    match game.winner() {
        Some(Winner::Player(id)) => println!("winner: {}", game.player(id).name()),
        Some(Winner::Team(team)) => println!("winner: team {}", team.0),
        None => println!("winner: none"),
    }
    println!("ticks: {}", game.ticks());
    println!("checksum: {:016x}", game.checksum());

    Ok(())
}
