mod config;
mod game;
mod input;
mod machine;
mod snake;
mod term;

use std::{fs::File, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use rand::{rngs::StdRng, SeedableRng};
use simplelog::WriteLogger;

use config::Config;
use machine::GameMachine;

pub type TermInt = u16;
pub type Coords = (u16, u16);

/// A snake game you are not supposed to win.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// YAML file overriding tick rate and timeouts
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "impossible-snake.log")]
    log_file: PathBuf,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Seed for food placement
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log to a file; stdout belongs to the game screen
    let log_file = File::create(&cli.log_file)
        .with_context(|| format!("failed to create log file {}", cli.log_file.display()))?;
    WriteLogger::init(cli.log_level, simplelog::Config::default(), log_file)
        .context("failed to initialize logger")?;

    info!("==== Impossible Snake Game ====");
    info!("Controls: arrow keys or WASD to move, Esc to quit");
    info!("Press SPACE or click RESTART to immediately restart after game over");

    let config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    info!("Using {:?}", config);

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut machine = GameMachine::with_rng(config.clone(), rng);

    let mut game = game::SnakeGame::new(config).context("failed to open terminal")?;
    // initialize() restores the terminal itself if setup fails halfway
    game.initialize()?;

    // The terminal must be restored whether or not the loop failed
    let played = game.play(&mut machine);
    game.shutdown().context("failed to restore terminal")?;
    played.context("terminal I/O failed")?;

    info!("Bye");
    Ok(())
}
