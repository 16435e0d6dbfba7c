use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use chrono::{Local, Utc};
use reflex::{
    app::{App, Flow},
    app_dirs::AppDirs,
    clock::{Clock, MonotonicClock},
    config::{ConfigStore, FileConfigStore},
    daily::{daily_challenge, streak},
    game::GameKind,
    input::command_for,
    leaderboard::{export_csv, game_stats, played_ago, top_results},
    runtime::{CrosstermEventSource, FixedTicker, ReflexEvent, Runner},
    store::{SqliteStore, Store},
};

const TICK_RATE_MS: u64 = 16;

/// reaction-time mini-games in the terminal
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Eight reaction mini-games driven by one round engine, with a local leaderboard, a daily challenge and a play streak."
)]
pub struct Cli {
    /// results database (defaults to the state directory)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// game rules file (json)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Cmd {
    /// play a game
    Play {
        #[clap(value_enum)]
        game: Option<GameKind>,

        /// play today's daily challenge
        #[clap(long, conflicts_with = "game")]
        daily: bool,
    },
    /// list the games
    List,
    /// show high scores
    Leaderboard {
        #[clap(value_enum)]
        game: Option<GameKind>,

        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// show today's challenge and the current streak
    Daily,
    /// write every result as csv to stdout
    Export,
    /// delete every stored result and the streak
    Reset {
        #[clap(long)]
        yes: bool,
    },
}

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    // The terminal belongs to the game; log lines go to a file.
    let file = AppDirs::log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    // A second init (tests) is harmless.
    let _ = builder.try_init();
}

fn open_store(cli: &Cli) -> reflex::Result<SqliteStore> {
    match &cli.db {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_default(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command.clone().unwrap_or(Cmd::Play {
        game: None,
        daily: false,
    }) {
        Cmd::Play { game, daily } => play(&cli, game, daily)?,
        Cmd::List => {
            for game in GameKind::ALL {
                println!("{:<16}{:<18}{}", game.to_string(), game.name(), game.description());
            }
        }
        Cmd::Leaderboard { game, limit } => leaderboard(&cli, game, limit)?,
        Cmd::Daily => {
            let mut store = open_store(&cli)?;
            let today = Local::now().date_naive();
            let game = daily_challenge(&mut store, today, &mut rand::thread_rng())?;
            let streak = streak(&store)?;
            println!("today: {} ({})", game.name(), game);
            println!("streak: {}", streak.count);
        }
        Cmd::Export => {
            let store = open_store(&cli)?;
            let rows = export_csv(&store, io::stdout().lock())?;
            info!("exported {rows} results");
        }
        Cmd::Reset { yes } => {
            if !yes {
                let mut cmd = Cli::command();
                cmd.error(
                    ErrorKind::MissingRequiredArgument,
                    "reset deletes every result; pass --yes to confirm",
                )
                .exit();
            }
            let mut store = open_store(&cli)?;
            store.clear_all()?;
            println!("all results cleared");
        }
    }

    Ok(())
}

fn leaderboard(cli: &Cli, game: Option<GameKind>, limit: usize) -> Result<(), Box<dyn Error>> {
    let store = open_store(cli)?;
    let now = Utc::now();

    match game {
        Some(game) => {
            let top = top_results(&store, game, limit)?;
            if top.is_empty() {
                println!("no results for {} yet", game.name());
            }
            for (rank, record) in top.iter().enumerate() {
                println!(
                    "{:>3}. {:>6}  {:>7.2}s  {}{}",
                    rank + 1,
                    record.score,
                    record.elapsed_ms as f64 / 1000.0,
                    played_ago(record, now),
                    if record.is_new_high_score { "  *" } else { "" }
                );
            }
        }
        None => {
            let stats = game_stats(&store)?;
            if stats.is_empty() {
                println!("no results yet");
            }
            for s in stats {
                println!(
                    "{:<18}{:>4} plays  best {:>6}  fastest {:>7.2}s  avg {:.1}",
                    s.game.name(),
                    s.plays,
                    s.high_score,
                    s.best_time_ms as f64 / 1000.0,
                    s.average_score
                );
            }
        }
    }
    Ok(())
}

fn play(cli: &Cli, game: Option<GameKind>, daily: bool) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = config_store.load()?;
    let mut store = open_store(cli)?;

    let game = match game {
        Some(game) => game,
        None if daily => daily_challenge(
            &mut store,
            Local::now().date_naive(),
            &mut rand::thread_rng(),
        )?,
        None => GameKind::ReflexTap,
    };
    info!("starting {game} (daily: {daily})");

    let mut app = App::new(game, config, store, MonotonicClock::new(), daily)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen,
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &outcome {
        warn!("game loop failed: {e}");
    }
    outcome
}

fn start_tui<B: Backend, S: Store, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            ReflexEvent::Tick => app.on_tick(),
            ReflexEvent::Resize => {}
            ReflexEvent::Key(key) => {
                if let Some(command) = command_for(key) {
                    if app.on_command(command) == Flow::Quit {
                        break;
                    }
                }
            }
            ReflexEvent::Mouse(mouse) => app.on_click(mouse.column, mouse.row),
        }
    }

    Ok(())
}
