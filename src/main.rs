//! ampcore - masked-pane console monitor
//!
//! Runs one caller session against a local terminal. Typed text is staged
//! into the masked pane as it is edited and lines are fed through the `&`
//! call scanner on Enter, so the standard opcodes can be driven by hand.
//!
//! # Quick Start
//!
//! ```text
//! ampcore                          # Interactive monitor
//! ampcore --script demo.amp        # Run a script headless, dump the screen
//! ampcore --init-config            # Write ~/.ampcore/config.toml
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Run the input line |
//! | F1 | Toggle carrier |
//! | F2 | Toggle pause |
//! | F3 | Toggle abort |
//! | F5 | Restart session |
//! | Esc, Ctrl+C | Quit |

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ampcore::config::{home_dir, Config};
use ampcore::dispatch::builtins::{self, op};
use ampcore::session::{Session, SessionManager};
use ampcore::ui::{dump_text, InputLine, KeyMapper, MonitorAction, Renderer};

/// Command line options
#[derive(Default)]
struct Args {
    /// Script to run headless instead of the monitor
    script: Option<PathBuf>,
    /// Extra ticks after the last script line
    ticks: u32,
    /// Config file overriding ~/.ampcore/config.toml
    config: Option<PathBuf>,
    /// Write the default config and exit
    init_config: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("ampcore {}", VERSION);
}

fn print_help() {
    eprintln!("ampcore {} - masked-pane console and ampersand dispatch monitor", VERSION);
    eprintln!();
    eprintln!("Usage: ampcore [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  (default)             Interactive monitor");
    eprintln!("  --script <FILE>       Run FILE line by line, then print the screen");
    eprintln!("  --ticks <N>           Extra ticks after the script (default 1)");
    eprintln!("  --config <FILE>       Use FILE instead of ~/.ampcore/config.toml");
    eprintln!("  --init-config         Write the default configuration and exit");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Monitor keys:");
    eprintln!("  Enter                 Run the input line (e.g. &2,65,3:&3)");
    eprintln!("  Ctrl+U                Clear the input line");
    eprintln!("  F1 / F2 / F3          Toggle carrier / pause / abort");
    eprintln!("  F5                    Restart the session");
    eprintln!("  Esc, Ctrl+C           Quit");
    eprintln!();
    eprintln!("Standard opcodes:");
    eprintln!("  &1,c     fill colour          &7,u     carrier up/down");
    eprintln!("  &2,g,c   stage a filled row   &8       spinner step");
    eprintln!("  &3       commit the pane      &9,lo,hi idle seconds");
    eprintln!("  &4       restore the pane     &10      blink step");
    eprintln!("  &5,on    pause indicator      &11,x,g  poke pane column");
    eprintln!("  &6,on    abort indicator");
    eprintln!();
    eprintln!("Palettes: pepto, green-phosphor, amber");
    eprintln!("Logging: ~/.ampcore/ampcore.log, filter with AMPCORE_LOG");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        ticks: 1,
        ..Args::default()
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--script" => {
                i += 1;
                let path = args.get(i).ok_or("Missing script argument")?;
                parsed.script = Some(PathBuf::from(path));
            }
            "--ticks" => {
                i += 1;
                let value = args.get(i).ok_or("Missing tick count")?;
                parsed.ticks = value
                    .parse()
                    .map_err(|_| format!("Invalid tick count: {}", value))?;
            }
            "--config" => {
                i += 1;
                let path = args.get(i).ok_or("Missing config argument")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--init-config" => {
                parsed.init_config = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.ampcore/ampcore.log; the terminal belongs to the monitor
fn init_logging() {
    let log_path = home_dir()
        .map(|h| h.join(".ampcore").join("ampcore.log"))
        .unwrap_or_else(|| PathBuf::from("ampcore.log"));

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("AMPCORE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("ampcore {} starting", VERSION);

    if args.init_config {
        Config::default()
            .save()
            .map_err(anyhow::Error::msg)
            .context("Could not write the default configuration")?;
        eprintln!("Wrote ~/.ampcore/config.toml");
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Could not load {}", path.display()))?,
        None => Config::load(),
    };

    match &args.script {
        Some(path) => run_script(&config, path, args.ticks),
        None => run_monitor(&config),
    }
}

/// Run a script headless and print the final screen
fn run_script(config: &Config, path: &Path, extra_ticks: u32) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let options = config.session_options()?;
    let tick = config.tick_interval();

    let mut session = Session::new(1, builtins::standard_table(), options)?;
    session.carrier_event(true);
    session.tick(tick);

    let mut failures = 0usize;
    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match session.run_line(line) {
            Ok(outcome) => {
                for text in &outcome.text {
                    debug!("line {}: unevaluated {:?}", line_no, text);
                }
                for e in &outcome.errors {
                    eprintln!("line {}: {}", line_no, e);
                }
                failures += outcome.errors.len();
            }
            Err(e) => {
                eprintln!("line {}: {}", line_no, e);
                failures += 1;
            }
        }

        for e in session.tick(tick).errors {
            eprintln!("line {}: {}", line_no, e);
            failures += 1;
        }
        if !session.is_running() {
            eprintln!("line {}: session stopped", line_no);
            break;
        }
    }

    for _ in 0..extra_ticks {
        for e in session.tick(tick).errors {
            eprintln!("tick: {}", e);
            failures += 1;
        }
    }

    print!("{}", dump_text(&session.console.screen));
    info!("Script {} finished with {} error(s)", path.display(), failures);
    if failures > 0 {
        eprintln!("{} error(s)", failures);
    }
    Ok(())
}

/// Interactive monitor
fn run_monitor(config: &Config) -> anyhow::Result<()> {
    let options = config.session_options()?;
    let tick = config.tick_interval();
    let status_row = options.rows;

    let mut manager = SessionManager::new(builtins::standard_table(), options);
    manager.create_session()?.carrier_event(true);

    let mut renderer = Renderer::new(config.get_palette(), config.screen.background);
    renderer.init()?;

    let result = run_main_loop(&mut manager, &mut renderer, tick, status_row);

    renderer.cleanup()?;
    if let Err(e) = &result {
        error!("Monitor error: {}", e);
    }
    info!("ampcore exiting");
    result
}

fn run_main_loop(
    manager: &mut SessionManager,
    renderer: &mut Renderer,
    tick: Duration,
    status_row: u16,
) -> anyhow::Result<()> {
    let mut input = InputLine::new();
    let mut message = String::from("F1 carrier  F2 pause  F3 abort  F5 restart  Esc quit");
    let mut last_tick = Instant::now();

    loop {
        let Some(session) = manager.active_mut() else {
            info!("No running session left");
            return Ok(());
        };

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    let Some(action) = KeyMapper::map(&key) else {
                        continue;
                    };
                    session.note_activity();
                    match action {
                        MonitorAction::Quit => return Ok(()),
                        MonitorAction::Insert(_) | MonitorAction::Backspace | MonitorAction::ClearLine => {
                            input.edit(action);
                        }
                        MonitorAction::Submit => {
                            message = submit_line(session, &input.submit());
                        }
                        MonitorAction::ToggleCarrier => {
                            let up = session.console.indicators.carrier() != Some(true);
                            session.carrier_event(up);
                        }
                        MonitorAction::TogglePause => {
                            let on = !session.console.indicators.paused();
                            if let Err(e) = session.call(op::PAUSE, u8::from(on), 0) {
                                message = e.to_string();
                            }
                        }
                        MonitorAction::ToggleAbort => {
                            let on = !session.console.indicators.aborted();
                            if let Err(e) = session.call(op::ABORT, u8::from(on), 0) {
                                message = e.to_string();
                            }
                        }
                        MonitorAction::Restart => {
                            session.restart()?;
                            session.carrier_event(true);
                            message = format!("Session {} restarted", session.id);
                        }
                    }
                }
                Event::Resize(_, _) => session.console.screen.mark_all_dirty(),
                _ => {}
            }
        }

        if last_tick.elapsed() < tick {
            continue;
        }
        let dt = last_tick.elapsed();
        last_tick = Instant::now();

        // An edited input line becomes the pane payload. Submitting clears the
        // line without staging, so whatever the line's opcodes drew stays up.
        if let Some(session) = manager.active_mut() {
            if let Some(row) = input.take_payload(session.console.staging.fill_colour()) {
                session.console.stage(&row.glyphs, &row.colours)?;
                session.request_commit();
            }
        }

        for (id, report) in manager.tick_all(dt) {
            for e in report.errors {
                warn!("Session {}: {}", id, e);
                message = e.to_string();
            }
        }

        if let Some(session) = manager.active_mut() {
            renderer.render(&mut session.console.screen)?;
            let carrier = match session.console.indicators.carrier() {
                Some(true) => "up",
                Some(false) => "down",
                None => "-",
            };
            let status = format!(
                "session {} | carrier {} | blink {} | idle {}s",
                session.id,
                carrier,
                session.console.blink.state(),
                session.idle_seconds()
            );
            renderer.render_status(status_row, &status)?;
            renderer.render_status(status_row + 1, &message)?;
        }
    }
}

/// Run one typed line and summarise the outcome for the message line
fn submit_line(session: &mut Session, line: &str) -> String {
    match session.run_line(line) {
        Ok(outcome) => match outcome.errors.first() {
            Some(e) => format!("{} call(s), {} error(s): {}", outcome.calls, outcome.errors.len(), e),
            None if !outcome.text.is_empty() => {
                format!("{} call(s), ignored {:?}", outcome.calls, outcome.text.join(":"))
            }
            None => format!("{} call(s)", outcome.calls),
        },
        Err(e) => e.to_string(),
    }
}
