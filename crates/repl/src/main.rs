use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread::JoinHandle;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use crossbeam_channel::Receiver;
use debugger::{
    AttachSession, BreakpointHandle, Event, ProcessInfo, SearchPathResolver, SourcePosition,
    SuspendContext,
};
use tracing_subscriber::filter::EnvFilter;
use transport::Line;

/// A `file:line` location given on the command line or at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    file: PathBuf,
    line: Line,
}

impl FromStr for Location {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| eyre::eyre!("expected file:line, got {s:?}"))?;
        eyre::ensure!(!file.is_empty(), "missing file in {s:?}");
        let line = line
            .parse()
            .wrap_err_with(|| format!("invalid line number in {s:?}"))?;
        Ok(Self {
            file: PathBuf::from(file),
            line,
        })
    }
}

impl Location {
    /// Breakpoints are keyed by canonical path, like resolved scripts
    fn to_position(&self) -> SourcePosition {
        let file = debugger::utils::normalise_path(&self.file);
        let file = file.canonicalize().unwrap_or_else(|_| file.into_owned());
        SourcePosition::new(file, self.line)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Break(Location),
    Delete(Location),
    DeleteHandle(u64),
    List,
    StepOver,
    StepInto,
    Where,
    Scripts,
    Quit,
    Empty,
}

impl FromStr for Input {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = words.next();
        let argument = words.next();
        eyre::ensure!(words.next().is_none(), "too many arguments in {s:?}");

        let input = match (command, argument) {
            (None, _) => Input::Empty,
            (Some("b"), Some(location)) => Input::Break(location.parse()?),
            (Some("d"), Some(handle)) if handle.starts_with('#') => Input::DeleteHandle(
                handle[1..]
                    .parse()
                    .wrap_err_with(|| format!("invalid breakpoint {handle:?}"))?,
            ),
            (Some("d"), Some(location)) => Input::Delete(location.parse()?),
            (Some("l"), None) => Input::List,
            (Some("n"), None) => Input::StepOver,
            (Some("s"), None) => Input::StepInto,
            (Some("w"), None) => Input::Where,
            (Some("scripts"), None) => Input::Scripts,
            (Some("q"), None) => Input::Quit,
            (Some(other), _) => eyre::bail!("unhandled command: '{other}'"),
        };
        Ok(input)
    }
}

struct App {
    session: AttachSession,
    suspended: Option<SuspendContext>,
    next_handle: u64,
    session_events: Receiver<Event>,
    input_rx: Receiver<String>,

    #[allow(dead_code)]
    input_thread: JoinHandle<()>,
}

impl App {
    fn new(session: AttachSession) -> Self {
        let session_events = session.events();

        // handle input
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let input_thread = std::thread::spawn(move || {
            let mut buffer = String::new();
            loop {
                match std::io::stdin().read_line(&mut buffer) {
                    Ok(0) => break,
                    Ok(_) => {
                        if input_tx.send(buffer.trim().to_owned()).is_err() {
                            break;
                        }
                        buffer.clear();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading from stdin");
                        break;
                    }
                }
            }
        });

        Self {
            session,
            suspended: None,
            next_handle: 1,
            session_events,
            input_rx,
            input_thread,
        }
    }

    fn loop_step(&mut self) -> eyre::Result<ShouldQuit> {
        print!("> ");
        std::io::stdout().flush()?;

        crossbeam_channel::select! {
            recv(self.input_rx) -> input => match input {
                Ok(input) => self.handle_input(&input).context("handling command"),
                // stdin closed
                Err(_) => Ok(ShouldQuit::True),
            },
            recv(self.session_events) -> event => match event {
                Ok(event) => self.handle_session_event(event).context("handling session event"),
                Err(_) => Ok(ShouldQuit::True),
            },
        }
    }

    #[tracing::instrument(skip(self))]
    fn handle_session_event(&mut self, event: Event) -> eyre::Result<ShouldQuit> {
        match event {
            Event::Output(text) => println!("{text}"),
            Event::Suspended(context) => {
                println!(
                    "stopped at {} (breakpoint {})",
                    context.position, context.breakpoint
                );
                self.suspended = Some(context);
            }
            Event::UnmatchedBreak { name, line, file } => match file {
                Some(file) => println!(
                    "target stopped at {}:{line} without a breakpoint",
                    file.display()
                ),
                None => println!("target stopped in unknown script {name}:{line}"),
            },
            Event::Ended => {
                println!("session ended");
                return Ok(ShouldQuit::True);
            }
        }
        Ok(ShouldQuit::False)
    }

    fn handle_input(&mut self, input: &str) -> eyre::Result<ShouldQuit> {
        let input = match input.parse::<Input>() {
            Ok(input) => input,
            Err(e) => {
                println!("{e}");
                return Ok(ShouldQuit::False);
            }
        };

        match input {
            Input::Break(location) => {
                let handle = self.add_breakpoint(&location);
                println!("breakpoint {handle} at {}", location.to_position());
            }
            Input::Delete(location) => match self.session.unregister_at(&location.to_position()) {
                Some(handle) => println!("deleted breakpoint {handle}"),
                None => println!("no breakpoint at {}", location.to_position()),
            },
            Input::DeleteHandle(id) => {
                if !self.session.unregister_breakpoint(BreakpointHandle(id)) {
                    println!("no breakpoint #{id}");
                }
            }
            Input::List => {
                for (position, handle) in self.session.breakpoints() {
                    println!("{handle}\t{position}");
                }
            }
            Input::StepOver => {
                tracing::debug!("executing step over command");
                self.session.step_over().context("stepping over")?;
                self.suspended = None;
            }
            Input::StepInto => {
                tracing::debug!("executing step into command");
                self.session.step_into().context("stepping into")?;
                self.suspended = None;
            }
            Input::Where => match &self.suspended {
                Some(context) => println!("{}", context.position),
                None => println!("???"),
            },
            Input::Scripts => {
                for (file, index) in self.session.loaded_scripts() {
                    println!("{index}\t{}", file.display());
                }
            }
            Input::Quit => {
                self.session.stop();
                return Ok(ShouldQuit::True);
            }
            Input::Empty => {}
        }
        Ok(ShouldQuit::False)
    }

    fn add_breakpoint(&mut self, location: &Location) -> BreakpointHandle {
        let handle = BreakpointHandle(self.next_handle);
        self.next_handle += 1;
        if let Some(replaced) = self
            .session
            .register_breakpoint(location.to_position(), handle)
        {
            tracing::debug!(%replaced, "breakpoint replaced");
        }
        handle
    }
}

/// Attach to a Lua interpreter and debug it from the terminal
#[derive(Debug, Parser)]
struct Args {
    /// Configuration file, defaults to the user configuration if present
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long)]
    host: Option<String>,

    #[clap(short, long)]
    port: Option<u16>,

    /// Directory to look up script sources in
    #[clap(short, long = "root")]
    roots: Vec<PathBuf>,

    /// Process id of the attached interpreter, for display
    #[clap(long)]
    pid: Option<u32>,

    /// Name of the attached process, for display
    #[clap(long, default_value = "lua")]
    name: String,

    /// Breakpoints to set once attached, as file:line
    #[clap(short, long)]
    breakpoints: Vec<Location>,
}

fn load_config(args: &Args) -> eyre::Result<config::AttachConfig> {
    let mut config = config::load_or_default(args.config.as_deref()).context("loading config")?;
    if let Some(host) = &args.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    config.sources.roots.extend(args.roots.iter().cloned());
    if config.sources.roots.is_empty() {
        config.sources.roots.push(current_dir()?);
    }
    Ok(config)
}

fn current_dir() -> eyre::Result<PathBuf> {
    std::env::current_dir().context("getting current directory")
}

fn init_tracing() {
    if std::io::stderr().is_terminal() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(?config, "loaded configuration");

    let resolver = SearchPathResolver::from_config(&config.sources);
    let process = ProcessInfo {
        pid: args.pid,
        name: args.name.clone(),
    };
    let session =
        AttachSession::connect(&config, resolver, process).context("attaching to process")?;
    println!(
        "attached to {} at {}",
        session.process().name,
        config.connection.address()
    );

    let mut app = App::new(session);
    for location in &args.breakpoints {
        tracing::debug!(?location, "adding breakpoint");
        app.add_breakpoint(location);
    }

    loop {
        match app.loop_step() {
            Ok(ShouldQuit::True) => break,
            Ok(ShouldQuit::False) => {}
            Err(e) => eyre::bail!("Error running command: {e}"),
        }
    }

    Ok(())
}

enum ShouldQuit {
    True,
    False,
}
