mod ward;

use amr_hub_core::{
    Time,
    agent::{Agent, AgentType, InfectionStatus},
    policy::{NoPreemption, PreemptionPolicy, PriorityPreemption},
    raster::Tile,
    simulation::{Simulation, SimulationConfig, SimulationMode},
    task::TaskProgress,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::ward::{FLOOR, Ward};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Seed for agent placement and the per-tick agent order
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 600)]
    steps: Time,

    /// Number of healthcare workers
    #[arg(short, long, default_value_t = 3)]
    workers: usize,

    /// Number of patients
    #[arg(short, long, default_value_t = 6)]
    patients: usize,

    /// Milliseconds between ticks in the terminal view
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Cells per building unit in the floor view
    #[arg(long, default_value_t = 4.0)]
    resolution: f64,

    /// Run without the terminal view and log progress instead
    #[arg(long)]
    headless: bool,

    /// Keep a trajectory buffer for every agent
    #[arg(long)]
    record: bool,

    /// Let urgent tasks interrupt a worker walking to a less urgent one
    #[arg(long)]
    preempt: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            name: "demo-ward".to_string(),
            description: format!(
                "{} workers visiting {} patients in a three-bay ward",
                self.workers, self.patients
            ),
            mode: SimulationMode::Spatial,
            total_simulation_time: self.steps,
            record: self.record,
        }
    }

    fn policy(&self) -> Box<dyn PreemptionPolicy> {
        if self.preempt {
            Box::new(PriorityPreemption)
        } else {
            Box::new(NoPreemption)
        }
    }
}

struct App {
    /// The running simulation.
    simulation: Simulation,
    /// Drives the agent order each tick.
    rng: StdRng,
    /// Cells per unit for the floor view.
    resolution: f64,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Set when a step fails; the simulation is frozen afterwards.
    failure: Option<String>,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(args.seed);
        let ward = Ward::build(&mut rng, args.workers, args.patients, args.steps)?;
        let simulation = Simulation::new(args.config(), ward.buildings, ward.agents)?
            .with_policy(args.policy());
        Ok(App {
            simulation,
            rng,
            resolution: args.resolution,
            should_quit: false,
            failure: None,
        })
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.failure.is_some() || self.simulation.is_finished() {
            return;
        }
        if let Err(err) = self.simulation.step(&mut self.rng) {
            self.failure = Some(err.to_string());
        }
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.steps < 0 {
        return Err(anyhow!("steps must be non-negative, got {}", args.steps));
    }
    if !(args.resolution > 0.0) {
        return Err(anyhow!("resolution must be positive, got {}", args.resolution));
    }

    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
        return run_headless(&args);
    }

    let mut app = App::new(&args)?;
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    result
}

/// Runs the whole simulation without a terminal view, logging a summary
/// every fifty ticks and the final task states.
fn run_headless(args: &Args) -> Result<()> {
    let mut app = App::new(args)?;
    info!(
        name = app.simulation.name(),
        description = app.simulation.description(),
        seed = args.seed,
        "starting headless run"
    );

    while !app.simulation.is_finished() {
        let now = app.simulation.time();
        if let Err(err) = app.simulation.step(&mut app.rng) {
            error!(time = now, fatal = err.is_fatal(), "step failed: {err}");
            return Err(err.into());
        }
        if now % 50 == 0 {
            let counts = task_counts(app.simulation.agents());
            info!(
                time = now,
                moving = counts.moving,
                working = counts.working,
                done = counts.done,
                "tick"
            );
        }
    }

    for agent in app.simulation.agents() {
        if agent.tasks().is_empty() {
            continue;
        }
        let completed: Vec<String> = agent
            .tasks()
            .iter()
            .filter_map(|t| t.time_completed().map(|at| format!("{}@{at}", t.task_type())))
            .collect();
        info!(
            agent = agent.id(),
            tasks = agent.tasks().len(),
            completed = %completed.join(", "),
            "final task state"
        );
    }
    Ok(())
}

#[derive(Debug, Default)]
struct TaskCounts {
    moving: usize,
    working: usize,
    done: usize,
}

fn task_counts(agents: &[Agent]) -> TaskCounts {
    let mut counts = TaskCounts::default();
    for task in agents.iter().flat_map(|a| a.tasks()) {
        match task.progress() {
            TaskProgress::MovingToLocation => counts.moving += 1,
            TaskProgress::InProgress => counts.working += 1,
            TaskProgress::Completed => counts.done += 1,
            _ => {}
        }
    }
    counts
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(35),
            Constraint::Percentage(10),
        ])
        .split(frame.area());

    render_floor(frame, main_layout[0], app);
    render_agents(frame, main_layout[1], app.simulation.agents());

    let sim = &app.simulation;
    let status = match &app.failure {
        Some(failure) => format!("Stopped: {failure}"),
        None if sim.is_finished() => format!("Finished at t={}", sim.time()),
        None => format!("t={}/{}", sim.time(), sim.total_simulation_time()),
    };
    let help_text = Paragraph::new(format!("{status}   Press 'q' or 'Esc' to quit."))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn agent_span(agent: Option<&Agent>) -> Span<'static> {
    let Some(agent) = agent else {
        return Span::styled("@", Style::default().fg(Color::White).bold());
    };
    let symbol = match agent.agent_type() {
        AgentType::Patient => "P",
        AgentType::HealthcareWorker => "W",
        AgentType::Generic => "@",
    };
    let color = match agent.infection_status() {
        InfectionStatus::Infected => Color::Red,
        InfectionStatus::Exposed => Color::Yellow,
        InfectionStatus::Recovered => Color::Green,
        InfectionStatus::Susceptible => Color::Cyan,
    };
    Span::styled(symbol, Style::default().fg(color).bold())
}

/// Renders the ward floor plan with the agents on it.
fn render_floor(frame: &mut Frame, area: Rect, app: &App) {
    let sim = &app.simulation;
    let block = Block::default()
        .title(format!("{} (floor {FLOOR})", sim.name()))
        .borders(Borders::ALL);

    let floor = sim.buildings().first().and_then(|b| b.floor(FLOOR));
    let grid = match floor.map(|f| f.rasterize(app.resolution, sim.agents())) {
        Some(Ok(grid)) => grid,
        Some(Err(err)) => {
            frame.render_widget(Paragraph::new(err.to_string()).block(block), area);
            return;
        }
        None => {
            frame.render_widget(Paragraph::new("No floor to draw").block(block), area);
            return;
        }
    };

    let lines: Vec<Line> = grid
        .rows()
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .map(|tile| match tile {
                    Tile::Outside => Span::raw(" "),
                    Tile::Interior(_) => Span::styled(".", Style::default().fg(Color::DarkGray)),
                    Tile::Wall => Span::styled("#", Style::default().fg(Color::Gray)),
                    Tile::Door { open: true } => Span::styled("+", Style::default().fg(Color::Green)),
                    Tile::Door { open: false } => Span::styled("|", Style::default().fg(Color::Yellow)),
                    Tile::Agent(id) => agent_span(sim.agent(*id)),
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Renders one line per agent: position, heading and what it is doing.
fn render_agents(frame: &mut Frame, area: Rect, agents: &[Agent]) {
    let items: Vec<ListItem> = agents
        .iter()
        .map(|agent| {
            let location = agent.location();
            let activity = agent
                .active_task()
                .map(|task| format!("{} ({})", task.task_type(), task.progress()))
                .unwrap_or_else(|| "idle".to_string());
            let done = agent.tasks().iter().filter(|t| t.is_completed()).count();
            let info = format!(
                " #{:<3} ({:>5.2}, {:>5.2}) {:>5.1}°  {:<28} {done}/{} done",
                agent.id(),
                location.x,
                location.y,
                agent.heading(),
                activity,
                agent.tasks().len()
            );
            ListItem::from(Line::from(vec![agent_span(Some(agent)), Span::raw(info)]))
        })
        .collect();

    let agents_widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Agents"));
    frame.render_widget(agents_widget, area);
}
