use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AgentId, Time,
    agent::{Agent, AgentType, InfectionStatus},
    error::{AbmError, Result},
    floor::Building,
    location::Location,
    policy::{NoPreemption, PreemptionPolicy},
    task::{TaskProgress, TaskType},
};

/// Whether rooms carry geometry or only connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationMode {
    Spatial,
    Topological,
}

/// Settings for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    pub description: String,
    pub mode: SimulationMode,
    /// Number of ticks the run lasts.
    pub total_simulation_time: Time,
    /// Whether agents write their state into a trajectory buffer every tick.
    pub record: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            name: "amr-hub".to_string(),
            description: String::new(),
            mode: SimulationMode::Spatial,
            total_simulation_time: 100,
            record: false,
        }
    }
}

/// State of one agent after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub location: Location,
    pub heading: f64,
    pub interaction_radius: f64,
    pub agent_type: AgentType,
    pub infection_status: InfectionStatus,
    pub active_task: Option<(TaskType, TaskProgress)>,
}

impl AgentSnapshot {
    fn of(agent: &Agent) -> Self {
        AgentSnapshot {
            id: agent.id(),
            location: agent.location().clone(),
            heading: agent.heading(),
            interaction_radius: agent.interaction_radius(),
            agent_type: agent.agent_type(),
            infection_status: agent.infection_status(),
            active_task: agent
                .active_task()
                .map(|task| (task.task_type(), task.progress())),
        }
    }
}

/// Everything an observer gets to see after tick `time` has been processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSnapshot {
    pub time: Time,
    pub agents: Vec<AgentSnapshot>,
}

/// Receives a snapshot after every tick.
pub trait SimulationObserver {
    fn on_step(&mut self, snapshot: &StepSnapshot);
}

/// Owns the building, the agents and the clock.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    buildings: Vec<Building>,
    agents: Vec<Agent>,
    time: Time,
    policy: Box<dyn PreemptionPolicy>,
}

impl Simulation {
    /// Creates a simulation at time zero.
    ///
    /// Every room must match the configured mode. When recording is on each
    /// agent gets a trajectory buffer covering the whole run.
    pub fn new(
        config: SimulationConfig,
        buildings: Vec<Building>,
        mut agents: Vec<Agent>,
    ) -> Result<Self> {
        if config.total_simulation_time < 0 {
            return Err(AbmError::NegativeTime(config.total_simulation_time));
        }

        let spatial = config.mode == SimulationMode::Spatial;
        if let Some(room) = buildings
            .iter()
            .flat_map(Building::rooms)
            .find(|room| room.is_spatial() != spatial)
        {
            return Err(AbmError::SimulationMode(format!(
                "Room {} does not match the {:?} simulation mode.",
                room.name(),
                config.mode
            )));
        }

        if config.record {
            let capacity = config.total_simulation_time as usize;
            for agent in &mut agents {
                agent.allocate_trajectory(capacity);
            }
        }

        info!(
            name = %config.name,
            mode = ?config.mode,
            agents = agents.len(),
            total = config.total_simulation_time,
            "simulation created"
        );

        Ok(Simulation {
            config,
            buildings,
            agents,
            time: 0,
            policy: Box::new(NoPreemption),
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn PreemptionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn mode(&self) -> SimulationMode {
        self.config.mode
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn total_simulation_time(&self) -> Time {
        self.config.total_simulation_time
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.config.total_simulation_time
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id() == id)
    }

    pub fn snapshot(&self) -> StepSnapshot {
        StepSnapshot {
            time: self.time,
            agents: self.agents.iter().map(AgentSnapshot::of).collect(),
        }
    }

    /// Advances every agent by one tick, in an order shuffled with `rng`.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.advance(rng, None)
    }

    /// Like [`Simulation::step`], then hands `observer` a snapshot.
    pub fn step_observed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        observer: &mut dyn SimulationObserver,
    ) -> Result<()> {
        self.advance(rng, Some(observer))
    }

    /// Steps until the total simulation time is reached.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        while !self.is_finished() {
            self.advance(rng, None)?;
        }
        Ok(())
    }

    pub fn run_observed<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        observer: &mut dyn SimulationObserver,
    ) -> Result<()> {
        while !self.is_finished() {
            self.advance(rng, Some(&mut *observer))?;
        }
        Ok(())
    }

    fn advance<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        observer: Option<&mut dyn SimulationObserver>,
    ) -> Result<()> {
        if self.is_finished() {
            return Err(AbmError::Time(format!(
                "Simulation has already reached its total simulation time of {}.",
                self.config.total_simulation_time
            )));
        }

        let mut order: Vec<usize> = (0..self.agents.len()).collect();
        order.shuffle(rng);

        for idx in order {
            self.agents[idx].step(self.time, self.config.record, self.policy.as_ref())?;
        }

        if let Some(observer) = observer {
            observer.on_step(&self.snapshot());
        }

        debug!(time = self.time, "tick processed");
        self.time += 1;
        Ok(())
    }
}
