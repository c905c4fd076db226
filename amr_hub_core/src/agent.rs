use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AgentId, Time,
    error::{AbmError, Result},
    floor::Building,
    geometry::Wall,
    location::Location,
    policy::PreemptionPolicy,
    room::Room,
    task::{Task, TaskProgress},
    trajectory::{TrajectoryBuffer, TrajectoryRecord},
};

/// Default reach of an agent, in building units.
pub const DEFAULT_INTERACTION_RADIUS: f64 = 0.05;
/// Default distance covered per tick.
pub const DEFAULT_MOVEMENT_SPEED: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    Generic,
    Patient,
    HealthcareWorker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfectionStatus {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
}

/// Folds `degrees` into `[0, 360)`.
///
/// `rem_euclid` rounds tiny negative inputs up to exactly `360.0`; those are
/// folded back to zero.
pub fn normalize_heading(degrees: f64) -> f64 {
    let heading = degrees.rem_euclid(360.0);
    if heading >= 360.0 { 0.0 } else { heading }
}

/// Rejects zero, negative and non-finite movement parameters.
fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AbmError::InvalidAgent(format!(
            "{name} must be positive and finite. Got {value}."
        )))
    }
}

/// Where an agent is, which way it faces and how it moves.
///
/// Kept apart from the task list so a task can steer its agent while the
/// agent's tasks are borrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub location: Location,
    /// Degrees in `[0, 360)`.
    pub heading: f64,
    pub interaction_radius: f64,
    pub movement_speed: f64,
}

impl Motion {
    /// Whether `target` is within the interaction radius.
    pub fn has_reached(&self, target: &Location) -> Result<bool> {
        Ok(self.location.distance_to(target)? <= self.interaction_radius)
    }

    /// Turns to face `target`. The heading is kept when already on top of it.
    pub fn rotate_heading(&mut self, target: &Location) -> Result<()> {
        self.location.check_scope(target)?;
        let (dx, dy) = (target.x - self.location.x, target.y - self.location.y);
        if dx != 0.0 || dy != 0.0 {
            self.heading = normalize_heading(dy.atan2(dx).to_degrees());
        }
        Ok(())
    }

    /// Moves one step of `movement_speed` straight towards `target`, stopping
    /// on it rather than overshooting.
    pub fn step_towards(&mut self, target: &Location) -> Result<()> {
        let distance = self.location.distance_to(target)?;
        if distance <= self.movement_speed {
            self.location.move_to(target.x, target.y, target.floor);
            return Ok(());
        }
        let scale = self.movement_speed / distance;
        let x = self.location.x + (target.x - self.location.x) * scale;
        let y = self.location.y + (target.y - self.location.y) * scale;
        self.location.move_to(x, y, target.floor);
        Ok(())
    }
}

/// An agent in the simulation: a patient, a healthcare worker or a generic
/// person moving through the building.
///
/// Tasks are only ever appended; finished tasks stay in the list as
/// [`TaskProgress::Completed`].
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    motion: Motion,
    tasks: Vec<Task>,
    agent_type: AgentType,
    infection_status: InfectionStatus,
    infection_details: BTreeMap<String, String>,
    trajectory: Option<TrajectoryBuffer>,
}

impl Agent {
    /// Creates a generic, susceptible agent. The heading is normalized into
    /// `[0, 360)`.
    pub fn new(id: AgentId, location: Location, heading: f64) -> Self {
        let heading = normalize_heading(heading);
        debug!(agent = id, %location, heading, "agent created");
        Agent {
            id,
            motion: Motion {
                location,
                heading,
                interaction_radius: DEFAULT_INTERACTION_RADIUS,
                movement_speed: DEFAULT_MOVEMENT_SPEED,
            },
            tasks: Vec::new(),
            agent_type: AgentType::Generic,
            infection_status: InfectionStatus::Susceptible,
            infection_details: BTreeMap::new(),
            trajectory: None,
        }
    }

    pub fn with_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    pub fn with_infection_status(mut self, status: InfectionStatus) -> Self {
        self.infection_status = status;
        self
    }

    /// Sets how close the agent must get to a target to reach it.
    ///
    /// Fails with [`AbmError::InvalidAgent`] unless `radius` is positive and
    /// finite.
    pub fn with_interaction_radius(mut self, radius: f64) -> Result<Self> {
        self.motion.interaction_radius = positive("Interaction radius", radius)?;
        Ok(self)
    }

    /// Sets the distance covered per tick.
    ///
    /// Fails with [`AbmError::InvalidAgent`] unless `speed` is positive and
    /// finite.
    pub fn with_movement_speed(mut self, speed: f64) -> Result<Self> {
        self.motion.movement_speed = positive("Movement speed", speed)?;
        Ok(self)
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.motion.location
    }

    pub fn heading(&self) -> f64 {
        self.motion.heading
    }

    pub fn interaction_radius(&self) -> f64 {
        self.motion.interaction_radius
    }

    pub fn movement_speed(&self) -> f64 {
        self.motion.movement_speed
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn infection_status(&self) -> InfectionStatus {
        self.infection_status
    }

    pub fn set_infection_status(&mut self, status: InfectionStatus) {
        self.infection_status = status;
    }

    /// Free-form notes attached by infection models.
    pub fn infection_details(&self) -> &BTreeMap<String, String> {
        &self.infection_details
    }

    pub fn set_infection_detail(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.infection_details.insert(key.into(), value.into());
    }

    pub fn trajectory(&self) -> Option<&TrajectoryBuffer> {
        self.trajectory.as_ref()
    }

    /// Allocates a trajectory buffer with one slot per tick.
    pub fn allocate_trajectory(&mut self, capacity: usize) {
        self.trajectory = Some(TrajectoryBuffer::new(capacity));
    }

    pub fn add_task(&mut self, task: Task) {
        debug!(agent = self.id, task = %task.task_type(), "task added");
        self.tasks.push(task);
    }

    pub fn rotate_heading(&mut self, target: &Location) -> Result<()> {
        self.motion.rotate_heading(target)
    }

    /// Teleports the agent.
    pub fn move_to(&mut self, location: Location) {
        self.motion.location = location;
    }

    pub fn has_reached(&self, target: &Location) -> Result<bool> {
        self.motion.has_reached(target)
    }

    /// Whether any wall body comes within the agent's interaction radius.
    pub fn intersects_walls(&self, walls: &[Wall]) -> bool {
        let point = self.motion.location.point();
        walls
            .iter()
            .any(|wall| wall.distance_to(point) <= self.motion.interaction_radius)
    }

    /// The spatial room the agent is standing in.
    pub fn current_room<'a>(&self, buildings: &'a [Building]) -> Option<&'a Room> {
        self.motion
            .location
            .which_room(buildings.iter().flat_map(Building::rooms))
    }

    /// The task the agent is currently working on or walking to.
    pub fn active_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.progress() == TaskProgress::InProgress)
            .or_else(|| {
                self.tasks
                    .iter()
                    .find(|t| t.progress() == TaskProgress::MovingToLocation)
            })
    }

    fn record(&mut self, now: Time) -> Result<()> {
        let record = TrajectoryRecord {
            location: self.motion.location.clone(),
            heading: self.motion.heading,
            infection_status: self.infection_status,
        };
        let buffer = self.trajectory.as_mut().ok_or_else(|| {
            AbmError::InvariantViolation(format!(
                "Agent {} has no trajectory buffer to record into.",
                self.id
            ))
        })?;
        buffer.record(now, record)
    }

    /// Performs at most one task action for tick `now`.
    ///
    /// Work in progress comes first, then the task being walked to, then the
    /// most urgent suspended task, then the most urgent not-started task that
    /// is due. With `record` set the agent's state is written to its
    /// trajectory before anything else happens.
    pub fn step(&mut self, now: Time, record: bool, policy: &dyn PreemptionPolicy) -> Result<()> {
        if record {
            self.record(now)?;
        }

        let in_progress = self.indices_with(TaskProgress::InProgress);
        if in_progress.len() > 1 {
            return Err(AbmError::InvariantViolation(format!(
                "Agent {} has {} tasks in progress.",
                self.id,
                in_progress.len()
            )));
        }
        if let Some(&idx) = in_progress.first() {
            return self.tasks[idx].advance(now, &mut self.motion);
        }

        let moving = self.indices_with(TaskProgress::MovingToLocation);
        if moving.len() > 1 {
            return Err(AbmError::InvariantViolation(format!(
                "Agent {} is moving towards {} tasks.",
                self.id,
                moving.len()
            )));
        }
        if let Some(&idx) = moving.first() {
            if policy.enabled()
                && let Some(candidate) = self.preemption_candidate(now)?
                && policy.should_preempt(&self.tasks[idx], &self.tasks[candidate])
            {
                debug!(agent = self.id, now, "moving task preempted");
                self.tasks[idx].suspend()?;
                return self.tasks[candidate].advance(now, &mut self.motion);
            }
            return self.tasks[idx].advance(now, &mut self.motion);
        }

        let suspended = self.most_urgent(self.indices_with(TaskProgress::Suspended));
        if let Some(idx) = suspended {
            return self.tasks[idx].advance(now, &mut self.motion);
        }

        if let Some(idx) = self.next_due_task(now)? {
            return self.tasks[idx].advance(now, &mut self.motion);
        }

        Ok(())
    }

    fn indices_with(&self, progress: TaskProgress) -> Vec<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.progress() == progress)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Highest priority among `indices`; the earliest task wins ties.
    fn most_urgent(&self, indices: Vec<usize>) -> Option<usize> {
        indices
            .into_iter()
            .rev()
            .max_by_key(|&idx| self.tasks[idx].priority)
    }

    /// Whether `task` must start now to be done on time, counting the ticks
    /// needed to walk there.
    fn is_due(&self, task: &Task, now: Time) -> Result<bool> {
        let distance = self.motion.location.distance_to(task.location())?;
        let travel = if distance == 0.0 {
            0.0
        } else {
            distance / self.motion.movement_speed
        };
        Ok(now as f64 >= task.latest_start(travel))
    }

    /// The most urgent not-started task that is due.
    fn next_due_task(&self, now: Time) -> Result<Option<usize>> {
        let mut due = Vec::new();
        for idx in self.indices_with(TaskProgress::NotStarted) {
            if self.is_due(&self.tasks[idx], now)? {
                due.push(idx);
            }
        }
        Ok(self.most_urgent(due))
    }

    /// Like [`Agent::next_due_task`], but only among tasks on the agent's own
    /// floor. A walk is never given up for work the agent cannot reach.
    fn preemption_candidate(&self, now: Time) -> Result<Option<usize>> {
        let mut due = Vec::new();
        for idx in self.indices_with(TaskProgress::NotStarted) {
            let task = &self.tasks[idx];
            if self.motion.location.same_scope(task.location()) && self.is_due(task, now)? {
                due.push(idx);
            }
        }
        Ok(self.most_urgent(due))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{NoPreemption, PriorityPreemption};
    use crate::task::{TaskKind, TaskPriority};

    fn hospital(x: f64, y: f64) -> Location {
        Location::new(x, y, 0, "Hospital")
    }

    fn goto(x: f64, y: f64, needed: Time, due: Time, priority: TaskPriority) -> Task {
        Task::new(
            TaskKind::GotoLocation {
                destination: hospital(x, y),
            },
            needed,
            due,
            priority,
        )
        .unwrap()
    }

    #[test]
    fn heading_is_normalized() {
        assert_eq!(Agent::new(0, hospital(0.0, 0.0), 370.0).heading(), 10.0);
        assert_eq!(Agent::new(0, hospital(0.0, 0.0), -90.0).heading(), 270.0);
    }

    #[test]
    fn rotate_heading_faces_target() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.rotate_heading(&hospital(0.0, -1.0)).unwrap();
        assert_eq!(agent.heading(), 270.0);
        agent.rotate_heading(&hospital(-1.0, 0.0)).unwrap();
        assert_eq!(agent.heading(), 180.0);
        agent.rotate_heading(&hospital(0.0, 0.0)).unwrap();
        assert_eq!(agent.heading(), 180.0);
    }

    #[test]
    fn has_reached_uses_interaction_radius() {
        let agent = Agent::new(0, hospital(0.0, 0.0), 0.0).with_interaction_radius(5.0).unwrap();
        assert!(agent.has_reached(&hospital(3.0, 4.0)).unwrap());
        assert!(!agent.has_reached(&hospital(3.0, 4.5)).unwrap());
        assert!(agent.has_reached(&Location::new(0.0, 0.0, 1, "Hospital")).is_err());
    }

    #[test]
    fn idle_agent_does_nothing() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.step(0, false, &NoPreemption).unwrap();
        assert_eq!(agent.location(), &hospital(0.0, 0.0));
    }

    #[test]
    fn task_waits_until_it_is_due() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        // 1.0 away at 0.1 per tick: 10 ticks of travel plus 5 of work.
        agent.add_task(goto(1.0, 0.0, 5, 20, TaskPriority::Medium));
        agent.step(4, false, &NoPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::NotStarted);
        agent.step(5, false, &NoPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::MovingToLocation);
    }

    #[test]
    fn higher_priority_due_task_is_chosen() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(0.0, 0.0, 1, 0, TaskPriority::Low));
        agent.add_task(goto(0.0, 0.0, 1, 0, TaskPriority::High));
        agent.add_task(goto(0.0, 0.0, 1, 0, TaskPriority::High));
        agent.step(0, false, &NoPreemption).unwrap();
        let progress: Vec<_> = agent.tasks().iter().map(Task::progress).collect();
        assert_eq!(
            progress,
            vec![
                TaskProgress::NotStarted,
                TaskProgress::InProgress,
                TaskProgress::NotStarted
            ]
        );
    }

    #[test]
    fn only_one_action_per_tick() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(0.0, 0.0, 2, 0, TaskPriority::Medium));
        agent.add_task(goto(0.0, 0.0, 2, 0, TaskPriority::Medium));
        for now in 0..3 {
            agent.step(now, false, &NoPreemption).unwrap();
        }
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::Completed);
        assert_eq!(agent.tasks()[1].progress(), TaskProgress::NotStarted);
        agent.step(3, false, &NoPreemption).unwrap();
        assert_eq!(agent.tasks()[1].progress(), TaskProgress::InProgress);
    }

    #[test]
    fn moving_task_is_preempted_by_higher_priority() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(5.0, 0.0, 1, 0, TaskPriority::Low));
        agent.step(0, false, &PriorityPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::MovingToLocation);

        agent.add_task(goto(0.1, 5.0, 1, 0, TaskPriority::High));
        agent.step(1, false, &PriorityPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::Suspended);
        assert_eq!(agent.tasks()[1].progress(), TaskProgress::MovingToLocation);
        assert_eq!(agent.heading(), 90.0);
    }

    #[test]
    fn without_preemption_moving_task_continues() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(5.0, 0.0, 1, 0, TaskPriority::Low));
        agent.step(0, false, &NoPreemption).unwrap();
        agent.add_task(goto(0.0, 5.0, 1, 0, TaskPriority::High));
        agent.step(1, false, &NoPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::MovingToLocation);
        assert_eq!(agent.tasks()[1].progress(), TaskProgress::NotStarted);
    }

    #[test]
    fn suspended_task_resumes_before_new_work() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(0.0, 0.0, 1, 0, TaskPriority::Low));
        agent.add_task(goto(0.0, 0.0, 1, 0, TaskPriority::High));
        agent.tasks[0].suspend().unwrap();
        agent.step(0, false, &NoPreemption).unwrap();
        assert_eq!(agent.tasks()[0].progress(), TaskProgress::InProgress);
        assert_eq!(agent.tasks()[1].progress(), TaskProgress::NotStarted);
    }

    #[test]
    fn two_tasks_in_progress_is_fatal() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(0.0, 0.0, 5, 0, TaskPriority::Medium));
        agent.add_task(goto(0.0, 0.0, 5, 0, TaskPriority::Medium));
        let mut motion = agent.motion.clone();
        for task in &mut agent.tasks {
            task.advance(0, &mut motion).unwrap();
        }
        let err = agent.step(1, false, &NoPreemption).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn recording_writes_state_before_acting() {
        let mut agent = Agent::new(3, hospital(0.0, 0.0), 0.0);
        agent.allocate_trajectory(2);
        agent.add_task(goto(1.0, 0.0, 0, 0, TaskPriority::Medium));
        agent.step(0, true, &NoPreemption).unwrap();
        agent.step(1, true, &NoPreemption).unwrap();
        let trajectory = agent.trajectory().unwrap();
        assert_eq!(trajectory.get(0).unwrap().location, hospital(0.0, 0.0));
        assert!((trajectory.get(1).unwrap().location.x - 0.1).abs() < 1e-12);
        assert!(agent.step(2, true, &NoPreemption).unwrap_err().is_fatal());
    }

    #[test]
    fn tiny_negative_headings_fold_to_zero() {
        assert_eq!(normalize_heading(-1e-20), 0.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert_eq!(Agent::new(0, hospital(0.0, 0.0), -1e-20).heading(), 0.0);

        let mut agent = Agent::new(0, hospital(0.0, 0.0), 45.0);
        agent.rotate_heading(&hospital(1.0, -1e-18)).unwrap();
        let heading = agent.heading();
        assert!((0.0..360.0).contains(&heading));
    }

    #[test]
    fn movement_parameters_must_be_positive() {
        let agent = || Agent::new(0, hospital(0.0, 0.0), 0.0);
        for bad in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                agent().with_movement_speed(bad),
                Err(AbmError::InvalidAgent(_))
            ));
            assert!(matches!(
                agent().with_interaction_radius(bad),
                Err(AbmError::InvalidAgent(_))
            ));
        }
        let agent = agent().with_movement_speed(0.5).unwrap();
        assert_eq!(agent.movement_speed(), 0.5);
    }

    #[test]
    fn task_on_another_floor_does_not_stop_the_walk() {
        let mut agent = Agent::new(0, hospital(0.0, 0.0), 0.0);
        agent.add_task(goto(5.0, 0.0, 1, 0, TaskPriority::Low));
        agent.step(0, false, &NoPreemption).unwrap();
        agent.add_task(
            Task::goto_location(Location::new(0.0, 0.0, 1, "Hospital"), 1000).unwrap(),
        );

        for policy in [&NoPreemption as &dyn PreemptionPolicy, &PriorityPreemption] {
            let mut agent = agent.clone();
            agent.step(1, false, policy).unwrap();
            assert_eq!(agent.tasks()[0].progress(), TaskProgress::MovingToLocation);
            assert!((agent.location().x - 0.2).abs() < 1e-12);
            assert_eq!(agent.tasks()[1].progress(), TaskProgress::NotStarted);
        }
    }

    #[test]
    fn wall_proximity() {
        let agent = Agent::new(0, hospital(1.0, 0.13), 0.0);
        let wall = Wall::new((0.0, 0.0), (2.0, 0.0));
        assert!(agent.intersects_walls(std::slice::from_ref(&wall)));
        let agent = Agent::new(0, hospital(1.0, 0.5), 0.0);
        assert!(!agent.intersects_walls(&[wall]));
    }
}
