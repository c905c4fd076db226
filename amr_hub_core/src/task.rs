//! Tasks and their lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AgentId, Time,
    agent::{Agent, Motion},
    door::Door,
    error::{AbmError, Result},
    location::Location,
};

/// Default durations, in ticks, for the convenience constructors.
pub const ATTEND_PATIENT_DURATION: Time = 15;
pub const DOOR_ACCESS_DURATION: Time = 1;
pub const WORKSTATION_DURATION: Time = 30;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskProgress {
    NotStarted,
    MovingToLocation,
    InProgress,
    Suspended,
    Completed,
}

impl fmt::Display for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskProgress::NotStarted => "not started",
            TaskProgress::MovingToLocation => "moving",
            TaskProgress::InProgress => "in progress",
            TaskProgress::Suspended => "suspended",
            TaskProgress::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

/// Payload-free tag of a [`TaskKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    GotoLocation,
    AttendPatient,
    DoorAccess,
    Workstation,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskType::GotoLocation => "goto",
            TaskType::AttendPatient => "attend patient",
            TaskType::DoorAccess => "door access",
            TaskType::Workstation => "workstation",
        };
        f.write_str(label)
    }
}

/// What a task is about. Each kind determines where the task happens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TaskKind {
    GotoLocation {
        destination: Location,
    },
    /// The patient's location is captured when the task is created and is
    /// not updated if the patient moves afterwards.
    AttendPatient {
        patient: AgentId,
        patient_location: Location,
    },
    DoorAccess {
        door: Door,
        building: String,
        floor: i32,
    },
    Workstation {
        workstation: Location,
    },
}

impl TaskKind {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskKind::GotoLocation { .. } => TaskType::GotoLocation,
            TaskKind::AttendPatient { .. } => TaskType::AttendPatient,
            TaskKind::DoorAccess { .. } => TaskType::DoorAccess,
            TaskKind::Workstation { .. } => TaskType::Workstation,
        }
    }

    fn location(&self) -> Result<Location> {
        match self {
            TaskKind::GotoLocation { destination } => Ok(destination.clone()),
            TaskKind::AttendPatient {
                patient_location, ..
            } => Ok(patient_location.clone()),
            TaskKind::DoorAccess {
                door,
                building,
                floor,
            } => {
                let mid = door.midpoint().ok_or_else(|| {
                    AbmError::SimulationMode(
                        "Door must have defined start and end points to set task location."
                            .to_string(),
                    )
                })?;
                Ok(Location::new(mid.x, mid.y, *floor, building.clone()))
            }
            TaskKind::Workstation { workstation } => Ok(workstation.clone()),
        }
    }
}

/// A unit of work assigned to an agent.
///
/// The location is derived from the kind once, at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    time_needed: Time,
    time_due: Time,
    pub priority: TaskPriority,
    progress: TaskProgress,
    location: Location,
    time_started: Option<Time>,
    time_completed: Option<Time>,
    kind: TaskKind,
}

impl Task {
    pub fn new(
        kind: TaskKind,
        time_needed: Time,
        time_due: Time,
        priority: TaskPriority,
    ) -> Result<Self> {
        if time_needed < 0 {
            return Err(AbmError::Time(
                "Time needed for a task cannot be negative.".to_string(),
            ));
        }
        if time_due < 0 {
            return Err(AbmError::Time(
                "Time due for a task cannot be negative.".to_string(),
            ));
        }
        let location = kind.location()?;

        debug!(
            task = %kind.task_type(),
            time_needed,
            time_due,
            ?priority,
            %location,
            "task created"
        );

        Ok(Task {
            time_needed,
            time_due,
            priority,
            progress: TaskProgress::NotStarted,
            location,
            time_started: None,
            time_completed: None,
            kind,
        })
    }

    pub fn goto_location(destination: Location, time_due: Time) -> Result<Self> {
        Self::new(
            TaskKind::GotoLocation { destination },
            0,
            time_due,
            TaskPriority::default(),
        )
    }

    /// Attend `patient` where it stands now.
    pub fn attend_patient(patient: &Agent, time_due: Time, priority: TaskPriority) -> Result<Self> {
        Self::new(
            TaskKind::AttendPatient {
                patient: patient.id(),
                patient_location: patient.location().clone(),
            },
            ATTEND_PATIENT_DURATION,
            time_due,
            priority,
        )
    }

    pub fn door_access(
        door: Door,
        building: impl Into<String>,
        floor: i32,
        time_due: Time,
    ) -> Result<Self> {
        Self::new(
            TaskKind::DoorAccess {
                door,
                building: building.into(),
                floor,
            },
            DOOR_ACCESS_DURATION,
            time_due,
            TaskPriority::default(),
        )
    }

    pub fn workstation(workstation: Location, time_due: Time) -> Result<Self> {
        Self::new(
            TaskKind::Workstation { workstation },
            WORKSTATION_DURATION,
            time_due,
            TaskPriority::Low,
        )
    }

    pub fn time_needed(&self) -> Time {
        self.time_needed
    }

    pub fn time_due(&self) -> Time {
        self.time_due
    }

    pub fn progress(&self) -> TaskProgress {
        self.progress
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn time_started(&self) -> Option<Time> {
        self.time_started
    }

    pub fn time_completed(&self) -> Option<Time> {
        self.time_completed
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn task_type(&self) -> TaskType {
        self.kind.task_type()
    }

    pub fn is_completed(&self) -> bool {
        self.progress == TaskProgress::Completed
    }

    /// Ticks spent working since the task started; zero before it starts.
    pub fn time_spent(&self, now: Time) -> Time {
        self.time_started.map_or(0, |started| now - started)
    }

    /// Latest tick at which work can start and still finish by the due time,
    /// for an agent `travel` ticks away.
    pub fn latest_start(&self, travel: f64) -> f64 {
        (self.time_due - self.time_needed) as f64 - travel
    }

    /// Performs one micro-action of this task at tick `now`.
    ///
    /// A task that is in progress completes once it has been worked on for
    /// `time_needed` ticks. Otherwise the agent either takes one step
    /// towards the task location or, once within its interaction radius,
    /// starts working.
    pub fn advance(&mut self, now: Time, motion: &mut Motion) -> Result<()> {
        if self.progress == TaskProgress::Completed {
            return Ok(());
        }

        let spent = self.time_spent(now);
        if self.progress == TaskProgress::InProgress && spent >= self.time_needed {
            self.progress = TaskProgress::Completed;
            self.time_completed = Some(now);
            debug!(task = %self.task_type(), now, "task completed");
            return Ok(());
        }

        if !motion.has_reached(&self.location)? {
            if self.progress != TaskProgress::MovingToLocation {
                debug!(task = %self.task_type(), now, from = %self.progress, "moving to task");
            }
            self.progress = TaskProgress::MovingToLocation;
            motion.rotate_heading(&self.location)?;
            motion.step_towards(&self.location)?;
            return Ok(());
        }

        if self.progress != TaskProgress::InProgress {
            debug!(task = %self.task_type(), now, from = %self.progress, "task started");
            self.progress = TaskProgress::InProgress;
            self.time_started = Some(now);
        }
        Ok(())
    }

    /// Sets a task that has not started working aside.
    pub fn suspend(&mut self) -> Result<()> {
        match self.progress {
            TaskProgress::NotStarted | TaskProgress::MovingToLocation => {
                debug!(task = %self.task_type(), from = %self.progress, "task suspended");
                self.progress = TaskProgress::Suspended;
                Ok(())
            }
            other => Err(AbmError::InvariantViolation(format!(
                "Cannot suspend a task that is {other}."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{DEFAULT_INTERACTION_RADIUS, DEFAULT_MOVEMENT_SPEED};

    fn motion_at(x: f64, y: f64) -> Motion {
        Motion {
            location: Location::new(x, y, 1, "Hospital"),
            heading: 0.0,
            interaction_radius: DEFAULT_INTERACTION_RADIUS,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
        }
    }

    fn door_task() -> Task {
        let door = Door::spatial((2.0, 0.0), (2.0, 1.0)).unwrap();
        Task::new(
            TaskKind::DoorAccess {
                door,
                building: "Hospital".into(),
                floor: 1,
            },
            1,
            5,
            TaskPriority::Medium,
        )
        .unwrap()
    }

    #[test]
    fn negative_times_are_rejected() {
        let dest = Location::new(0.0, 0.0, 0, "H");
        let kind = TaskKind::GotoLocation { destination: dest };
        let err = Task::new(kind.clone(), -1, 5, TaskPriority::Low).unwrap_err();
        assert_eq!(
            err,
            AbmError::Time("Time needed for a task cannot be negative.".into())
        );
        let err = Task::new(kind, 1, -5, TaskPriority::Low).unwrap_err();
        assert!(err.to_string().contains("Time due"));
    }

    #[test]
    fn door_access_location_is_door_midpoint() {
        let task = door_task();
        assert_eq!(task.location(), &Location::new(2.0, 0.5, 1, "Hospital"));
        assert_eq!(task.task_type(), TaskType::DoorAccess);
    }

    #[test]
    fn door_access_requires_coordinates() {
        let door = Door::named("Side").unwrap();
        let err = Task::door_access(door, "Hospital", 1, 5).unwrap_err();
        assert!(matches!(err, AbmError::SimulationMode(_)));
    }

    #[test]
    fn door_access_task_moves_then_starts_then_completes() {
        let mut task = door_task();
        let mut motion = motion_at(1.8, 0.5);
        assert_eq!(task.progress(), TaskProgress::NotStarted);

        // 0.2 away: two steps of 0.1 are needed.
        task.advance(0, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::MovingToLocation);
        assert_eq!(motion.heading, 0.0);
        task.advance(1, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::MovingToLocation);
        assert!(motion.has_reached(task.location()).unwrap());

        task.advance(2, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::InProgress);
        assert_eq!(task.time_started(), Some(2));

        task.advance(3, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::Completed);
        assert_eq!(task.time_completed(), Some(3));

        task.advance(4, &mut motion).unwrap();
        assert_eq!(task.time_completed(), Some(3));
    }

    #[test]
    fn task_at_agent_location_starts_immediately() {
        let mut task = door_task();
        let mut motion = motion_at(2.0, 0.5);
        task.advance(7, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::InProgress);
        assert_eq!(task.time_spent(9), 2);
    }

    #[test]
    fn step_is_clamped_to_remaining_distance() {
        let dest = Location::new(0.0, 0.06, 1, "Hospital");
        let mut task = Task::goto_location(dest.clone(), 10).unwrap();
        let mut motion = motion_at(0.0, 0.0);
        task.advance(0, &mut motion).unwrap();
        assert_eq!(motion.location, dest);
        assert_eq!(motion.heading, 90.0);
    }

    #[test]
    fn moving_to_another_floor_fails() {
        let dest = Location::new(0.0, 0.0, 2, "Hospital");
        let mut task = Task::goto_location(dest, 10).unwrap();
        let mut motion = motion_at(1.0, 1.0);
        assert!(matches!(
            task.advance(0, &mut motion),
            Err(AbmError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn suspend_is_only_allowed_before_work_starts() {
        let mut task = door_task();
        task.suspend().unwrap();
        assert_eq!(task.progress(), TaskProgress::Suspended);

        let mut motion = motion_at(2.0, 0.5);
        task.advance(0, &mut motion).unwrap();
        assert_eq!(task.progress(), TaskProgress::InProgress);
        assert!(task.suspend().unwrap_err().is_fatal());
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert_eq!(TaskPriority::High as i32, 3);
    }
}
