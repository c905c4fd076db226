//! Per-tick recording of agent state.

use serde::{Deserialize, Serialize};

use crate::{
    AgentId, Time,
    agent::{AgentType, InfectionStatus},
    error::{AbmError, Result},
    location::Location,
    simulation::{SimulationObserver, StepSnapshot},
};

/// One agent's state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    pub location: Location,
    pub heading: f64,
    pub infection_status: InfectionStatus,
}

/// Fixed-capacity store with one slot per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryBuffer {
    slots: Vec<Option<TrajectoryRecord>>,
}

impl TrajectoryBuffer {
    pub fn new(capacity: usize) -> Self {
        TrajectoryBuffer {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Stores `record` at slot `time`.
    pub fn record(&mut self, time: Time, record: TrajectoryRecord) -> Result<()> {
        if time < 0 {
            return Err(AbmError::NegativeTime(time));
        }
        let capacity = self.slots.len();
        let slot = usize::try_from(time)
            .ok()
            .and_then(|idx| self.slots.get_mut(idx))
            .ok_or_else(|| {
                AbmError::InvariantViolation(format!(
                    "Trajectory write at time {time} is outside a buffer of {capacity} slots."
                ))
            })?;
        *slot = Some(record);
        Ok(())
    }

    pub fn get(&self, time: Time) -> Option<&TrajectoryRecord> {
        usize::try_from(time).ok().and_then(|idx| self.slots.get(idx)?.as_ref())
    }

    /// Recorded ticks in order, skipping unwritten slots.
    pub fn iter(&self) -> impl Iterator<Item = (Time, &TrajectoryRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| Some((idx as Time, slot.as_ref()?)))
    }
}

/// A flat trajectory row, one per agent per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub time: Time,
    pub agent_id: AgentId,
    pub x: f64,
    pub y: f64,
    pub floor: i32,
    pub building: String,
    pub heading: f64,
    pub interaction_radius: f64,
    pub agent_type: AgentType,
    pub infection_status: InfectionStatus,
}

/// Observer that flattens every step into [`TrajectoryRow`]s.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    rows: Vec<TrajectoryRow>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[TrajectoryRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TrajectoryRow> {
        self.rows
    }
}

impl SimulationObserver for TrajectoryRecorder {
    fn on_step(&mut self, snapshot: &StepSnapshot) {
        self.rows.extend(snapshot.agents.iter().map(|agent| TrajectoryRow {
            time: snapshot.time,
            agent_id: agent.id,
            x: agent.location.x,
            y: agent.location.y,
            floor: agent.location.floor,
            building: agent.location.building.clone(),
            heading: agent.heading,
            interaction_radius: agent.interaction_radius,
            agent_type: agent.agent_type,
            infection_status: agent.infection_status,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: f64) -> TrajectoryRecord {
        TrajectoryRecord {
            location: Location::new(x, 0.0, 0, "H"),
            heading: 0.0,
            infection_status: InfectionStatus::Susceptible,
        }
    }

    #[test]
    fn writes_land_in_their_slot() {
        let mut buffer = TrajectoryBuffer::new(3);
        buffer.record(2, record(2.0)).unwrap();
        buffer.record(0, record(0.0)).unwrap();
        assert_eq!(buffer.capacity(), 3);
        assert!(buffer.get(1).is_none());
        let times: Vec<Time> = buffer.iter().map(|(t, _)| t).collect();
        assert_eq!(times, vec![0, 2]);
        assert_eq!(buffer.get(2), Some(&record(2.0)));
    }

    #[test]
    fn out_of_range_writes_fail() {
        let mut buffer = TrajectoryBuffer::new(2);
        assert!(buffer.record(2, record(0.0)).unwrap_err().is_fatal());
        assert_eq!(
            buffer.record(-1, record(0.0)),
            Err(AbmError::NegativeTime(-1))
        );
    }
}
