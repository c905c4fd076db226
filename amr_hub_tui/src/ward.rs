//! The demo ward: three four-bed bays off a corridor with a nurses' station.

use amr_hub_core::{
    RoomId, Time,
    agent::{Agent, AgentType, InfectionStatus},
    content::Content,
    floor::{Building, Floor},
    geometry::Wall,
    layout::{DoorSpec, RoomSpec, assemble_buildings},
    location::Location,
    room::{Boundary, DEFAULT_MAX_ATTEMPTS},
    task::{Task, TaskPriority},
};
use anyhow::{Context, Result, anyhow};
use rand::Rng;

pub const BUILDING: &str = "General Hospital";
pub const FLOOR: i32 = 0;

const BAYS: [&str; 3] = ["Bay A", "Bay B", "Bay C"];
const CORRIDOR: &str = "Corridor";
const STATION: (f64, f64) = (11.0, 1.0);

/// Ticks between consecutive patient visits of one worker.
const VISIT_SPACING: Time = 60;

fn walls(points: &[(f64, f64)]) -> Vec<Wall> {
    points
        .windows(2)
        .map(|pair| Wall::new(pair[0], pair[1]))
        .collect()
}

fn room(name: &str, contents: Vec<Content>, doors: Vec<DoorSpec>, walls: Vec<Wall>) -> RoomSpec {
    RoomSpec {
        name: name.to_string(),
        building: BUILDING.to_string(),
        floor: FLOOR,
        contents,
        doors,
        boundary: Boundary::Walls(walls),
    }
}

/// Raw room definitions of the ward. Bays are 4 x 4 and sit side by side
/// above a 12 x 2 corridor; each bay opens onto the corridor through a
/// one-unit door in its bottom wall.
pub fn ward_specs() -> Vec<RoomSpec> {
    let mut specs = Vec::new();
    let mut corridor_top = Vec::new();

    for (i, name) in BAYS.iter().enumerate() {
        let x0 = 4.0 * i as f64;
        let x1 = x0 + 4.0;
        let door = DoorSpec::spatial((x0 + 1.5, 2.0), (x0 + 2.5, 2.0));
        let beds = (0..4)
            .map(|b| Content::Bed {
                bed_id: 4 * i + b,
            })
            .collect();

        let mut bay_walls = walls(&[(x0, 2.0), (x0 + 1.5, 2.0)]);
        bay_walls.extend(walls(&[
            (x0 + 2.5, 2.0),
            (x1, 2.0),
            (x1, 6.0),
            (x0, 6.0),
            (x0, 2.0),
        ]));
        specs.push(room(name, beds, vec![door], bay_walls));

        corridor_top.extend(walls(&[(x0, 2.0), (x0 + 1.5, 2.0)]));
        corridor_top.extend(walls(&[(x0 + 2.5, 2.0), (x1, 2.0)]));
    }

    let mut corridor_walls = walls(&[(0.0, 2.0), (0.0, 0.0), (12.0, 0.0), (12.0, 2.0)]);
    corridor_walls.extend(corridor_top);
    let corridor_doors = (0..BAYS.len())
        .map(|i| {
            let x0 = 4.0 * i as f64;
            DoorSpec::spatial((x0 + 1.5, 2.0), (x0 + 2.5, 2.0))
        })
        .collect();
    specs.push(room(
        CORRIDOR,
        vec![Content::Workstation { workstation_id: 0 }],
        corridor_doors,
        corridor_walls,
    ));

    specs
}

/// The assembled ward and its cast.
pub struct Ward {
    pub buildings: Vec<Building>,
    pub agents: Vec<Agent>,
}

impl Ward {
    fn floor(buildings: &[Building]) -> Result<&Floor> {
        buildings
            .iter()
            .find(|b| b.name == BUILDING)
            .and_then(|b| b.floor(FLOOR))
            .ok_or_else(|| anyhow!("ward floor {FLOOR} of {BUILDING} is missing"))
    }

    fn room_id(floor: &Floor, name: &str) -> Result<RoomId> {
        floor
            .rooms()
            .iter()
            .find(|room| room.name() == name)
            .map(|room| room.room_id())
            .ok_or_else(|| anyhow!("room {name} is missing"))
    }

    /// Places patients in the bays and workers in the corridor, and gives
    /// every worker a round of patient visits followed by charting at the
    /// nurses' station.
    pub fn build<R: Rng + ?Sized>(
        rng: &mut R,
        workers: usize,
        patients: usize,
        total_time: Time,
    ) -> Result<Ward> {
        if workers == 0 && patients > 0 {
            return Err(anyhow!("patients need at least one worker"));
        }
        let buildings = assemble_buildings(&ward_specs()).context("assembling the ward")?;
        let floor = Self::floor(&buildings)?;
        let corridor = floor
            .room(Self::room_id(floor, CORRIDOR)?)
            .ok_or_else(|| anyhow!("corridor is missing"))?;
        let bays = BAYS
            .iter()
            .map(|name| {
                let id = Self::room_id(floor, name)?;
                floor.room(id).ok_or_else(|| anyhow!("room {name} is missing"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut agents = Vec::with_capacity(workers + patients);
        let mut patient_bays = Vec::with_capacity(patients);
        for p in 0..patients {
            let bay = bays[p % bays.len()];
            let spot = bay.random_point(rng, DEFAULT_MAX_ATTEMPTS)?;
            let status = if p == 0 {
                InfectionStatus::Infected
            } else {
                InfectionStatus::Susceptible
            };
            let heading = rng.random_range(0.0..360.0);
            agents.push(
                Agent::new(p, Location::new(spot.x, spot.y, FLOOR, BUILDING), heading)
                    .with_type(AgentType::Patient)
                    .with_infection_status(status),
            );
            patient_bays.push(bay);
        }

        let station = Location::new(STATION.0, STATION.1, FLOOR, BUILDING);
        for w in 0..workers {
            let spot = corridor.random_point(rng, DEFAULT_MAX_ATTEMPTS)?;
            let heading = rng.random_range(0.0..360.0);
            let mut worker = Agent::new(
                patients + w,
                Location::new(spot.x, spot.y, FLOOR, BUILDING),
                heading,
            )
            .with_type(AgentType::HealthcareWorker);

            let round = (w..patients).step_by(workers).enumerate();
            let mut last_due = 0;
            for (visit, p) in round {
                let patient = &agents[p];
                let due = VISIT_SPACING * (visit as Time + 1);
                let door = patient_bays[p]
                    .doors()
                    .first()
                    .ok_or_else(|| anyhow!("{} has no door", patient_bays[p].name()))?;
                worker.add_task(Task::door_access(door.clone(), BUILDING, FLOOR, due - 20)?);
                let priority = if patient.infection_status() == InfectionStatus::Infected {
                    TaskPriority::High
                } else {
                    TaskPriority::Medium
                };
                worker.add_task(Task::attend_patient(patient, due, priority)?);
                last_due = due;
            }
            let charting_due = (last_due + VISIT_SPACING).min(total_time.max(0));
            worker.add_task(Task::workstation(station.clone(), charting_due)?);
            agents.push(worker);
        }

        Ok(Ward { buildings, agents })
    }
}
