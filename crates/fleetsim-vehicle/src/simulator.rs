//! ---
//! fleetsim_section: "02-fleet-simulation"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Seeded telemetry generation for a set of vehicles."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::collections::HashMap;

use chrono::Utc;
use fleetsim_common::records::{BrakeStatus, GpsFix, TelemetryRecord};
use rand::prelude::*;
use thiserror::Error;

use crate::state::{DrivingPattern, VehicleState};

/// Fixed OBD-II trouble code set vehicles can report.
pub const DTC_CODES: [&str; 10] = [
    "P0300", "P0420", "P0171", "P0455", "P0128", "P0101", "P0134", "P0174", "P0401", "P0442",
];

/// Starting location anchors (lat, lng); vehicles spawn near one of them
/// with uniform jitter of up to 0.05 degrees on each axis.
const LOCATION_ANCHORS: [(f64, f64); 5] = [
    (-12.0464, -77.0428), // Lima
    (-16.4090, -71.5375), // Arequipa
    (-13.5319, -71.9675), // Cusco
    (-8.1116, -79.0288),  // Trujillo
    (-6.7714, -79.8411),  // Chiclayo
];

/// Per-vehicle failure surfaced by [`VehicleSimulator::generate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("vehicle '{vehicle_id}' has no initialised state")]
    UnknownVehicle { vehicle_id: String },
}

/// Generates telemetry streams for a set of vehicles, one physical state per
/// vehicle id. All randomness flows through a single seedable RNG so runs are
/// reproducible under test.
#[derive(Debug)]
pub struct VehicleSimulator {
    rng: StdRng,
    error_probability: f64,
    vehicles: HashMap<String, VehicleState>,
}

impl VehicleSimulator {
    /// Simulator with entropy seeding.
    pub fn new(error_probability: f64) -> Self {
        Self::from_rng(error_probability, StdRng::from_entropy())
    }

    /// Simulator with a fixed seed for reproducible runs.
    pub fn with_seed(error_probability: f64, seed: u64) -> Self {
        Self::from_rng(error_probability, StdRng::seed_from_u64(seed))
    }

    fn from_rng(error_probability: f64, rng: StdRng) -> Self {
        Self {
            rng,
            error_probability: error_probability.clamp(0.0, 1.0),
            vehicles: HashMap::new(),
        }
    }

    /// Create the starting state for a vehicle. Baselines for battery, fuel,
    /// and brake wear are biased toward alert thresholds in proportion to the
    /// error-injection probability. Re-initialising an id replaces its state.
    pub fn initialize(&mut self, vehicle_id: &str) {
        let p = self.error_probability;
        let (anchor_lat, anchor_lng) =
            LOCATION_ANCHORS[self.rng.gen_range(0..LOCATION_ANCHORS.len())];
        let state = VehicleState {
            id: vehicle_id.to_owned(),
            lat: anchor_lat + self.rng.gen_range(-0.05..0.05),
            lng: anchor_lng + self.rng.gen_range(-0.05..0.05),
            speed_kmh: 0.0,
            rpm: 800.0 + self.rng.gen_range(0.0..200.0),
            engine_temp_c: 20.0 + self.rng.gen_range(0.0..10.0),
            battery_voltage: (12.6 - 0.4 * p) + self.rng.gen_range(0.0..0.4),
            fuel_level_percent: (65.0 - 30.0 * p) + self.rng.gen_range(0.0..35.0),
            brake_wear_percent: self.rng.gen_range(0.0..(15.0 + 35.0 * p)),
            odometer_km: (50_000.0 + self.rng.gen_range(0.0..150_000.0_f64)).floor(),
            pattern: DrivingPattern::sample(&mut self.rng),
        };
        self.vehicles.insert(vehicle_id.to_owned(), state);
    }

    /// Advance one vehicle a single tick and emit an immutable sample.
    pub fn generate(
        &mut self,
        vehicle_id: &str,
        tenant_id: &str,
    ) -> Result<TelemetryRecord, SimulationError> {
        let p = self.error_probability;
        let state = self
            .vehicles
            .get_mut(vehicle_id)
            .ok_or_else(|| SimulationError::UnknownVehicle {
                vehicle_id: vehicle_id.to_owned(),
            })?;
        let rng = &mut self.rng;
        state.advance(rng, p);

        let dtc_probability = 0.005 + 0.045 * p;
        let dtc_codes = if rng.gen_bool(dtc_probability) {
            let count = rng.gen_range(1..=2);
            DTC_CODES
                .choose_multiple(rng, count)
                .map(|code| (*code).to_owned())
                .collect()
        } else {
            Vec::new()
        };

        Ok(TelemetryRecord {
            tenant_id: tenant_id.to_owned(),
            vehicle_id: vehicle_id.to_owned(),
            timestamp: Utc::now(),
            rpm: state.rpm.round() as u32,
            speed: state.speed_kmh.round() as u32,
            engine_temp_c: state.engine_temp_c.round() as i32,
            battery_voltage: (state.battery_voltage * 10.0).round() / 10.0,
            fuel_level_percent: state.fuel_level_percent.round().clamp(0.0, 100.0) as u8,
            brake_status: BrakeStatus::from_wear(state.brake_wear_percent),
            dtc_codes,
            gps: GpsFix {
                lat: round_coordinate(state.lat),
                lng: round_coordinate(state.lng),
                accuracy_m: rng.gen_range(5.0..15.0),
            },
        })
    }

    /// Drop a vehicle's state. Returns whether the vehicle existed.
    pub fn reset(&mut self, vehicle_id: &str) -> bool {
        self.vehicles.remove(vehicle_id).is_some()
    }

    /// Read-only access to a vehicle's current physical state.
    pub fn state(&self, vehicle_id: &str) -> Option<&VehicleState> {
        self.vehicles.get(vehicle_id)
    }

    /// Number of vehicles with initialised state.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Update the alert bias. Clamped into [0, 1]; affects subsequent ticks
    /// and initialisations only.
    pub fn set_error_probability(&mut self, probability: f64) {
        self.error_probability = probability.clamp(0.0, 1.0);
    }

    pub fn error_probability(&self) -> f64 {
        self.error_probability
    }
}

fn round_coordinate(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
