//! ---
//! fleetsim_section: "02-fleet-simulation"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Per-vehicle physical state and driving pattern dynamics."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use rand::prelude::*;

/// Behaviour profile that determines the targets a vehicle's physical state
/// is smoothed toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivingPattern {
    City,
    Highway,
    Idle,
    Mixed,
}

impl DrivingPattern {
    const ALL: [DrivingPattern; 4] = [
        DrivingPattern::City,
        DrivingPattern::Highway,
        DrivingPattern::Idle,
        DrivingPattern::Mixed,
    ];

    /// Pick a pattern uniformly, `mixed` included.
    pub fn sample(rng: &mut StdRng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Resolve the pattern driving this tick. `mixed` delegates
    /// 40% city / 30% highway / 30% idle; the others are themselves.
    fn effective(self, rng: &mut StdRng) -> EffectivePattern {
        match self {
            DrivingPattern::City => EffectivePattern::City,
            DrivingPattern::Highway => EffectivePattern::Highway,
            DrivingPattern::Idle => EffectivePattern::Idle,
            DrivingPattern::Mixed => {
                let roll: f64 = rng.gen_range(0.0..1.0);
                if roll < 0.4 {
                    EffectivePattern::City
                } else if roll < 0.7 {
                    EffectivePattern::Highway
                } else {
                    EffectivePattern::Idle
                }
            }
        }
    }
}

/// Pattern after `mixed` delegation; what a single tick actually runs.
#[derive(Debug, Clone, Copy)]
enum EffectivePattern {
    City,
    Highway,
    Idle,
}

/// Mutable physical state of one simulated vehicle. Exclusively owned by the
/// simulator that initialised it; momentum is carried by the current values
/// themselves through exponential smoothing.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub rpm: f64,
    pub engine_temp_c: f64,
    pub battery_voltage: f64,
    pub fuel_level_percent: f64,
    pub brake_wear_percent: f64,
    pub odometer_km: f64,
    pub pattern: DrivingPattern,
}

fn smooth(current: f64, target: f64, k: f64) -> f64 {
    current + (target - current) * k
}

impl VehicleState {
    /// Advance the state by one tick under the configured error-injection
    /// probability. Targets are approached by exponential smoothing, never
    /// jumped to.
    pub fn advance(&mut self, rng: &mut StdRng, error_probability: f64) {
        let p = error_probability;
        match self.pattern.effective(rng) {
            EffectivePattern::City => {
                let target_speed = if rng.gen_bool(0.3) {
                    0.0
                } else {
                    rng.gen_range(20.0..60.0)
                };
                self.speed_kmh = smooth(self.speed_kmh, target_speed, 0.1);
                self.rpm = if self.speed_kmh < 5.0 {
                    rng.gen_range(800.0..1000.0)
                } else {
                    1500.0 + self.speed_kmh * 30.0 + rng.gen_range(0.0..500.0)
                };
                let target_temp = (80.0 + 10.0 * p) + rng.gen_range(0.0..(10.0 + 10.0 * p));
                self.engine_temp_c = smooth(self.engine_temp_c, target_temp, 0.05);
                self.battery_voltage = 12.6 + rng.gen_range(0.0..0.3);
            }
            EffectivePattern::Highway => {
                let target_speed = rng.gen_range(80.0..120.0);
                self.speed_kmh = smooth(self.speed_kmh, target_speed, 0.05);
                self.rpm = 2000.0 + self.speed_kmh * 20.0 + rng.gen_range(0.0..300.0);
                let target_temp = (85.0 + 12.0 * p) + rng.gen_range(0.0..(7.0 + 8.0 * p));
                self.engine_temp_c = smooth(self.engine_temp_c, target_temp, 0.05);
                self.battery_voltage = 13.5 + rng.gen_range(0.0..0.5);
            }
            EffectivePattern::Idle => {
                self.speed_kmh *= 0.8;
                self.rpm = rng.gen_range(800.0..1000.0);
                let target_temp = rng.gen_range(60.0..70.0);
                self.engine_temp_c = smooth(self.engine_temp_c, target_temp, 0.02);
                self.battery_voltage = 12.4 + rng.gen_range(0.0..0.2);
            }
        }

        self.step_position(rng);
        self.step_fuel(rng);
        self.odometer_km += self.speed_kmh / 3600.0;
        if self.speed_kmh > 20.0 {
            self.brake_wear_percent = (self.brake_wear_percent + 0.0001).min(100.0);
        }
        if rng.gen_bool(0.1) {
            self.pattern = DrivingPattern::sample(rng);
        }
    }

    /// Random-bearing position step scaled to current speed. One degree of
    /// latitude is roughly 111 km.
    fn step_position(&mut self, rng: &mut StdRng) {
        if self.speed_kmh > 0.0 {
            let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
            let distance_deg = self.speed_kmh / 111_000.0;
            self.lat += bearing.cos() * distance_deg;
            self.lng += bearing.sin() * distance_deg;
        }
    }

    fn step_fuel(&mut self, rng: &mut StdRng) {
        let consumption = (self.rpm / 1000.0 + self.speed_kmh / 100.0) * 0.001;
        self.fuel_level_percent = (self.fuel_level_percent - consumption).max(0.0);
        if self.fuel_level_percent < 10.0 && rng.gen_bool(0.3) {
            self.fuel_level_percent = rng.gen_range(90.0..100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(pattern: DrivingPattern) -> VehicleState {
        VehicleState {
            id: "BUS-001".to_owned(),
            lat: -12.05,
            lng: -77.04,
            speed_kmh: 0.0,
            rpm: 900.0,
            engine_temp_c: 25.0,
            battery_voltage: 12.6,
            fuel_level_percent: 60.0,
            brake_wear_percent: 5.0,
            odometer_km: 80_000.0,
            pattern,
        }
    }

    #[test]
    fn idle_pattern_decays_speed() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = test_state(DrivingPattern::Idle);
        state.speed_kmh = 50.0;
        state.pattern = DrivingPattern::Idle;
        for _ in 0..20 {
            state.pattern = DrivingPattern::Idle;
            state.advance(&mut rng, 0.0);
        }
        assert!(state.speed_kmh < 1.0, "speed was {}", state.speed_kmh);
        assert!(state.rpm >= 800.0 && state.rpm < 1000.0);
    }

    #[test]
    fn highway_pattern_raises_speed_and_charging() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut state = test_state(DrivingPattern::Highway);
        for _ in 0..120 {
            state.pattern = DrivingPattern::Highway;
            state.advance(&mut rng, 0.0);
        }
        assert!(state.speed_kmh > 70.0, "speed was {}", state.speed_kmh);
        assert!(state.battery_voltage >= 13.5);
        assert!(state.engine_temp_c > 80.0 && state.engine_temp_c < 95.0);
    }

    #[test]
    fn fuel_never_goes_negative() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = test_state(DrivingPattern::City);
        state.fuel_level_percent = 0.004;
        for _ in 0..50 {
            state.pattern = DrivingPattern::City;
            state.advance(&mut rng, 0.0);
            assert!(state.fuel_level_percent >= 0.0);
        }
    }

    #[test]
    fn odometer_and_brake_wear_only_accumulate() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut state = test_state(DrivingPattern::Highway);
        let start_odo = state.odometer_km;
        let start_wear = state.brake_wear_percent;
        for _ in 0..60 {
            state.pattern = DrivingPattern::Highway;
            state.advance(&mut rng, 0.0);
        }
        assert!(state.odometer_km > start_odo);
        assert!(state.brake_wear_percent >= start_wear);
    }
}
