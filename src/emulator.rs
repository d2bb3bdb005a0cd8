//! Telemetry Emulator - synthetic highway-cruise telemetry per vehicle
//!
//! Models a passenger car on cruise control with coupled dynamics:
//! - RPM and speed track their setpoints through a first-order lag plus noise
//! - Intake and coolant temperature follow load-dependent targets
//! - Vibration grows with RPM and with deviation from the ideal speed
//! - Engine hours accumulate with simulated time
//!
//! With a small per-step probability a fault episode starts, during which
//! coolant and vibration creep upward until the episode ends.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::config::EmulatorConfig;
use crate::types::{RawSample, Sample};

// ============================================================================
// Cruise Constants
// ============================================================================

const RPM_SETPOINT: f64 = 2400.0;
const SPEED_SETPOINT: f64 = 70.0;
const COOLANT_BASE: f64 = 190.0;
const INTAKE_BASE: f64 = 70.0;

/// Fault creep caps
const FAULT_COOLANT_CAP: f64 = 250.0;
const FAULT_VIBRATION_CAP: f64 = 2.5;

// ============================================================================
// Emulator
// ============================================================================

#[derive(Debug)]
pub struct TelemetryEmulator {
    asset_id: String,
    config: EmulatorConfig,
    rng: StdRng,
    clock: DateTime<Utc>,
    /// Stamp samples no earlier than the wall clock
    live: bool,

    coolant_temp_f: f64,
    intake_air_temp_f: f64,
    engine_rpm: f64,
    speed_mph: f64,
    vibration_score: f64,
    engine_hours: f64,

    /// Steps remaining in the active fault episode
    fault_steps_left: u32,
    /// Extra vibration built up by a fault; decays once the fault ends
    vibration_offset: f64,
}

impl TelemetryEmulator {
    /// Start a vehicle at cruise, with its clock at `start`.
    ///
    /// The same `seed` and `start` always produce the same sample sequence.
    pub fn new(asset_id: impl Into<String>, config: EmulatorConfig, seed: Option<u64>, start: DateTime<Utc>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            asset_id: asset_id.into(),
            config,
            rng,
            clock: start,
            live: false,
            coolant_temp_f: COOLANT_BASE,
            intake_air_temp_f: INTAKE_BASE,
            engine_rpm: RPM_SETPOINT,
            speed_mph: SPEED_SETPOINT,
            vibration_score: 0.8,
            engine_hours: 0.0,
            fault_steps_left: 0,
            vibration_offset: 0.0,
        }
    }

    /// Follow the wall clock: each sample is stamped
    /// `max(now, previous + step_seconds)`, so the stream stays ordered
    /// after samples injected at the current time.
    pub fn live_clock(mut self) -> Self {
        self.live = true;
        self
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn in_fault(&self) -> bool {
        self.fault_steps_left > 0
    }

    /// Advance one step and return the resulting sample.
    pub fn step(&mut self) -> Sample {
        let dt = self.config.step_seconds;
        self.clock += Duration::milliseconds((dt * 1000.0).round() as i64);
        if self.live {
            self.clock = self.clock.max(Utc::now());
        }
        self.engine_hours += dt / 3600.0;

        self.engine_rpm = approach(self.engine_rpm, RPM_SETPOINT, 0.05) + self.rng.gen_range(-80.0..80.0);
        self.engine_rpm = self.engine_rpm.clamp(1500.0, 3200.0);

        self.speed_mph = approach(self.speed_mph, SPEED_SETPOINT, 0.08) + self.rng.gen_range(-1.5..1.5);
        self.speed_mph = self.speed_mph.clamp(45.0, 80.0);

        let intake_effect = 0.002 * (self.engine_rpm - RPM_SETPOINT) + 0.03 * (self.speed_mph - SPEED_SETPOINT);
        self.intake_air_temp_f = approach(self.intake_air_temp_f, INTAKE_BASE + intake_effect, 0.15)
            + self.rng.gen_range(-0.3..0.3);
        self.intake_air_temp_f = self.intake_air_temp_f.clamp(60.0, 80.0);

        self.advance_fault();

        if self.in_fault() {
            self.coolant_temp_f = (self.coolant_temp_f + self.rng.gen_range(0.5..1.5)).min(FAULT_COOLANT_CAP);
            self.vibration_offset += self.rng.gen_range(0.05..0.12);
        } else {
            let coolant_target =
                COOLANT_BASE + 0.004 * (self.engine_rpm - RPM_SETPOINT) + 0.01 * self.engine_hours;
            let noise: f64 = self.rng.sample(StandardNormal);
            self.coolant_temp_f = approach(self.coolant_temp_f, coolant_target, 0.08) + 0.2 * noise;
            self.coolant_temp_f = self.coolant_temp_f.clamp(180.0, FAULT_COOLANT_CAP);
            self.vibration_offset *= 0.9;
        }

        let rpm_component = ((self.engine_rpm - 2200.0) / 1500.0).max(0.0);
        let speed_component = (self.speed_mph - SPEED_SETPOINT).abs() / 20.0;
        let noise: f64 = self.rng.sample(StandardNormal);
        self.vibration_score =
            0.5 + 0.6 * rpm_component + 0.6 * speed_component + 0.05 * noise + self.vibration_offset;
        self.vibration_score = if self.in_fault() {
            self.vibration_score.clamp(0.2, FAULT_VIBRATION_CAP)
        } else {
            self.vibration_score.clamp(0.2, 3.0)
        };

        self.sample()
    }

    /// Advance one step and return the sample in wire form.
    pub fn next_raw(&mut self) -> RawSample {
        RawSample::from(&self.step())
    }

    fn advance_fault(&mut self) {
        if self.fault_steps_left > 0 {
            self.fault_steps_left -= 1;
            if self.fault_steps_left == 0 {
                debug!(asset = %self.asset_id, "Emulated fault episode ended");
            }
        } else if self.rng.gen_bool(self.config.fault_probability.clamp(0.0, 1.0)) {
            let min = self.config.fault_min_steps.max(1);
            let steps = self.rng.gen_range(min..=self.config.fault_max_steps.max(min));
            self.fault_steps_left = steps;
            debug!(asset = %self.asset_id, steps, "Emulated fault episode started");
        }
    }

    fn sample(&self) -> Sample {
        Sample {
            asset_id: self.asset_id.clone(),
            timestamp: self.clock,
            coolant_temp_f: round_to(self.coolant_temp_f, 1),
            intake_air_temp_f: round_to(self.intake_air_temp_f, 1),
            engine_rpm: self.engine_rpm.round(),
            speed_mph: round_to(self.speed_mph, 1),
            vibration_score: round_to(self.vibration_score, 3),
            engine_hours: round_to(self.engine_hours, 4),
        }
    }
}

/// First-order lag toward `target`.
fn approach(value: f64, target: f64, gain: f64) -> f64 {
    value + gain * (target - value)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Envelope;
    use crate::engine::validator;
    use crate::types::PerSignal;

    fn start() -> DateTime<Utc> {
        "2024-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut a = TelemetryEmulator::new("car", EmulatorConfig::default(), Some(7), start());
        let mut b = TelemetryEmulator::new("car", EmulatorConfig::default(), Some(7), start());
        for _ in 0..50 {
            assert_eq!(a.step(), b.step());
        }
    }

    #[test]
    fn test_samples_always_validate() {
        let envelopes: PerSignal<Envelope> = PerSignal::default();
        let config = EmulatorConfig {
            fault_probability: 0.2,
            ..EmulatorConfig::default()
        };
        let mut emu = TelemetryEmulator::new("car", config, Some(42), start());
        let mut previous: Option<Sample> = None;
        for _ in 0..500 {
            let raw = emu.next_raw();
            let sample = validator::validate(&raw, previous.as_ref(), &envelopes).unwrap();
            previous = Some(sample);
        }
    }

    #[test]
    fn test_healthy_cruise_stays_in_band() {
        let config = EmulatorConfig {
            fault_probability: 0.0,
            ..EmulatorConfig::default()
        };
        let mut emu = TelemetryEmulator::new("car", config, Some(1), start());
        for _ in 0..300 {
            let s = emu.step();
            assert!((180.0..=210.0).contains(&s.coolant_temp_f));
            assert!((60.0..=80.0).contains(&s.intake_air_temp_f));
            assert!((1500.0..=3200.0).contains(&s.engine_rpm));
            assert!(s.vibration_score < 3.0);
        }
        assert!(!emu.in_fault());
    }

    #[test]
    fn test_fault_episode_heats_coolant() {
        let config = EmulatorConfig {
            fault_probability: 1.0,
            fault_min_steps: 60,
            fault_max_steps: 60,
            ..EmulatorConfig::default()
        };
        let mut emu = TelemetryEmulator::new("car", config, Some(3), start());
        let mut peak: f64 = 0.0;
        for _ in 0..60 {
            peak = peak.max(emu.step().coolant_temp_f);
        }
        assert!(peak > 220.0, "peak coolant {peak}");
        assert!(peak <= FAULT_COOLANT_CAP);
    }

    #[test]
    fn test_clock_and_hours_advance() {
        let mut emu = TelemetryEmulator::new("car", EmulatorConfig::default(), Some(9), start());
        let first = emu.step();
        let second = emu.step();
        assert_eq!(second.timestamp - first.timestamp, Duration::seconds(1));
        assert!(second.engine_hours >= first.engine_hours);
    }

    #[test]
    fn test_live_clock_catches_up_with_wall_time() {
        let behind = Utc::now() - Duration::minutes(5);
        let mut emu =
            TelemetryEmulator::new("car", EmulatorConfig::default(), Some(9), behind).live_clock();
        let first = emu.step();
        assert!(first.timestamp >= Utc::now() - Duration::seconds(5));

        let second = emu.step();
        assert!(second.timestamp - first.timestamp >= Duration::seconds(1));
    }

    #[test]
    fn test_live_clock_never_moves_backwards() {
        let ahead = Utc::now() + Duration::hours(1);
        let mut emu =
            TelemetryEmulator::new("car", EmulatorConfig::default(), Some(9), ahead).live_clock();
        assert_eq!(emu.step().timestamp, ahead + Duration::seconds(1));
    }
}
