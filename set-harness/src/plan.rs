//! Traffic profile handed to the load generator.

use std::time::Duration;

use serde::Serialize;

/// Target request rate of a phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum HatchRate {
    /// A constant rate in requests per second.
    Fixed {
        /// Requests per second.
        trps: u32,
    },
    /// A rate growing linearly from `start` by `rate` per second.
    Slope {
        /// Requests per second at the start of the phase.
        start: u32,
        /// Increase of the request rate per second.
        rate: f64,
    },
}

/// One phase of the traffic profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Phase {
    /// Phase name, for reporting.
    pub name: &'static str,
    /// Number of concurrent clients.
    pub threads: u32,
    /// Request rate over the phase.
    pub hatch_rate: HatchRate,
    /// Length of the phase.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

/// The warmup, scale and settle phases of a benchmark run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PhasePlan {
    phases: [Phase; 3],
}

impl PhasePlan {
    /// Index of the phase during which the request rate grows.
    pub const SCALE_PHASE: usize = 1;

    /// Compiles the three phases.
    ///
    /// The settle phase holds the rate the scale phase reaches at its end, rounded up.
    pub fn compile(threads: u32, warmup: u32, scaling: f64, phase_length: Duration) -> Self {
        let settle = (f64::from(warmup) + phase_length.as_secs_f64() * scaling).ceil() as u32;
        let phase = |name, hatch_rate| Phase {
            name,
            threads,
            hatch_rate,
            duration: phase_length,
        };

        Self {
            phases: [
                phase("warmup", HatchRate::Fixed { trps: warmup }),
                phase(
                    "scale",
                    HatchRate::Slope {
                        start: warmup,
                        rate: scaling,
                    },
                ),
                phase("settle", HatchRate::Fixed { trps: settle }),
            ],
        }
    }

    /// The phases in execution order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Total length of the run.
    pub fn duration(&self) -> Duration {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn settle_holds_final_scale_rate() {
        let plan = PhasePlan::compile(4, 10, 2.0, Duration::from_secs(30));
        let phases = plan.phases();

        assert_eq!(phases.len(), 3);
        assert_eq!(phases[0].hatch_rate, HatchRate::Fixed { trps: 10 });
        assert_eq!(
            phases[1].hatch_rate,
            HatchRate::Slope {
                start: 10,
                rate: 2.0
            }
        );
        assert_eq!(phases[2].hatch_rate, HatchRate::Fixed { trps: 70 });
        assert!(phases.iter().all(|p| p.threads == 4));
        assert_eq!(plan.duration(), Duration::from_secs(90));
    }

    #[test]
    fn settle_rounds_up() {
        let plan = PhasePlan::compile(1, 1, 0.25, Duration::from_secs(10));
        assert_eq!(plan.phases()[2].hatch_rate, HatchRate::Fixed { trps: 4 });
    }

    #[test]
    fn serialized_shape() {
        let plan = PhasePlan::compile(2, 5, 0.5, Duration::from_secs(60));
        let value = serde_json::to_value(&plan).unwrap();

        assert_eq!(
            value[1],
            json!({
                "name": "scale",
                "threads": 2,
                "hatch_rate": { "type": "slope", "options": { "start": 5, "rate": 0.5 } },
                "duration": "1m",
            })
        );
        assert_eq!(value[2]["hatch_rate"]["options"]["trps"], 35);
    }
}
