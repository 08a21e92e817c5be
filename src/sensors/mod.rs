//! Sensor subsystem: battery ADC filtering, power sense lines and the
//! energy status they feed.
//!
//! [`POWER_SENSE`] is the single shared instance; GPIO ISRs write it and the
//! router, supervisor and energy monitor read it.

pub mod energy;
pub mod median;
pub mod power_sense;

pub use energy::EnergyMonitor;
pub use median::MedianFilter;
pub use power_sense::PowerSense;

/// Readings per battery sample burst.
pub const MEDIAN_FILTER_READINGS: usize = 7;

pub static POWER_SENSE: PowerSense = PowerSense::new();

/// Battery voltage sampler: a median over one burst of raw ADC readings.
#[derive(Debug, Default)]
pub struct BatterySampler {
    filter: MedianFilter<MEDIAN_FILTER_READINGS>,
}

impl BatterySampler {
    pub const fn new() -> Self {
        Self {
            filter: MedianFilter::new(),
        }
    }

    /// Sample through `read` and publish the median to `sense`.
    pub fn update(&mut self, sense: &PowerSense, read: impl FnMut() -> u16) -> u16 {
        let vbat = self.filter.sample(read);
        sense.set_vbat(vbat);
        vbat
    }
}
