//! Median filter for noisy ADC channels.
//!
//! A burst of `N` readings is comb-sorted in place; the median (index
//! `N / 2`) rejects single-sample spikes without the latency of a running
//! average.

#[derive(Debug, Clone)]
pub struct MedianFilter<const N: usize> {
    buffer: [u16; N],
}

impl<const N: usize> Default for MedianFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MedianFilter<N> {
    pub const fn new() -> Self {
        Self { buffer: [0; N] }
    }

    pub fn set(&mut self, idx: usize, value: u16) {
        if let Some(slot) = self.buffer.get_mut(idx) {
            *slot = value;
        }
    }

    /// Fill the buffer from `read` and return the median.
    pub fn sample(&mut self, mut read: impl FnMut() -> u16) -> u16 {
        for slot in &mut self.buffer {
            *slot = read();
        }
        self.median()
    }

    pub fn median(&mut self) -> u16 {
        if N == 0 {
            return 0;
        }
        self.sort();
        self.buffer[N / 2]
    }

    /// Mean of the `samples` middle values after sorting.
    pub fn trimmed_average(&mut self, samples: usize) -> Option<u16> {
        if samples == 0 || N == 0 {
            return None;
        }
        let samples = samples.min(N);
        let start = (N - samples) / 2;
        self.sort();
        let sum: u32 = self.buffer[start..start + samples]
            .iter()
            .map(|&v| u32::from(v))
            .sum();
        u16::try_from(sum / samples as u32).ok()
    }

    // Comb sort, shrink factor 1.3.
    fn sort(&mut self) {
        let mut gap = N;
        let mut swapped = true;
        while gap > 1 || swapped {
            gap = (gap * 10 / 13).max(1);
            swapped = false;
            for i in 0..N.saturating_sub(gap) {
                if self.buffer[i] > self.buffer[i + gap] {
                    self.buffer.swap(i, i + gap);
                    swapped = true;
                }
            }
        }
    }
}
