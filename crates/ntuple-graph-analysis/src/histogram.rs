//! Weighted 1D histograms and counters.

use serde::Serialize;

use crate::error::{AnalysisResult, InvalidBinningSnafu};

/// A weighted 1D histogram with uniform bins.
///
/// Entries below the first edge go to `underflow`, entries at or above the
/// last edge (and NaN) go to `overflow`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histo1D {
    /// Bin edges, `bins + 1` of them.
    pub edges: Vec<f64>,
    /// Sum of weights per bin.
    pub sumw: Vec<f64>,
    /// Sum of squared weights per bin.
    pub sumw2: Vec<f64>,
    /// Sum of weights below range.
    pub underflow: f64,
    /// Sum of weights above range.
    pub overflow: f64,
    /// Number of fills, flows included.
    pub entries: u64,
}

impl Histo1D {
    /// `bins` equal bins over `[min, max)`.
    pub fn uniform(name: &str, bins: usize, min: f64, max: f64) -> AnalysisResult<Self> {
        ensure_binning(name, bins, min, max)?;
        let width = (max - min) / bins as f64;
        let mut edges: Vec<f64> = (0..bins).map(|i| min + width * i as f64).collect();
        edges.push(max);
        Ok(Self {
            edges,
            sumw: vec![0.0; bins],
            sumw2: vec![0.0; bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    /// Number of in-range bins.
    pub fn bins(&self) -> usize {
        self.sumw.len()
    }

    /// Bin holding `x`, `None` for under- or overflow.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        let (first, last) = (self.edges[0], self.edges[self.edges.len() - 1]);
        if x.is_nan() || x < first || x >= last {
            return None;
        }
        // partition_point gives the first edge strictly above x
        let idx = self.edges.partition_point(|e| *e <= x);
        Some((idx - 1).min(self.bins() - 1))
    }

    /// Add `x` with weight `w`.
    pub fn fill(&mut self, x: f64, w: f64) {
        self.entries += 1;
        match self.find_bin(x) {
            Some(bin) => {
                self.sumw[bin] += w;
                self.sumw2[bin] += w * w;
            }
            None if x < self.edges[0] => self.underflow += w,
            None => self.overflow += w,
        }
    }

    /// Sum of weights over all bins and flows.
    pub fn integral(&self) -> f64 {
        self.sumw.iter().sum::<f64>() + self.underflow + self.overflow
    }

    /// Multiply every sum by `factor` (squared sums by its square).
    pub fn scale(&mut self, factor: f64) {
        for w in &mut self.sumw {
            *w *= factor;
        }
        for w2 in &mut self.sumw2 {
            *w2 *= factor * factor;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }
}

fn ensure_binning(name: &str, bins: usize, min: f64, max: f64) -> AnalysisResult<()> {
    snafu::ensure!(
        bins > 0 && min.is_finite() && max.is_finite() && min < max,
        InvalidBinningSnafu {
            name,
            bins,
            min,
            max,
        }
    );
    Ok(())
}

/// A weighted event counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Counter {
    /// Sum of weights.
    pub sumw: f64,
    /// Sum of squared weights.
    pub sumw2: f64,
    /// Number of fills.
    pub entries: u64,
}

impl Counter {
    /// Count one event with weight `w`.
    pub fn fill(&mut self, w: f64) {
        self.sumw += w;
        self.sumw2 += w * w;
        self.entries += 1;
    }

    /// Statistical uncertainty on `sumw`.
    pub fn error(&self) -> f64 {
        self.sumw2.sqrt()
    }
}
