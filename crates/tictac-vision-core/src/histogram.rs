use crate::{luma, RgbImage};

/// Grey-level histogram with a fixed number of equal-width bins over `0..=255`.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityHistogram {
    bins: Vec<f32>,
}

impl IntensityHistogram {
    /// Histogram of raw grey values. `bins` is clamped to `1..=256`.
    pub fn from_values(values: impl IntoIterator<Item = u8>, bins: usize) -> Self {
        let n = bins.clamp(1, 256);
        let mut out = vec![0.0f32; n];
        for v in values {
            out[v as usize * n / 256] += 1.0;
        }
        Self { bins: out }
    }

    /// Histogram of the luma of every pixel.
    pub fn from_rgb(img: &RgbImage, bins: usize) -> Self {
        Self::from_values(img.pixels().map(luma), bins)
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Rescale so that the smallest bin is 0 and the largest 1.
    ///
    /// A flat histogram maps to all zeros.
    pub fn normalized_min_max(&self) -> Self {
        let min = self.bins.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.bins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span = max - min;
        let bins = if span > 0.0 {
            self.bins.iter().map(|b| (b - min) / span).collect()
        } else {
            vec![0.0; self.bins.len()]
        };
        Self { bins }
    }

    /// Pearson correlation in `[-1, 1]`.
    ///
    /// Two histograms with zero variance correlate at 1 when identical and 0
    /// otherwise; histograms of different length correlate at 0.
    pub fn correlation(&self, other: &Self) -> f32 {
        if self.bins.len() != other.bins.len() || self.bins.is_empty() {
            return 0.0;
        }
        let n = self.bins.len() as f64;
        let ma = self.bins.iter().map(|&v| v as f64).sum::<f64>() / n;
        let mb = other.bins.iter().map(|&v| v as f64).sum::<f64>() / n;

        let mut num = 0.0f64;
        let mut va = 0.0f64;
        let mut vb = 0.0f64;
        for (&a, &b) in self.bins.iter().zip(&other.bins) {
            let da = a as f64 - ma;
            let db = b as f64 - mb;
            num += da * db;
            va += da * da;
            vb += db * db;
        }
        let den = (va * vb).sqrt();
        if den < 1e-12 {
            return if self.bins == other.bins { 1.0 } else { 0.0 };
        }
        (num / den).clamp(-1.0, 1.0) as f32
    }
}
