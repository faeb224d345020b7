//! Per-cell classification: emptiness against a calibrated reference, then
//! marker colour.

use log::trace;
use serde::{Deserialize, Serialize};
use tictac_vision_core::{
    warp_quad_rgb, CellRegion, ColorEnvelope, HsvRange, IntensityHistogram, RgbImage,
    RgbImageView, CELL_COUNT,
};

use crate::types::{CellState, MarkerKind};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// How a cell region is turned into a canonical patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleParams {
    /// Fraction trimmed from each side of the region before sampling.
    pub inset_frac: f32,
    /// Side of the square patch in pixels.
    pub patch_size: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            inset_frac: 0.2,
            patch_size: 32,
        }
    }
}

/// Thresholds for both evidence channels. Values are per deployment; the
/// defaults suit a red board with white and black markers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub sample: SampleParams,
    /// Number of grey-level bins used for the similarity score.
    pub histogram_bins: usize,
    /// A cell is empty when its similarity to the reference is at least this.
    pub empty_similarity_threshold: f32,
    pub marker_a: ColorEnvelope,
    pub marker_b: ColorEnvelope,
    /// Minimum winning pixel count, as a fraction of the sample area.
    pub pixel_floor_frac: f32,
    /// Counts closer than this fraction of the sample area are a tie.
    pub tie_margin_frac: f32,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            sample: SampleParams::default(),
            histogram_bins: 16,
            empty_similarity_threshold: 0.8,
            marker_a: ColorEnvelope::single(HsvRange::new([0, 0, 200], [179, 30, 255])),
            marker_b: ColorEnvelope::single(HsvRange::new([0, 0, 0], [179, 255, 60])),
            pixel_floor_frac: 0.10,
            tie_margin_frac: 0.02,
        }
    }
}

/// Canonical RGB patch of one cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellSample {
    pub patch: RgbImage,
}

impl CellSample {
    pub fn area(&self) -> usize {
        self.patch.pixel_count()
    }
}

/// A calibrated cell: fixed index, region and the reference sample taken
/// while the board was empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    index: usize,
    region: CellRegion,
    reference: CellSample,
}

impl Cell {
    pub fn new(index: usize, region: CellRegion, reference: CellSample) -> Self {
        Self {
            index,
            region,
            reference,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn region(&self) -> &CellRegion {
        &self.region
    }

    #[inline]
    pub fn reference(&self) -> &CellSample {
        &self.reference
    }
}

/// Result of the emptiness test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmptinessReading {
    /// `Empty` or `Occupied(None)`.
    pub state: CellState,
    pub similarity: f32,
}

impl EmptinessReading {
    /// A cell is empty only when its similarity strictly exceeds `threshold`.
    pub fn from_similarity(similarity: f32, threshold: f32) -> Self {
        let state = if similarity > threshold {
            CellState::Empty
        } else {
            CellState::Occupied(None)
        };
        Self { state, similarity }
    }
}

/// Which row of the colour decision table fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorRule {
    /// Neither envelope reached the pixel floor.
    BelowFloor,
    /// Both envelopes matched about equally.
    Tied,
    MarkerA,
    MarkerB,
}

/// Envelope pixel counts of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCounts {
    pub a: usize,
    pub b: usize,
    pub area: usize,
}

type RulePredicate = fn(&ColorCounts, &ClassifierParams) -> bool;

fn below_floor(c: &ColorCounts, p: &ClassifierParams) -> bool {
    c.a.max(c.b) as f32 <= p.pixel_floor_frac * c.area as f32
}

fn tied(c: &ColorCounts, p: &ClassifierParams) -> bool {
    c.a.abs_diff(c.b) as f32 <= p.tie_margin_frac * c.area as f32
}

fn a_wins(c: &ColorCounts, _: &ClassifierParams) -> bool {
    c.a > c.b
}

fn always(_: &ColorCounts, _: &ClassifierParams) -> bool {
    true
}

/// Colour decision table, evaluated top to bottom; the first match wins.
pub const COLOR_RULES: [(ColorRule, RulePredicate); 4] = [
    (ColorRule::BelowFloor, below_floor),
    (ColorRule::Tied, tied),
    (ColorRule::MarkerA, a_wins),
    (ColorRule::MarkerB, always),
];

impl ColorRule {
    pub fn marker(self) -> Option<MarkerKind> {
        match self {
            ColorRule::MarkerA => Some(MarkerKind::A),
            ColorRule::MarkerB => Some(MarkerKind::B),
            ColorRule::BelowFloor | ColorRule::Tied => None,
        }
    }

    /// First rule of [`COLOR_RULES`] matching `counts`.
    pub fn decide(counts: &ColorCounts, params: &ClassifierParams) -> ColorRule {
        COLOR_RULES
            .iter()
            .find(|(_, pred)| pred(counts, params))
            .map(|(rule, _)| *rule)
            .unwrap_or(ColorRule::MarkerB)
    }
}

/// Outcome of the colour test. `kind == None` is an indeterminate colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVerdict {
    pub kind: Option<MarkerKind>,
    pub rule: ColorRule,
    pub counts: ColorCounts,
}

impl ColorVerdict {
    pub fn from_counts(counts: ColorCounts, params: &ClassifierParams) -> Self {
        let rule = ColorRule::decide(&counts, params);
        Self {
            kind: rule.marker(),
            rule,
            counts,
        }
    }
}

/// Stateless cell classifier.
#[derive(Clone, Debug, Default)]
pub struct CellClassifier {
    params: ClassifierParams,
}

impl CellClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Warp the inset region into a `patch_size²` patch. Degenerate regions
    /// sample as black.
    pub fn sample(&self, frame: &RgbImageView<'_>, region: &CellRegion) -> CellSample {
        let size = self.params.sample.patch_size.max(1);
        let quad = region.quad.inset(self.params.sample.inset_frac);
        let patch = warp_quad_rgb(frame, &quad, size)
            .unwrap_or_else(|| RgbImage::filled(size, size, [0, 0, 0]));
        CellSample { patch }
    }

    /// Reference sample of a region on the empty board.
    pub fn capture_reference(&self, frame: &RgbImageView<'_>, region: &CellRegion) -> CellSample {
        self.sample(frame, region)
    }

    /// Capture references for all nine regions, producing calibrated cells.
    pub fn capture_cells(
        &self,
        frame: &RgbImageView<'_>,
        regions: &[CellRegion; CELL_COUNT],
    ) -> [Cell; CELL_COUNT] {
        std::array::from_fn(|i| {
            let reference = self.capture_reference(frame, &regions[i]);
            Cell::new(i, regions[i], reference)
        })
    }

    /// Similarity of two samples in `[0, 1]`: correlation of their min-max
    /// normalized grey histograms, negative values clamped to 0.
    pub fn similarity(&self, sample: &CellSample, reference: &CellSample) -> f32 {
        let bins = self.params.histogram_bins;
        let a = IntensityHistogram::from_rgb(&sample.patch, bins).normalized_min_max();
        let b = IntensityHistogram::from_rgb(&reference.patch, bins).normalized_min_max();
        a.correlation(&b).max(0.0)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, cell), fields(cell = cell.index()))
    )]
    pub fn classify_emptiness(&self, frame: &RgbImageView<'_>, cell: &Cell) -> EmptinessReading {
        let sample = self.sample(frame, cell.region());
        self.emptiness_of(&sample, cell)
    }

    fn emptiness_of(&self, sample: &CellSample, cell: &Cell) -> EmptinessReading {
        let similarity = self.similarity(sample, cell.reference());
        let reading =
            EmptinessReading::from_similarity(similarity, self.params.empty_similarity_threshold);
        trace!("cell {} similarity {:.3} -> {:?}", cell.index(), similarity, reading.state);
        reading
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, cell), fields(cell = cell.index()))
    )]
    pub fn classify_color(&self, frame: &RgbImageView<'_>, cell: &Cell) -> ColorVerdict {
        let sample = self.sample(frame, cell.region());
        self.color_of(&sample)
    }

    /// Colour test on an already sampled patch.
    pub fn color_of(&self, sample: &CellSample) -> ColorVerdict {
        let counts = ColorCounts {
            a: self.params.marker_a.count_in(&sample.patch),
            b: self.params.marker_b.count_in(&sample.patch),
            area: sample.area(),
        };
        let verdict = ColorVerdict::from_counts(counts, &self.params);
        trace!(
            "colour counts a={} b={} of {} -> {:?}",
            counts.a,
            counts.b,
            counts.area,
            verdict.rule
        );
        verdict
    }

    /// Full reading: emptiness first, colour only for non-empty cells.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, cell), fields(cell = cell.index()))
    )]
    pub fn classify(&self, frame: &RgbImageView<'_>, cell: &Cell) -> CellState {
        let sample = self.sample(frame, cell.region());
        match self.emptiness_of(&sample, cell).state {
            CellState::Empty => CellState::Empty,
            CellState::Occupied(_) => CellState::Occupied(self.color_of(&sample).kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tictac_vision_core::Quad;

    fn counts(a: usize, b: usize) -> ColorCounts {
        ColorCounts { a, b, area: 1000 }
    }

    #[test]
    fn rule_table_branches() {
        let p = ClassifierParams::default();
        // floor is 100 px, tie margin 20 px
        assert_eq!(ColorRule::decide(&counts(100, 0), &p), ColorRule::BelowFloor);
        assert_eq!(ColorRule::decide(&counts(0, 0), &p), ColorRule::BelowFloor);
        assert_eq!(ColorRule::decide(&counts(400, 390), &p), ColorRule::Tied);
        assert_eq!(ColorRule::decide(&counts(400, 100), &p), ColorRule::MarkerA);
        assert_eq!(ColorRule::decide(&counts(101, 0), &p), ColorRule::MarkerA);
        assert_eq!(ColorRule::decide(&counts(50, 700), &p), ColorRule::MarkerB);
    }

    #[test]
    fn floor_is_checked_before_tie() {
        let p = ClassifierParams::default();
        let v = ColorVerdict::from_counts(counts(60, 60), &p);
        assert_eq!(v.rule, ColorRule::BelowFloor);
        assert_eq!(v.kind, None);
    }

    #[test]
    fn thresholds_are_configurable() {
        let p = ClassifierParams {
            pixel_floor_frac: 0.5,
            ..ClassifierParams::default()
        };
        assert_eq!(ColorRule::decide(&counts(400, 0), &p), ColorRule::BelowFloor);
    }

    fn two_tone(width: usize, height: usize, split: usize) -> RgbImage {
        let mut img = RgbImage::filled(width, height, [200, 40, 40]);
        for y in 0..height {
            for x in 0..split {
                img.put_pixel(x, y, [245, 245, 245]);
            }
        }
        img
    }

    #[test]
    fn empty_and_occupied_cells() {
        let classifier = CellClassifier::default();
        let region = CellRegion::from_quad(Quad::from_rect(10.0, 10.0, 90.0, 90.0));
        let empty = RgbImage::filled(100, 100, [200, 40, 40]);
        let cell = Cell::new(0, region, classifier.capture_reference(&empty.view(), &region));

        let reading = classifier.classify_emptiness(&empty.view(), &cell);
        assert_eq!(reading.state, CellState::Empty);
        assert_relative_eq!(reading.similarity, 1.0, epsilon = 1e-6);

        let white = RgbImage::filled(100, 100, [245, 245, 245]);
        assert_eq!(
            classifier.classify(&white.view(), &cell),
            CellState::Occupied(Some(MarkerKind::A))
        );
        let black = RgbImage::filled(100, 100, [20, 20, 20]);
        assert_eq!(
            classifier.classify(&black.view(), &cell),
            CellState::Occupied(Some(MarkerKind::B))
        );
        // occupied, but green matches neither envelope
        let green = RgbImage::filled(100, 100, [30, 200, 30]);
        assert_eq!(classifier.classify(&green.view(), &cell), CellState::Occupied(None));
    }

    #[test]
    fn threshold_itself_reads_as_occupied() {
        let at = EmptinessReading::from_similarity(0.8, 0.8);
        assert_eq!(at.state, CellState::Occupied(None));
        assert_eq!(at.similarity, 0.8);
        assert_eq!(
            EmptinessReading::from_similarity(0.81, 0.8).state,
            CellState::Empty
        );
        assert_eq!(
            EmptinessReading::from_similarity(0.0, 0.0).state,
            CellState::Occupied(None)
        );

        // an identical patch no longer counts as empty once the bar is 1.0
        let classifier = CellClassifier::new(ClassifierParams {
            empty_similarity_threshold: 1.0,
            ..ClassifierParams::default()
        });
        let region = CellRegion::from_quad(Quad::from_rect(10.0, 10.0, 90.0, 90.0));
        let empty = RgbImage::filled(100, 100, [200, 40, 40]);
        let cell = Cell::new(0, region, classifier.capture_reference(&empty.view(), &region));
        assert_eq!(
            classifier.classify_emptiness(&empty.view(), &cell).state,
            CellState::Occupied(None)
        );
    }

    #[test]
    fn small_intrusion_stays_empty() {
        let classifier = CellClassifier::default();
        let region = CellRegion::from_quad(Quad::from_rect(0.0, 0.0, 100.0, 100.0));
        let empty = RgbImage::filled(100, 100, [200, 40, 40]);
        let cell = Cell::new(3, region, classifier.capture_reference(&empty.view(), &region));
        // white strip covering a fifth of the sampled area
        let frame = two_tone(100, 100, 32);
        let reading = classifier.classify_emptiness(&frame.view(), &cell);
        assert_eq!(reading.state, CellState::Empty, "similarity {}", reading.similarity);
    }

    #[test]
    fn classification_is_pure() {
        let classifier = CellClassifier::default();
        let region = CellRegion::from_quad(Quad::from_rect(0.0, 0.0, 100.0, 100.0));
        let empty = RgbImage::filled(100, 100, [200, 40, 40]);
        let cell = Cell::new(0, region, classifier.capture_reference(&empty.view(), &region));
        let frame = two_tone(100, 100, 60);
        let first = classifier.classify(&frame.view(), &cell);
        let second = classifier.classify(&frame.view(), &cell);
        assert_eq!(first, second);
        assert_eq!(
            classifier.classify_emptiness(&frame.view(), &cell),
            classifier.classify_emptiness(&frame.view(), &cell)
        );
    }

    #[test]
    fn params_round_trip_with_defaults_filled_in() {
        let p: ClassifierParams =
            serde_json::from_str(r#"{ "empty_similarity_threshold": 0.75 }"#).expect("parse");
        assert_relative_eq!(p.empty_similarity_threshold, 0.75);
        assert_eq!(p.histogram_bins, 16);
        assert_eq!(p.sample, SampleParams::default());
    }
}
