//! Frame-to-frame board state machine.
//!
//! Each update copies `current` into `previous`, re-reads occupancy of all
//! nine cells, diffs the two vectors and classifies the difference:
//!
//! | disappeared | appeared | transition |
//! |---|---|---|
//! | 1 | 1 | `Move` |
//! | 0 | 1 | `Placement` |
//! | anything else | | `NoOp` |
//!
//! Only a placement resolves colour and touches the turn record. Violations
//! are reported in the [`UpdateReport`]; the tracker never corrects the board.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tictac_vision_core::{RgbImageView, CELL_COUNT};

use crate::actuator::ActuatorCommand;
use crate::classifier::{Cell, CellClassifier, ColorVerdict};
use crate::types::{BoardSnapshot, CellState, MarkerKind};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// What to do when one marker vanishes while another appears elsewhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovePolicy {
    /// Report the relocation as a rule violation for the operator.
    #[default]
    Reject,
    /// Treat it as a legal relocation.
    Accept,
}

/// Tracker policy.
///
/// A placement is forwarded to the actuator only when its colour is
/// `human_marker` and it raised no violation: a repeated colour is recorded on
/// the board but never commanded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Marker kind played by the human; only its placements are forwarded to
    /// the actuator.
    pub human_marker: MarkerKind,
    pub move_policy: MovePolicy,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            human_marker: MarkerKind::A,
            move_policy: MovePolicy::Reject,
        }
    }
}

/// Occupancy change between two consecutive vectors. The two lists are
/// disjoint and ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiff {
    /// Occupied before, empty now.
    pub disappeared: Vec<usize>,
    /// Empty before, occupied now.
    pub appeared: Vec<usize>,
}

impl CellDiff {
    pub fn between(
        previous: &[CellState; CELL_COUNT],
        current: &[CellState; CELL_COUNT],
    ) -> Self {
        let mut diff = CellDiff::default();
        for i in 0..CELL_COUNT {
            match (previous[i].is_occupied(), current[i].is_occupied()) {
                (true, false) => diff.disappeared.push(i),
                (false, true) => diff.appeared.push(i),
                _ => {}
            }
        }
        diff
    }

    pub fn is_unchanged(&self) -> bool {
        self.disappeared.is_empty() && self.appeared.is_empty()
    }
}

/// Raw classification of a [`CellDiff`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Move { from: usize, to: usize },
    Placement { cell: usize },
    NoOp,
}

/// Map a diff onto exactly one transition.
pub fn classify_transition(diff: &CellDiff) -> TransitionKind {
    match (diff.disappeared.as_slice(), diff.appeared.as_slice()) {
        ([from], [to]) => TransitionKind::Move {
            from: *from,
            to: *to,
        },
        ([], [cell]) => TransitionKind::Placement { cell: *cell },
        _ => TransitionKind::NoOp,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOpReason {
    /// Occupancy did not change.
    Unchanged,
    /// A single marker left the board.
    Removal { cell: usize },
    /// Several cells changed at once; no action is taken.
    MultiCellChange,
}

/// A single-cell placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub cell: usize,
    /// Resolved owner; `None` while the colour is indeterminate.
    pub color: Option<MarkerKind>,
    /// The colour was resolved on a later cycle than the placement itself.
    pub deferred: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardEvent {
    NoOp {
        reason: NoOpReason,
    },
    Placement(Placement),
    Move {
        from: usize,
        to: usize,
        owner: Option<MarkerKind>,
        accepted: bool,
    },
}

/// Structured rule violations. Reported only; the board is never corrected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleViolation {
    /// The same marker kind placed twice in a row.
    RepeatedTurn { marker: MarkerKind, cell: usize },
    /// More than one cell changed in a single cycle.
    MultiCellChange {
        appeared: Vec<usize>,
        disappeared: Vec<usize>,
    },
    /// A marker moved between cells under [`MovePolicy::Reject`].
    Relocation { from: usize, to: usize },
}

/// Everything one update cycle produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub frame: u64,
    pub diff: CellDiff,
    pub transition: TransitionKind,
    pub event: BoardEvent,
    pub violation: Option<RuleViolation>,
    pub turn_record: Option<MarkerKind>,
    /// Command to forward to the actuator. Set only for a human-coloured
    /// placement without a violation; `RepeatedTurn` withholds it.
    pub command: Option<ActuatorCommand>,
    pub snapshot: BoardSnapshot,
}

/// Both state vectors and the turn bookkeeping.
#[derive(Clone, Debug, Default)]
struct TrackState {
    previous: [CellState; CELL_COUNT],
    current: [CellState; CELL_COUNT],
    frame: u64,
    turn_record: Option<MarkerKind>,
    pending: Option<usize>,
}

/// Owns the calibrated cells and both state vectors.
#[derive(Clone, Debug)]
pub struct BoardStateTracker {
    cells: [Cell; CELL_COUNT],
    classifier: CellClassifier,
    params: TrackerParams,
    state: TrackState,
}

impl BoardStateTracker {
    /// Start tracking an empty board.
    pub fn seed(
        cells: [Cell; CELL_COUNT],
        classifier: CellClassifier,
        params: TrackerParams,
    ) -> Self {
        Self {
            cells,
            classifier,
            params,
            state: TrackState::default(),
        }
    }

    #[inline]
    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    #[inline]
    pub fn classifier(&self) -> &CellClassifier {
        &self.classifier
    }

    #[inline]
    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    #[inline]
    pub fn previous(&self) -> &[CellState; CELL_COUNT] {
        &self.state.previous
    }

    #[inline]
    pub fn current(&self) -> &[CellState; CELL_COUNT] {
        &self.state.current
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.state.snapshot()
    }

    /// Colour of the last accepted placement.
    #[inline]
    pub fn turn_record(&self) -> Option<MarkerKind> {
        self.state.turn_record
    }

    /// Colour expected next under alternation; `None` before the first
    /// placement.
    #[inline]
    pub fn expected_turn(&self) -> Option<MarkerKind> {
        self.state.turn_record.map(MarkerKind::other)
    }

    /// Cell whose placement is waiting for a determinate colour.
    #[inline]
    pub fn pending_placement(&self) -> Option<usize> {
        self.state.pending
    }

    /// Run one cycle on a frame.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(frame = self.state.frame + 1))
    )]
    pub fn update(&mut self, frame: &RgbImageView<'_>) -> UpdateReport {
        let occupancy: [bool; CELL_COUNT] = std::array::from_fn(|i| {
            self.classifier
                .classify_emptiness(frame, &self.cells[i])
                .state
                .is_occupied()
        });
        let classifier = &self.classifier;
        let cells = &self.cells;
        self.state.ingest(&self.params, occupancy, |i| {
            classifier.classify_color(frame, &cells[i])
        })
    }

    /// Run one cycle on precomputed occupancy. `resolve_color` is called at
    /// most once, for the placement or pending cell.
    pub fn ingest(
        &mut self,
        occupancy: [bool; CELL_COUNT],
        resolve_color: impl FnMut(usize) -> ColorVerdict,
    ) -> UpdateReport {
        self.state.ingest(&self.params, occupancy, resolve_color)
    }
}

impl TrackState {
    fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            cells: self.current,
            frame: self.frame,
        }
    }

    fn ingest(
        &mut self,
        params: &TrackerParams,
        occupancy: [bool; CELL_COUNT],
        mut resolve_color: impl FnMut(usize) -> ColorVerdict,
    ) -> UpdateReport {
        self.previous = self.current;
        self.frame += 1;

        // occupied cells keep the owner they already had
        let mut observed = self.previous;
        for (i, &occupied) in occupancy.iter().enumerate() {
            observed[i] = match (occupied, self.previous[i]) {
                (false, _) => CellState::Empty,
                (true, CellState::Occupied(owner)) => CellState::Occupied(owner),
                (true, CellState::Empty) => CellState::Occupied(None),
            };
        }

        let diff = CellDiff::between(&self.previous, &observed);
        let transition = classify_transition(&diff);

        let mut violation = None;
        let mut command = None;
        let event = match transition {
            TransitionKind::NoOp if diff.is_unchanged() => {
                self.current = observed;
                let retried = self.pending.and_then(|cell| {
                    let verdict = resolve_color(cell);
                    verdict.kind.map(|_| self.resolve_placement(params, cell, verdict, true))
                });
                match retried {
                    Some((event, v, c)) => {
                        violation = v;
                        command = c;
                        event
                    }
                    None => BoardEvent::NoOp {
                        reason: NoOpReason::Unchanged,
                    },
                }
            }
            TransitionKind::NoOp => {
                self.current = observed;
                if let ([cell], []) = (diff.disappeared.as_slice(), diff.appeared.as_slice()) {
                    info!("marker removed from cell {cell}");
                    BoardEvent::NoOp {
                        reason: NoOpReason::Removal { cell: *cell },
                    }
                } else {
                    warn!(
                        "multi-cell change (appeared {:?}, disappeared {:?}), no action taken",
                        diff.appeared, diff.disappeared
                    );
                    violation = Some(RuleViolation::MultiCellChange {
                        appeared: diff.appeared.clone(),
                        disappeared: diff.disappeared.clone(),
                    });
                    BoardEvent::NoOp {
                        reason: NoOpReason::MultiCellChange,
                    }
                }
            }
            TransitionKind::Placement { cell } => {
                self.current = observed;
                if let Some(old) = self.pending.take() {
                    warn!("new placement at cell {cell} while cell {old} is unresolved");
                }
                let verdict = resolve_color(cell);
                let (event, v, c) = self.resolve_placement(params, cell, verdict, false);
                violation = v;
                command = c;
                event
            }
            TransitionKind::Move { from, to } => {
                let owner = self.previous[from].owner();
                observed[to] = CellState::Occupied(owner);
                self.current = observed;
                let accepted = params.move_policy == MovePolicy::Accept;
                if accepted {
                    info!("marker {owner:?} relocated {from} -> {to}");
                } else {
                    warn!("marker {owner:?} moved {from} -> {to}, operator decision needed");
                    violation = Some(RuleViolation::Relocation { from, to });
                }
                BoardEvent::Move {
                    from,
                    to,
                    owner,
                    accepted,
                }
            }
        };

        if let Some(p) = self.pending {
            if self.current[p].is_empty() {
                debug!("pending placement at cell {p} emptied, dropping it");
                self.pending = None;
            }
        }

        UpdateReport {
            frame: self.frame,
            diff,
            transition,
            event,
            violation,
            turn_record: self.turn_record,
            command,
            snapshot: self.snapshot(),
        }
    }

    fn resolve_placement(
        &mut self,
        params: &TrackerParams,
        cell: usize,
        verdict: ColorVerdict,
        deferred: bool,
    ) -> (BoardEvent, Option<RuleViolation>, Option<ActuatorCommand>) {
        let Some(color) = verdict.kind else {
            info!(
                "placement at cell {cell} has indeterminate colour ({:?}), retrying later",
                verdict.rule
            );
            self.pending = Some(cell);
            let event = BoardEvent::Placement(Placement {
                cell,
                color: None,
                deferred,
            });
            return (event, None, None);
        };

        self.pending = None;
        self.current[cell] = CellState::Occupied(Some(color));

        let violation = match self.turn_record {
            Some(last) if last == color => {
                warn!(
                    "{color:?} placed twice in a row (cell {cell}), expected {:?}",
                    last.other()
                );
                Some(RuleViolation::RepeatedTurn {
                    marker: color,
                    cell,
                })
            }
            _ => {
                self.turn_record = Some(color);
                None
            }
        };

        let command = (violation.is_none() && color == params.human_marker)
            .then(|| ActuatorCommand::human_placement(cell));
        info!(
            "placement {color:?} at cell {cell}{}",
            if deferred { " (deferred)" } else { "" }
        );

        let event = BoardEvent::Placement(Placement {
            cell,
            color: Some(color),
            deferred,
        });
        (event, violation, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CellSample, ClassifierParams, ColorCounts};
    use tictac_vision_core::{CellRegion, Quad, RgbImage};

    fn dummy_cells() -> [Cell; CELL_COUNT] {
        std::array::from_fn(|i| {
            let x = (i % 3) as f32 * 10.0;
            let y = (i / 3) as f32 * 10.0;
            let region = CellRegion::from_quad(Quad::from_rect(x, y, x + 10.0, y + 10.0));
            let reference = CellSample {
                patch: RgbImage::filled(4, 4, [0, 0, 0]),
            };
            Cell::new(i, region, reference)
        })
    }

    fn tracker(params: TrackerParams) -> BoardStateTracker {
        BoardStateTracker::seed(dummy_cells(), CellClassifier::default(), params)
    }

    fn verdict(kind: Option<MarkerKind>) -> ColorVerdict {
        let counts = match kind {
            Some(MarkerKind::A) => ColorCounts { a: 900, b: 0, area: 1000 },
            Some(MarkerKind::B) => ColorCounts { a: 0, b: 900, area: 1000 },
            None => ColorCounts { a: 0, b: 0, area: 1000 },
        };
        ColorVerdict::from_counts(counts, &ClassifierParams::default())
    }

    fn occupancy(cells: &[usize]) -> [bool; CELL_COUNT] {
        let mut occ = [false; CELL_COUNT];
        for &c in cells {
            occ[c] = true;
        }
        occ
    }

    fn states_from_mask(mask: u32) -> [CellState; CELL_COUNT] {
        std::array::from_fn(|i| {
            if mask & (1 << i) != 0 {
                CellState::Occupied(None)
            } else {
                CellState::Empty
            }
        })
    }

    #[test]
    fn diff_sets_are_disjoint_and_bounded() {
        // every pair of occupancy vectors
        for prev in 0u32..512 {
            for curr in (0u32..512).step_by(7) {
                let diff = CellDiff::between(&states_from_mask(prev), &states_from_mask(curr));
                assert!(diff.disappeared.iter().all(|c| !diff.appeared.contains(c)));
                assert!(diff.disappeared.len() + diff.appeared.len() <= CELL_COUNT);
                assert_eq!(
                    diff.disappeared.len() + diff.appeared.len(),
                    (prev ^ curr).count_ones() as usize
                );
            }
        }
    }

    #[test]
    fn transition_table_is_exhaustive() {
        for d in 0..=CELL_COUNT {
            for a in 0..=(CELL_COUNT - d) {
                let diff = CellDiff {
                    disappeared: (0..d).collect(),
                    appeared: (d..d + a).collect(),
                };
                let expected = match (d, a) {
                    (1, 1) => TransitionKind::Move { from: 0, to: 1 },
                    (0, 1) => TransitionKind::Placement { cell: 0 },
                    _ => TransitionKind::NoOp,
                };
                assert_eq!(classify_transition(&diff), expected, "d={d} a={a}");
            }
        }
    }

    #[test]
    fn alternating_turns_raise_no_violation() {
        let mut t = tracker(TrackerParams::default());
        let script = [
            (4, MarkerKind::A),
            (0, MarkerKind::B),
            (8, MarkerKind::A),
            (2, MarkerKind::B),
        ];
        let mut placed = Vec::new();
        assert_eq!(t.expected_turn(), None);
        for (cell, kind) in script {
            placed.push(cell);
            let report = t.ingest(occupancy(&placed), |_| verdict(Some(kind)));
            assert_eq!(report.violation, None);
            assert_eq!(t.turn_record(), Some(kind));
            assert_eq!(t.expected_turn(), Some(kind.other()));
            assert_eq!(t.current()[cell], CellState::Occupied(Some(kind)));
        }
    }

    #[test]
    fn repeated_turn_is_flagged_and_recorded() {
        let mut t = tracker(TrackerParams::default());
        let first = t.ingest(occupancy(&[0]), |_| verdict(Some(MarkerKind::A)));
        assert_eq!(first.command, Some(ActuatorCommand::human_placement(0)));

        let second = t.ingest(occupancy(&[0, 1]), |_| verdict(Some(MarkerKind::A)));
        assert_eq!(
            second.violation,
            Some(RuleViolation::RepeatedTurn {
                marker: MarkerKind::A,
                cell: 1
            })
        );
        assert_eq!(second.command, None);
        assert_eq!(t.turn_record(), Some(MarkerKind::A));
        assert_eq!(t.current()[1], CellState::Occupied(Some(MarkerKind::A)));
    }

    #[test]
    fn machine_placements_are_not_forwarded() {
        let mut t = tracker(TrackerParams::default());
        let report = t.ingest(occupancy(&[3]), |_| verdict(Some(MarkerKind::B)));
        assert_eq!(t.turn_record(), Some(MarkerKind::B));
        assert_eq!(report.command, None);
    }

    #[test]
    fn two_appearances_are_a_noop() {
        let mut t = tracker(TrackerParams::default());
        let mut resolved = 0;
        let report = t.ingest(occupancy(&[1, 7]), |_| {
            resolved += 1;
            verdict(Some(MarkerKind::A))
        });
        assert_eq!(resolved, 0);
        assert_eq!(report.transition, TransitionKind::NoOp);
        assert_eq!(
            report.event,
            BoardEvent::NoOp {
                reason: NoOpReason::MultiCellChange
            }
        );
        assert!(matches!(
            report.violation,
            Some(RuleViolation::MultiCellChange { ref appeared, .. }) if appeared == &vec![1, 7]
        ));
        assert_eq!(report.command, None);
        assert_eq!(t.turn_record(), None);
        assert_eq!(t.current()[1], CellState::Occupied(None));

        // the same reading again is simply unchanged
        let again = t.ingest(occupancy(&[1, 7]), |_| verdict(Some(MarkerKind::A)));
        assert_eq!(
            again.event,
            BoardEvent::NoOp {
                reason: NoOpReason::Unchanged
            }
        );
        assert_eq!(again.violation, None);
    }

    #[test]
    fn single_removal_is_committed_without_violation() {
        let mut t = tracker(TrackerParams::default());
        t.ingest(occupancy(&[4]), |_| verdict(Some(MarkerKind::A)));
        let report = t.ingest(occupancy(&[]), |_| verdict(None));
        assert_eq!(
            report.event,
            BoardEvent::NoOp {
                reason: NoOpReason::Removal { cell: 4 }
            }
        );
        assert_eq!(report.violation, None);
        assert_eq!(t.current()[4], CellState::Empty);
        assert_eq!(t.turn_record(), Some(MarkerKind::A));
    }

    #[test]
    fn unknown_colour_is_retried_until_resolved() {
        let mut t = tracker(TrackerParams::default());
        let report = t.ingest(occupancy(&[5]), |_| verdict(None));
        assert_eq!(
            report.event,
            BoardEvent::Placement(Placement {
                cell: 5,
                color: None,
                deferred: false
            })
        );
        assert_eq!(report.command, None);
        assert_eq!(t.turn_record(), None);
        assert_eq!(t.pending_placement(), Some(5));

        let still = t.ingest(occupancy(&[5]), |_| verdict(None));
        assert_eq!(
            still.event,
            BoardEvent::NoOp {
                reason: NoOpReason::Unchanged
            }
        );

        let resolved = t.ingest(occupancy(&[5]), |cell| {
            assert_eq!(cell, 5);
            verdict(Some(MarkerKind::A))
        });
        assert_eq!(
            resolved.event,
            BoardEvent::Placement(Placement {
                cell: 5,
                color: Some(MarkerKind::A),
                deferred: true
            })
        );
        assert_eq!(resolved.command, Some(ActuatorCommand::human_placement(5)));
        assert_eq!(t.pending_placement(), None);
        assert_eq!(t.turn_record(), Some(MarkerKind::A));
    }

    #[test]
    fn pending_cell_is_dropped_when_it_empties() {
        let mut t = tracker(TrackerParams::default());
        t.ingest(occupancy(&[2]), |_| verdict(None));
        assert_eq!(t.pending_placement(), Some(2));
        t.ingest(occupancy(&[]), |_| verdict(Some(MarkerKind::A)));
        assert_eq!(t.pending_placement(), None);
        assert_eq!(t.turn_record(), None);
    }

    #[test]
    fn moves_carry_the_owner_and_follow_the_policy() {
        for policy in [MovePolicy::Reject, MovePolicy::Accept] {
            let mut t = tracker(TrackerParams {
                move_policy: policy,
                ..TrackerParams::default()
            });
            t.ingest(occupancy(&[0]), |_| verdict(Some(MarkerKind::A)));
            let report = t.ingest(occupancy(&[6]), |_| {
                panic!("moves do not resolve colour")
            });
            assert_eq!(report.transition, TransitionKind::Move { from: 0, to: 6 });
            assert_eq!(
                report.event,
                BoardEvent::Move {
                    from: 0,
                    to: 6,
                    owner: Some(MarkerKind::A),
                    accepted: policy == MovePolicy::Accept
                }
            );
            let expected_violation = match policy {
                MovePolicy::Reject => Some(RuleViolation::Relocation { from: 0, to: 6 }),
                MovePolicy::Accept => None,
            };
            assert_eq!(report.violation, expected_violation);
            assert_eq!(report.command, None);
            assert_eq!(t.turn_record(), Some(MarkerKind::A));
            assert_eq!(t.current()[6], CellState::Occupied(Some(MarkerKind::A)));
            assert_eq!(t.current()[0], CellState::Empty);
        }
    }

    #[test]
    fn previous_and_frame_counter_advance() {
        let mut t = tracker(TrackerParams::default());
        t.ingest(occupancy(&[4]), |_| verdict(Some(MarkerKind::A)));
        let report = t.ingest(occupancy(&[4]), |_| verdict(Some(MarkerKind::B)));
        assert_eq!(report.frame, 2);
        assert_eq!(t.previous(), t.current());
        assert_eq!(t.snapshot().frame, 2);
        assert_eq!(t.current()[4], CellState::Occupied(Some(MarkerKind::A)));
        assert_eq!(
            report.event,
            BoardEvent::NoOp {
                reason: NoOpReason::Unchanged
            }
        );
    }
}
