//! Spin/cascade sequencer: deadline-driven state machine for one session.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cascade::apply_cascade;
use crate::cluster::{Cluster, find_clusters};
use crate::grid::{COLS, Grid, guaranteed_match_grid, no_match_grid};

/// Time for one column to drop out / back in.
pub const DROP_TIME_MS: u64 = 100;
/// Extra delay per column; columns animate left to right.
pub const COLUMN_STAGGER_MS: u64 = 70;
/// Landing window after the last column arrives, before match checking.
pub const SETTLE_MS: u64 = 600;
/// How long matched clusters stay highlighted before they clear.
pub const HIGHLIGHT_MS: u64 = 1000;
/// Disappear animation window for cleared cells.
pub const DISAPPEAR_MS: u64 = 450;
/// Settling window after a cascade drops new symbols in.
pub const CASCADE_SETTLE_MS: u64 = 600;

/// The spin whose grid is drawn with a guaranteed match. Fixed by design.
pub const WINNING_SPIN: u32 = 2;

/// Full exit + staggered entry duration of the spin animation.
pub fn spin_duration() -> Duration {
    Duration::from_millis(DROP_TIME_MS + COLS as u64 * COLUMN_STAGGER_MS)
}

/// Where the sequencer is in the spin cycle. `Highlighting`, `Clearing` and
/// `Cascading` together form the resolve loop, re-entered until a cascade
/// leaves no clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Spinning,
    Settling,
    Highlighting,
    Clearing,
    Cascading,
}

/// Supplies grids to the sequencer. The production impl wraps the random
/// generators; tests inject deterministic stubs to observe call selection.
pub trait GridSource {
    fn no_match(&mut self) -> Grid;
    fn guaranteed_match(&mut self) -> Grid;
    fn cascade(&mut self, grid: &Grid, clusters: &[Cluster]) -> Grid;
}

/// [`GridSource`] backed by the uniform per-cell distribution.
pub struct RngGridSource<R: Rng> {
    rng: R,
}

impl RngGridSource<StdRng> {
    /// Seeded for reproducible sessions, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { rng }
    }
}

impl<R: Rng> GridSource for RngGridSource<R> {
    fn no_match(&mut self) -> Grid {
        no_match_grid(&mut self.rng)
    }

    fn guaranteed_match(&mut self) -> Grid {
        guaranteed_match_grid(&mut self.rng)
    }

    fn cascade(&mut self, grid: &Grid, clusters: &[Cluster]) -> Grid {
        apply_cascade(grid, clusters, &mut self.rng)
    }
}

/// Owns the session state (current grid, busy flag, spin count) and steps the
/// phase machine. All suspension happens at fixed timer deadlines: `tick`
/// advances through every deadline that has passed, so a late caller still
/// lands in the right phase.
pub struct Sequencer<S: GridSource> {
    source: S,
    grid: Grid,
    /// Grid requested at trigger time; becomes current when the spin lands.
    pending: Option<Grid>,
    clusters: Vec<Cluster>,
    phase: Phase,
    /// When the current phase ends. None only in `Idle`.
    deadline: Option<Instant>,
    phase_started: Instant,
    busy: bool,
    spin_count: u32,
    cascade_count: u32,
}

impl<S: GridSource> Sequencer<S> {
    /// Start idle on a grid with no matches, as the session's first render.
    pub fn new(mut source: S, now: Instant) -> Self {
        let grid = source.no_match();
        Self {
            source,
            grid,
            pending: None,
            clusters: Vec::new(),
            phase: Phase::Idle,
            deadline: None,
            phase_started: now,
            busy: false,
            spin_count: 0,
            cascade_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn spin_count(&self) -> u32 {
        self.spin_count
    }

    /// Cascades resolved over the session (for the sidebar).
    pub fn cascade_count(&self) -> u32 {
        self.cascade_count
    }

    /// Elapsed time in the current phase, for animation progress.
    pub fn phase_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.phase_started)
    }

    /// The single inbound action. Returns false (and does nothing) while a
    /// spin is in flight — a deliberate debounce, not an error.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        self.spin_count += 1;
        let next = if self.spin_count == WINNING_SPIN {
            self.source.guaranteed_match()
        } else {
            self.source.no_match()
        };
        self.pending = Some(next);
        self.clusters.clear();
        self.enter(Phase::Spinning, now, spin_duration());
        true
    }

    /// Advance through every phase deadline at or before `now`.
    pub fn tick(&mut self, now: Instant) {
        while let Some(deadline) = self.deadline {
            if now < deadline {
                break;
            }
            self.advance(deadline);
        }
    }

    fn enter(&mut self, phase: Phase, now: Instant, duration: Duration) {
        self.phase = phase;
        self.phase_started = now;
        self.deadline = Some(now + duration);
    }

    fn go_idle(&mut self, now: Instant) {
        self.phase = Phase::Idle;
        self.phase_started = now;
        self.deadline = None;
        self.busy = false;
        self.clusters.clear();
    }

    /// One transition, taken exactly at the expired deadline so chained
    /// phases keep their nominal spacing regardless of tick jitter.
    fn advance(&mut self, at: Instant) {
        match self.phase {
            Phase::Idle => unreachable!("idle has no deadline"),
            Phase::Spinning => {
                if let Some(next) = self.pending.take() {
                    self.grid = next;
                }
                self.enter(Phase::Settling, at, Duration::from_millis(SETTLE_MS));
            }
            Phase::Settling | Phase::Cascading => {
                self.clusters = find_clusters(&self.grid);
                if self.clusters.is_empty() {
                    self.go_idle(at);
                } else {
                    self.enter(Phase::Highlighting, at, Duration::from_millis(HIGHLIGHT_MS));
                }
            }
            Phase::Highlighting => {
                self.enter(Phase::Clearing, at, Duration::from_millis(DISAPPEAR_MS));
            }
            Phase::Clearing => {
                self.grid = self.source.cascade(&self.grid, &self.clusters);
                self.cascade_count += 1;
                self.enter(
                    Phase::Cascading,
                    at,
                    Duration::from_millis(CASCADE_SETTLE_MS),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ROWS, Symbol};

    fn matchless() -> Grid {
        Grid::from_fn(|c, r| {
            if (c + r) % 2 == 0 {
                Symbol::Cherry
            } else {
                Symbol::Lemon
            }
        })
    }

    /// One full column of Sevens: exactly one 7-cell cluster.
    fn one_winning_column() -> Grid {
        Grid::from_fn(|c, r| {
            if c == 3 {
                Symbol::Seven
            } else if (c + r) % 2 == 0 {
                Symbol::Cherry
            } else {
                Symbol::Lemon
            }
        })
    }

    /// Counts calls and scripts the grids handed back.
    struct StubSource {
        no_match_calls: u32,
        guaranteed_calls: u32,
        cascade_calls: u32,
        winning_grid: Grid,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                no_match_calls: 0,
                guaranteed_calls: 0,
                cascade_calls: 0,
                winning_grid: one_winning_column(),
            }
        }
    }

    impl GridSource for StubSource {
        fn no_match(&mut self) -> Grid {
            self.no_match_calls += 1;
            matchless()
        }

        fn guaranteed_match(&mut self) -> Grid {
            self.guaranteed_calls += 1;
            self.winning_grid
        }

        fn cascade(&mut self, grid: &Grid, clusters: &[Cluster]) -> Grid {
            self.cascade_calls += 1;
            // Deterministic refill: settle survivors, fill holes with a
            // matchless pattern so the resolve loop ends after one pass.
            let mut removed = [[false; ROWS]; crate::grid::COLS];
            for cluster in clusters {
                for cell in &cluster.cells {
                    removed[cell.col][cell.row] = true;
                }
            }
            Grid::from_fn(|c, r| {
                let survivors: Vec<_> =
                    (0..ROWS).filter(|&row| !removed[c][row]).collect();
                let missing = ROWS - survivors.len();
                if r < missing {
                    if (c + r) % 2 == 0 { Symbol::Grape } else { Symbol::Bell }
                } else {
                    grid.symbol_at(c, survivors[r - missing])
                }
            })
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_idle_on_matchless_grid() {
        let now = Instant::now();
        let seq = Sequencer::new(StubSource::new(), now);
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(!seq.busy());
        assert_eq!(seq.spin_count(), 0);
        assert!(find_clusters(seq.grid()).is_empty());
    }

    #[test]
    fn test_losing_spin_returns_to_idle_after_settle() {
        let now = Instant::now();
        let mut seq = Sequencer::new(StubSource::new(), now);
        assert!(seq.trigger(now));
        assert_eq!(seq.phase(), Phase::Spinning);
        assert!(seq.busy());

        seq.tick(now + spin_duration());
        assert_eq!(seq.phase(), Phase::Settling);

        seq.tick(now + spin_duration() + ms(SETTLE_MS));
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(!seq.busy());
    }

    #[test]
    fn test_second_spin_uses_guaranteed_match() {
        let now = Instant::now();
        let mut seq = Sequencer::new(StubSource::new(), now);
        // Spin 1: no-match (plus one call from the initial grid).
        assert!(seq.trigger(now));
        let mut t = now + spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Idle);

        // Spin 2: guaranteed match.
        assert!(seq.trigger(t));
        t += spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Highlighting);
        assert_eq!(seq.clusters().len(), 1);
        assert_eq!(seq.clusters()[0].len(), ROWS);

        // Spin 3 (after resolving): back to no-match.
        t += ms(HIGHLIGHT_MS + DISAPPEAR_MS + CASCADE_SETTLE_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(seq.trigger(t));
        t += spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Idle);

        let src = &seq.source;
        assert_eq!(src.guaranteed_calls, 1);
        // Initial grid + spins 1 and 3.
        assert_eq!(src.no_match_calls, 3);
        assert_eq!(src.cascade_calls, 1);
        assert_eq!(seq.spin_count(), 3);
        assert_eq!(seq.cascade_count(), 1);
    }

    #[test]
    fn test_trigger_while_busy_is_dropped() {
        let now = Instant::now();
        let mut seq = Sequencer::new(StubSource::new(), now);
        assert!(seq.trigger(now));
        let calls_before = seq.source.no_match_calls + seq.source.guaranteed_calls;

        // Mid-spin and mid-settle triggers are no-ops: no state change, no
        // extra generator invocation, not queued.
        assert!(!seq.trigger(now + ms(10)));
        seq.tick(now + spin_duration());
        assert!(!seq.trigger(now + spin_duration() + ms(1)));

        assert_eq!(seq.spin_count(), 1);
        assert_eq!(
            seq.source.no_match_calls + seq.source.guaranteed_calls,
            calls_before
        );
        seq.tick(now + spin_duration() + ms(SETTLE_MS));
        assert_eq!(seq.phase(), Phase::Idle);
    }

    #[test]
    fn test_resolve_loop_phases_in_order() {
        let now = Instant::now();
        let mut seq = Sequencer::new(StubSource::new(), now);
        seq.trigger(now); // spin 1, losing
        let mut t = now + spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        seq.trigger(t); // spin 2, winning
        t += spin_duration();
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Settling);
        t += ms(SETTLE_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Highlighting);
        t += ms(HIGHLIGHT_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Clearing);
        // Clusters stay visible through the clearing window.
        assert!(!seq.clusters().is_empty());
        t += ms(DISAPPEAR_MS);
        seq.tick(t);
        assert_eq!(seq.phase(), Phase::Cascading);
        t += ms(CASCADE_SETTLE_MS);
        seq.tick(t);
        // Stub cascade refills matchlessly, so the loop terminates here.
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(!seq.busy());
    }

    #[test]
    fn test_late_tick_catches_up_through_all_deadlines() {
        let now = Instant::now();
        let mut seq = Sequencer::new(StubSource::new(), now);
        seq.trigger(now);
        let t = now + spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        seq.trigger(t); // winning spin
        // A single tick far in the future resolves the whole cycle.
        seq.tick(t + ms(60_000));
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(!seq.busy());
        assert_eq!(seq.source.cascade_calls, 1);
    }

    #[test]
    fn test_random_source_session_resolves() {
        let now = Instant::now();
        let mut seq = Sequencer::new(RngGridSource::new(Some(1234)), now);
        let mut t = now;
        for _ in 0..4 {
            assert!(seq.trigger(t));
            // Generous budget; resolve loops settle in a handful of cascades.
            t += ms(600_000);
            seq.tick(t);
            assert_eq!(seq.phase(), Phase::Idle);
            assert!(!seq.busy());
            assert!(find_clusters(seq.grid()).is_empty());
        }
        assert_eq!(seq.spin_count(), 4);
    }
}
