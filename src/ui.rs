//! Layout and drawing: the drum (reel grid), cluster highlights, clear fade,
//! spin stagger animation, sidebar.

use crate::grid::{COLS, ROWS};
use crate::spin::{
    CASCADE_SETTLE_MS, COLUMN_STAGGER_MS, DISAPPEAR_MS, DROP_TIME_MS, GridSource, Phase, Sequencer,
};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal cells per grid cell.
const CELL_W: u16 = 5;
const CELL_H: u16 = 2;

const SIDEBAR_WIDTH: u16 = 24;

/// Drum size in terminal cells (border + grid).
fn drum_pixel_size() -> (u16, u16) {
    (COLS as u16 * CELL_W + 2, ROWS as u16 * CELL_H + 2)
}

/// Drum inner rect (board only, no border); matches draw_game layout.
fn drum_board_rect(area: Rect) -> Rect {
    let (pw, ph) = drum_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (COLS as u16 * CELL_W).min(area.width.saturating_sub(2)),
        height: (ROWS as u16 * CELL_H).min(area.height.saturating_sub(2)),
    }
}

/// Draw the whole screen: drum + sidebar, with the clear fade while cells
/// disappear. `clear_effect` / `clear_effect_time` hold the TachyonFX state
/// across frames; the app resets them when the clearing phase ends.
pub fn draw<S: GridSource>(
    frame: &mut Frame,
    seq: &Sequencer<S>,
    theme: &Theme,
    now: Instant,
    area: Rect,
    clear_effect: &mut Option<Effect>,
    clear_effect_time: &mut Option<Instant>,
    no_animation: bool,
) {
    let (pw, ph) = drum_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let active = vert[1];

    let (drum_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active);
        (inner[0], inner[1])
    };

    draw_drum(frame, seq, theme, drum_area, now, no_animation);
    draw_sidebar(frame, seq, theme, sidebar_area);

    if seq.phase() == Phase::Clearing && !no_animation {
        apply_clear_effect(
            frame,
            seq,
            theme,
            area,
            clear_effect,
            clear_effect_time,
            now,
        );
    }
}

/// Animation progress 0..=1 for a staggered column: column `col` starts
/// moving after `col * COLUMN_STAGGER_MS` and takes `DROP_TIME_MS`.
fn stagger_progress(elapsed_ms: u64, col: usize) -> f32 {
    let start = col as u64 * COLUMN_STAGGER_MS;
    ((elapsed_ms.saturating_sub(start)) as f32 / DROP_TIME_MS as f32).clamp(0.0, 1.0)
}

/// How long a landed column keeps its squash before snapping back.
const SQUASH_MS: u64 = 150;
/// Squash dip in terminal rows for the deepest cell; quadratic in depth so
/// the top of the column barely moves.
const SQUASH_DIP: f32 = 2.0;

/// Row offsets for the touchdown squash: right after a column lands the
/// lower cells dip and release, deeper cells dipping more. Zeros before
/// landing and once the squash window has passed.
fn landing_squash(elapsed_ms: u64, col: usize) -> [i32; ROWS] {
    let land = col as u64 * COLUMN_STAGGER_MS + DROP_TIME_MS;
    if elapsed_ms < land || elapsed_ms >= land + SQUASH_MS {
        return [0; ROWS];
    }
    let g = (elapsed_ms - land) as f32 / SQUASH_MS as f32;
    std::array::from_fn(|r| {
        let depth = (r + 1) as f32 / ROWS as f32;
        ((1.0 - g) * depth * depth * SQUASH_DIP) as i32
    })
}

/// Grid-row fall distance for every cell of `col` after the last cascade:
/// fresh cells drop in as a block from above the drum, survivors fall by the
/// number of cleared cells that were beneath them.
fn cascade_fall_distances<S: GridSource>(seq: &Sequencer<S>, col: usize) -> [usize; ROWS] {
    let mut removed = [false; ROWS];
    for cluster in seq.clusters() {
        for cell in &cluster.cells {
            if cell.col == col {
                removed[cell.row] = true;
            }
        }
    }
    let survivors: Vec<usize> = (0..ROWS).filter(|&r| !removed[r]).collect();
    let missing = ROWS - survivors.len();
    let mut dist = [0usize; ROWS];
    for d in dist.iter_mut().take(missing) {
        *d = missing;
    }
    for (k, &old) in survivors.iter().enumerate() {
        dist[missing + k] = missing + k - old;
    }
    dist
}

/// Vertical pixel offset for each cell of a column in the current phase.
/// Positive = shifted down (dropping out), negative = still above its slot.
fn column_offsets<S: GridSource>(seq: &Sequencer<S>, col: usize, now: Instant) -> [i32; ROWS] {
    let elapsed = seq.phase_elapsed(now).as_millis() as u64;
    let drum_h = f32::from(ROWS as u16 * CELL_H);
    match seq.phase() {
        Phase::Spinning => {
            // Old grid drops away, left to right.
            let f = stagger_progress(elapsed, col);
            [(f * drum_h) as i32; ROWS]
        }
        Phase::Settling => {
            // New grid falls in from above with the same stagger, then a
            // short squash on touchdown.
            let f = stagger_progress(elapsed, col);
            if f < 1.0 {
                [-((1.0 - f) * drum_h) as i32; ROWS]
            } else {
                landing_squash(elapsed, col)
            }
        }
        Phase::Cascading => {
            let f = (elapsed as f32 / CASCADE_SETTLE_MS as f32).clamp(0.0, 1.0);
            let dist = cascade_fall_distances(seq, col);
            std::array::from_fn(|r| {
                -((1.0 - f) * dist[r] as f32 * f32::from(CELL_H)) as i32
            })
        }
        _ => [0; ROWS],
    }
}

fn draw_drum<S: GridSource>(
    frame: &mut Frame,
    seq: &Sequencer<S>,
    theme: &Theme,
    area: Rect,
    now: Instant,
    no_animation: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" drumtui ", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    // Paint the drum background first so cells mid-drop leave bg behind.
    let buf = frame.buffer_mut();
    for y in inner.y..inner.y + inner.height {
        for x in inner.x..inner.x + inner.width {
            buf[(x, y)].set_symbol(" ").set_style(Style::default().bg(theme.bg));
        }
    }

    let win_cells: HashSet<(usize, usize)> = seq
        .clusters()
        .iter()
        .flat_map(|cl| cl.cells.iter().map(|c| (c.col, c.row)))
        .collect();
    let highlighting = seq.phase() == Phase::Highlighting;
    let clearing = seq.phase() == Phase::Clearing;

    for col in 0..COLS {
        let offsets = column_offsets(seq, col, now);
        for row in 0..ROWS {
            let is_win = win_cells.contains(&(col, row));
            if clearing && is_win && no_animation {
                // Without the fade the cleared cells just vanish.
                continue;
            }
            let symbol = seq.grid().symbol_at(col, row);
            let color = theme.symbol_color(symbol.color_index());
            let (cell_bg, cell_fg) = if highlighting && is_win {
                (theme.win, color)
            } else {
                (color, theme.bg)
            };

            let x0 = inner.x + col as u16 * CELL_W;
            let y0 = i32::from(inner.y) + i32::from(row as u16 * CELL_H) + offsets[row];
            for dy in 0..CELL_H {
                let y = y0 + i32::from(dy);
                if y < i32::from(inner.y) || y >= i32::from(inner.y + inner.height) {
                    continue;
                }
                let y = y as u16;
                for dx in 0..CELL_W {
                    let x = x0 + dx;
                    if x >= inner.x + inner.width {
                        continue;
                    }
                    // Glyph in the cell centre, solid colour elsewhere.
                    let on_glyph = dy == CELL_H / 2 && dx == CELL_W / 2;
                    let cell = &mut buf[(x, y)];
                    if on_glyph {
                        cell.set_char(symbol.glyph())
                            .set_style(Style::default().fg(cell_fg).bg(cell_bg));
                    } else {
                        cell.set_symbol(" ").set_style(Style::default().bg(cell_bg));
                    }
                }
            }
        }
    }
}

/// Build set of buffer (x, y) positions covered by the clearing clusters.
fn clearing_buffer_positions<S: GridSource>(
    board: Rect,
    seq: &Sequencer<S>,
) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for cluster in seq.clusters() {
        for cell in &cluster.cells {
            let x0 = board.x + cell.col as u16 * CELL_W;
            let y0 = board.y + cell.row as u16 * CELL_H;
            for bx in x0..(x0 + CELL_W).min(board.x + board.width) {
                for by in y0..(y0 + CELL_H).min(board.y + board.height) {
                    set.insert((bx, by));
                }
            }
        }
    }
    set
}

/// Create or update the clear fade and process it (TachyonFX: fade the
/// matched cells to the drum background over the disappear window).
fn apply_clear_effect<S: GridSource>(
    frame: &mut Frame,
    seq: &Sequencer<S>,
    theme: &Theme,
    area: Rect,
    clear_effect: &mut Option<Effect>,
    clear_effect_time: &mut Option<Instant>,
    now: Instant,
) {
    let board = drum_board_rect(area);
    let delta = clear_effect_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *clear_effect_time = Some(now);

    if clear_effect.is_none() {
        let clearing_set = clearing_buffer_positions(board, seq);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            clearing_set.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (DISAPPEAR_MS as u32, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *clear_effect = Some(effect);
    }

    if let Some(effect) = clear_effect {
        frame.render_effect(effect, board, tfx_delta);
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "ready",
        Phase::Spinning => "spinning",
        Phase::Settling => "settling",
        Phase::Highlighting => "match!",
        Phase::Clearing => "clearing",
        Phase::Cascading => "cascading",
    }
}

fn draw_sidebar<S: GridSource>(
    frame: &mut Frame,
    seq: &Sequencer<S>,
    theme: &Theme,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Session (border + spins, cascades, phase)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Symbols (border + strip)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Spin button (border + label + hint)
        ])
        .split(area);

    // --- Session (own border) ---
    let session_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let session_inner = session_block.inner(chunks[0]);
    session_block.render(chunks[0], frame.buffer_mut());
    let session_lines = vec![
        Line::from(vec![
            Span::styled("Spins: ", title_style),
            Span::styled(seq.spin_count().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Cascades: ", title_style),
            Span::styled(seq.cascade_count().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Phase: ", title_style),
            Span::styled(phase_label(seq.phase()), fg_style),
        ]),
    ];
    Paragraph::new(session_lines).render(session_inner, frame.buffer_mut());

    // --- Symbols (own border): colour strip ---
    let symbols_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let symbols_inner = symbols_block.inner(chunks[2]);
    symbols_block.render(chunks[2], frame.buffer_mut());
    let symbols_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(symbols_inner);
    Paragraph::new(Line::from(Span::styled("Symbols", title_style)))
        .render(symbols_layout[0], frame.buffer_mut());
    draw_symbol_strip(frame, theme, symbols_layout[1]);

    // --- Spin button (own border): dims while a spin is in flight ---
    let spin_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let spin_inner = spin_block.inner(chunks[4]);
    spin_block.render(chunks[4], frame.buffer_mut());
    let button = if seq.busy() {
        Span::styled(" [ SPIN ] ", Style::default().fg(theme.div_line))
    } else {
        Span::styled(
            " [ SPIN ] ",
            Style::default().fg(Color::Black).bg(theme.title).bold(),
        )
    };
    let spin_lines = vec![
        Line::from(button),
        Line::from(Span::styled(" Space — spin  Q — quit ", fg_style)),
    ];
    Paragraph::new(spin_lines).render(spin_inner, frame.buffer_mut());
}

/// Draw a row of 7 coloured blocks (symbol palette).
fn draw_symbol_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let block_w = (area.width / 7).max(1);
    for i in 0..7u8 {
        let r = Rect {
            x: area.x + u16::from(i) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        };
        let c = theme.symbol_color(i);
        let p = Paragraph::new("█").style(Style::default().fg(c).bg(c));
        p.render(r, frame.buffer_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Cluster;
    use crate::grid::{Grid, Symbol};
    use crate::spin::{HIGHLIGHT_MS, SETTLE_MS, spin_duration};
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn checker() -> Grid {
        Grid::from_fn(|c, r| {
            if (c + r) % 2 == 0 {
                Symbol::Cherry
            } else {
                Symbol::Lemon
            }
        })
    }

    /// Losing grids except for one full column of Sevens on the winning
    /// spin; cascades refill matchlessly so the resolve loop ends.
    struct ScriptedSource;

    impl GridSource for ScriptedSource {
        fn no_match(&mut self) -> Grid {
            checker()
        }

        fn guaranteed_match(&mut self) -> Grid {
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

        fn cascade(&mut self, _grid: &Grid, _clusters: &[Cluster]) -> Grid {
            checker()
        }
    }

    /// Drive a sequencer to the start of the cascade drop after the winning
    /// spin cleared column 3; returns it with the drop's start instant.
    fn seq_in_cascading() -> (Sequencer<ScriptedSource>, Instant) {
        let now = Instant::now();
        let mut seq = Sequencer::new(ScriptedSource, now);
        seq.trigger(now);
        let t = now + spin_duration() + ms(SETTLE_MS);
        seq.tick(t);
        seq.trigger(t);
        let start = t + spin_duration() + ms(SETTLE_MS + HIGHLIGHT_MS + DISAPPEAR_MS);
        seq.tick(start);
        assert_eq!(seq.phase(), Phase::Cascading);
        (seq, start)
    }

    #[test]
    fn test_cascade_fall_spans_full_settle_window() {
        let (seq, start) = seq_in_cascading();
        // Column 3 was cleared whole, so every refilled cell falls in; the
        // drop must still be in flight late in the window and only finish
        // at the cascade deadline.
        let late = column_offsets(&seq, 3, start + ms(DISAPPEAR_MS));
        assert!(late.iter().all(|&o| o < 0));
        let done = column_offsets(&seq, 3, start + ms(CASCADE_SETTLE_MS));
        assert_eq!(done, [0; ROWS]);
        // Untouched columns never move during the cascade drop.
        assert_eq!(column_offsets(&seq, 0, start + ms(1)), [0; ROWS]);
    }

    #[test]
    fn test_landing_squash_dips_then_releases() {
        // Column 0 touches down DROP_TIME_MS into the settle.
        let at_land = landing_squash(DROP_TIME_MS, 0);
        assert!(at_land[ROWS - 1] > 0);
        assert_eq!(at_land[0], 0);
        for r in 1..ROWS {
            assert!(at_land[r] >= at_land[r - 1]);
        }
        // Nothing before touchdown or once the squash has released.
        assert_eq!(landing_squash(DROP_TIME_MS - 1, 0), [0; ROWS]);
        assert_eq!(landing_squash(DROP_TIME_MS + SQUASH_MS, 0), [0; ROWS]);
        // Later columns touch down later by the stagger.
        let col4_land = 4 * COLUMN_STAGGER_MS + DROP_TIME_MS;
        assert_eq!(landing_squash(col4_land - 1, 4), [0; ROWS]);
        assert!(landing_squash(col4_land, 4)[ROWS - 1] > 0);
    }

    #[test]
    fn test_settling_column_drops_then_squashes() {
        let now = Instant::now();
        let mut seq = Sequencer::new(ScriptedSource, now);
        seq.trigger(now);
        let settle = now + spin_duration();
        seq.tick(settle);
        assert_eq!(seq.phase(), Phase::Settling);
        // Mid-drop the whole column is still above its slot.
        let mid = column_offsets(&seq, 0, settle + ms(DROP_TIME_MS / 2));
        assert!(mid.iter().all(|&o| o < 0));
        // On touchdown the lower cells dip below their slot.
        let land = column_offsets(&seq, 0, settle + ms(DROP_TIME_MS));
        assert!(land[ROWS - 1] > 0);
        // Squash released: the column is at rest.
        let rest = column_offsets(&seq, 0, settle + ms(DROP_TIME_MS + SQUASH_MS));
        assert_eq!(rest, [0; ROWS]);
    }
}
