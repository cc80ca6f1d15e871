//! App: terminal init, main loop, tick and key handling.

use crate::Args;
use crate::input::{Action, key_to_action};
use crate::spin::{Phase, RngGridSource, Sequencer};
use crate::theme::Theme;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use rand::rngs::StdRng;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Event poll timeout per frame, derived from `--frame-rate`.
/// Clamped so a bad value can't spin-loop or freeze input polling.
fn frame_interval(frame_rate: f64) -> Duration {
    let rate = if frame_rate.is_finite() { frame_rate } else { 60.0 };
    Duration::from_secs_f64(1.0 / rate.clamp(1.0, 240.0))
}

pub struct App {
    args: Args,
    theme: Theme,
    seq: Sequencer<RngGridSource<StdRng>>,
    /// TachyonFX fade for the clearing phase (created when it starts).
    clear_effect: Option<Effect>,
    /// Last time the clear effect was processed (for delta).
    clear_effect_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Self {
        let source = RngGridSource::new(args.seed);
        let seq = Sequencer::new(source, Instant::now());
        Self {
            args,
            theme,
            seq,
            clear_effect: None,
            clear_effect_time: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            self.seq.tick(now);

            // The fade only lives through the clearing phase; the next
            // resolve round builds a fresh one.
            if self.seq.phase() != Phase::Clearing {
                self.clear_effect = None;
                self.clear_effect_time = None;
            }

            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &self.seq,
                    &self.theme,
                    now,
                    f.area(),
                    &mut self.clear_effect,
                    &mut self.clear_effect_time,
                    self.args.no_animation,
                );
            })?;

            let timeout = frame_interval(self.args.frame_rate).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        match key_to_action(key) {
                            Action::Quit => return Ok(()),
                            // Dropped silently while a spin is in flight.
                            Action::Spin => {
                                self.seq.trigger(Instant::now());
                            }
                            Action::None => {}
                        }
                    }
                }
            }
        }
    }
}
