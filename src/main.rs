//! drumtui — cluster-cascade reel game in the terminal.

mod app;
mod cascade;
mod cluster;
mod grid;
mod input;
mod spin;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let mut app = App::new(args, theme);
    app.run()?;
    Ok(())
}

/// Cluster-cascade reel game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "drumtui",
    version,
    about = "Cluster-cascade reel game in the terminal. Spin a 7×7 drum; groups of 3+ matching symbols clear and cascade until the board settles.",
    long_about = "Drumtui spins a 7×7 drum of symbols. Connected groups of 3 or more \
        matching symbols (4-directional, no diagonals) light up, clear, and the \
        survivors fall while fresh symbols drop in from the top — cascading until \
        no matches remain.\n\n\
        CONTROLS:\n  Space/Enter/S  Spin      Q / Esc    Quit\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme) and --seed for \
        a reproducible session."
)]
pub struct Args {
    /// RNG seed for a reproducible session. Entropy-seeded if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable the clear fade animation (matched cells vanish instantly).
    #[arg(long)]
    pub no_animation: bool,

    /// Target render frames per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
