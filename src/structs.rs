//! Types shared by the game loop, the session and the display.
//!
//! The `ObjectKind` enum tags everything that falls from the top of the board.
//! Per-kind behaviour (glyph, colour, what a collision does, fixed speed) lives
//! in one lookup table instead of being spread over separate types.
//!
//! The `Args` struct is used for parsing command line arguments using the `clap` crate.
use std::path::PathBuf;

use clap::Parser;
use crossterm::style::Color;

pub const PADDING_LEFT: i32 = 3;
pub const PADDING_TOP: i32 = 2;
pub const BOARD_WIDTH: i32 = 60;
pub const BOARD_HEIGHT: i32 = 24;

/// Falling speed in rows per frame for each speed level.
pub const ROWS_PER_SPEED_LEVEL: f32 = 0.04;
pub const MAX_SPEED_LEVEL: u8 = 5;
pub const POWERUP_SCORE_INTERVAL: u32 = 1000;

/// What a collision with a falling object does to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionKind {
    Hazard,
    Bonus,
    PowerUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Money,
    Documents,
    PowerUp,
}

pub struct KindSpec {
    pub glyph: char,
    pub color: Color,
    pub effect: CollisionKind,
    pub fixed_speed: Option<u8>,
    pub label: &'static str,
}

const KIND_SPECS: [KindSpec; 3] = [
    KindSpec {
        glyph: '$',
        color: Color::Green,
        effect: CollisionKind::Bonus,
        fixed_speed: None,
        label: "money (+100)",
    },
    KindSpec {
        glyph: '#',
        color: Color::Red,
        effect: CollisionKind::Hazard,
        fixed_speed: None,
        label: "documents (game over)",
    },
    KindSpec {
        glyph: 'o',
        color: Color::Yellow,
        effect: CollisionKind::PowerUp,
        fixed_speed: Some(MAX_SPEED_LEVEL),
        label: "coin (power-up)",
    },
];

impl ObjectKind {
    pub const ALL: [ObjectKind; 3] = [
        ObjectKind::Money,
        ObjectKind::Documents,
        ObjectKind::PowerUp,
    ];

    pub fn spec(self) -> &'static KindSpec {
        &KIND_SPECS[self as usize]
    }

    pub fn effect(self) -> CollisionKind {
        self.spec().effect
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FallingObject {
    pub kind: ObjectKind,
    pub pos_x: i32,
    pub pos_y: f32,
    pub speed: f32,
}

impl FallingObject {
    /// Row the object is drawn on and collides in.
    pub fn row(&self) -> i32 {
        self.pos_y.floor() as i32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Player {
    pub pos_x: i32,
    pub pos_y: i32,
}

impl Player {
    /// Bottom centre of the board.
    pub fn start() -> Self {
        Self {
            pos_x: BOARD_WIDTH / 2,
            pos_y: BOARD_HEIGHT - 2,
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::start()
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to highscore file
    #[arg(short, long, default_value = "high_scores.txt")]
    pub path: PathBuf,

    /// Show highscore
    #[arg(short, long)]
    pub show_highscore: bool,

    /// Frames per second
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(10..=240))]
    pub fps: u32,

    /// Chance in percent that a new object is a hazard
    #[arg(short, long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub difficulty: u8,

    /// Chance in percent per frame that a new object is dropped
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub spawn_chance: u8,

    /// Seed for a repeatable game
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write logs to this file (RUST_LOG filters, default info)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Tunables the frame loop reads each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameConfig {
    pub fps: u32,
    pub difficulty: u8,
    pub spawn_chance: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            difficulty: 50,
            spawn_chance: 5,
        }
    }
}

impl From<&Args> for GameConfig {
    fn from(args: &Args) -> Self {
        Self {
            fps: args.fps,
            difficulty: args.difficulty,
            spawn_chance: args.spawn_chance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_table_matches_kind_order() {
        assert_eq!(ObjectKind::Money.effect(), CollisionKind::Bonus);
        assert_eq!(ObjectKind::Documents.effect(), CollisionKind::Hazard);
        assert_eq!(ObjectKind::PowerUp.effect(), CollisionKind::PowerUp);
        assert_eq!(ObjectKind::PowerUp.spec().fixed_speed, Some(MAX_SPEED_LEVEL));
    }

    #[test]
    fn glyphs_are_distinct() {
        let glyphs: Vec<char> = ObjectKind::ALL.iter().map(|k| k.spec().glyph).collect();
        assert_eq!(glyphs, vec!['$', '#', 'o']);
    }

    #[test]
    fn args_defaults_become_game_config() {
        let args = Args::parse_from(["paper-chase"]);
        assert_eq!(args.path, PathBuf::from("high_scores.txt"));
        assert!(!args.show_highscore);
        assert_eq!(GameConfig::from(&args), GameConfig::default());
    }

    #[test]
    fn difficulty_above_hundred_is_rejected() {
        assert!(Args::try_parse_from(["paper-chase", "--difficulty", "101"]).is_err());
        let args = Args::try_parse_from(["paper-chase", "-d", "80", "--seed", "7"]).unwrap();
        assert_eq!(args.difficulty, 80);
        assert_eq!(args.seed, Some(7));
    }
}
