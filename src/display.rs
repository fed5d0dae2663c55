//! Drawing the game into the terminal.
//!
//! Every frame is composed into a grid of cells first (board border, falling
//! objects, the player and the game over overlay) and then queued to the
//! terminal row by row, so nothing has to be cleared between frames.
use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    event::{read, Event, KeyEventKind},
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::highscore::{render_table, INITIALS_LEN};
use crate::logic::World;
use crate::session::SessionController;
use crate::structs::*;

const GRID_WIDTH: usize = BOARD_WIDTH as usize + 2;
const GRID_HEIGHT: usize = BOARD_HEIGHT as usize + 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub color: Color,
}

impl Cell {
    const EMPTY: Cell = Cell {
        ch: ' ',
        color: Color::Reset,
    };

    fn new(ch: char, color: Color) -> Self {
        Self { ch, color }
    }
}

pub type Grid = Vec<Vec<Cell>>;

/// The board with its border, the falling objects and the player.
pub fn compose_board(world: &World) -> Grid {
    let mut grid = vec![vec![Cell::EMPTY; GRID_WIDTH]; GRID_HEIGHT];
    let border = Color::Grey;
    let last_row = GRID_HEIGHT - 1;
    let last_col = GRID_WIDTH - 1;

    for x in 1..last_col {
        grid[0][x] = Cell::new('-', border);
        grid[last_row][x] = Cell::new('-', border);
    }
    for row in grid.iter_mut().take(last_row).skip(1) {
        row[0] = Cell::new('|', border);
        row[last_col] = Cell::new('|', border);
    }
    grid[0][0] = Cell::new('/', border);
    grid[0][last_col] = Cell::new('\\', border);
    grid[last_row][0] = Cell::new('\\', border);
    grid[last_row][last_col] = Cell::new('/', border);

    for object in world.objects() {
        let row = object.row();
        if (0..BOARD_HEIGHT).contains(&row) && (0..BOARD_WIDTH).contains(&object.pos_x) {
            let spec = object.kind.spec();
            grid[row as usize + 1][object.pos_x as usize + 1] = Cell::new(spec.glyph, spec.color);
        }
    }

    let player = world.player();
    grid[player.pos_y as usize + 1][player.pos_x as usize + 1] = Cell::new('@', Color::Cyan);
    grid
}

/// Writes `text` centred on a board row, clipped to the inside of the border.
pub fn stamp_centered(grid: &mut Grid, board_row: usize, text: &str, color: Color) {
    let row = board_row + 1;
    if row >= GRID_HEIGHT - 1 {
        return;
    }
    let chars: Vec<char> = text.chars().take(BOARD_WIDTH as usize).collect();
    let start = 1 + (BOARD_WIDTH as usize - chars.len()) / 2;
    for (i, ch) in chars.into_iter().enumerate() {
        grid[row][start + i] = Cell::new(ch, color);
    }
}

pub fn hud_line(controller: &SessionController) -> String {
    let session = controller.session();
    let score = format!("Score: {}", session.score);
    let powerups = "o".repeat(session.powerup_count as usize);
    let width = GRID_WIDTH;
    if score.len() + 1 + powerups.len() > width {
        return format!("{}  o x{}", score, session.powerup_count);
    }
    format!("{}{}{}", score, " ".repeat(width - score.len() - powerups.len()), powerups)
}

fn initials_box(buffer: &str, cursor_visible: bool) -> String {
    let mut shown = buffer.to_uppercase();
    let typed = shown.chars().count();
    if typed < INITIALS_LEN {
        shown.push(if cursor_visible { '_' } else { ' ' });
        shown.push_str(&" ".repeat(INITIALS_LEN - typed - 1));
    }
    format!("[{}]", shown)
}

/// The overlay drawn over the board after a game over.
pub fn game_over_lines(
    controller: &SessionController,
    status: Option<&str>,
) -> Vec<(String, Color)> {
    let mut lines = Vec::new();

    if let Some(entry) = controller.initials().filter(|entry| entry.active) {
        lines.push(("HIGH SCORE!".to_string(), Color::White));
        let full = entry.buffer.chars().count() == INITIALS_LEN;
        if full || !entry.cursor_visible {
            lines.push((controller.score().to_string(), Color::White));
        } else {
            lines.push((String::new(), Color::White));
        }
        lines.push((String::new(), Color::White));
    }

    lines.push(("GAME OVER".to_string(), Color::Yellow));
    lines.push(("Press SPACE to restart".to_string(), Color::White));

    if let Some(entry) = controller.initials().filter(|entry| entry.active) {
        lines.push((String::new(), Color::White));
        lines.push((
            format!("Initials: {}", initials_box(&entry.buffer, entry.cursor_visible)),
            Color::White,
        ));
        lines.push(("ENTER to save".to_string(), Color::DarkGrey));
    }

    if let Some(status) = status {
        lines.push((status.to_string(), Color::Red));
    }

    lines.push((String::new(), Color::White));
    lines.push(("HIGH SCORES:".to_string(), Color::White));
    for line in render_table(controller.high_scores()) {
        lines.push((line, Color::White));
    }
    lines
}

pub fn compose_frame(world: &World, controller: &SessionController, status: Option<&str>) -> Grid {
    let mut grid = compose_board(world);
    if controller.is_game_over() {
        let lines = game_over_lines(controller, status);
        let top = (BOARD_HEIGHT as usize).saturating_sub(lines.len()) / 2;
        for (i, (text, color)) in lines.iter().enumerate() {
            stamp_centered(&mut grid, top + i, text, *color);
        }
    }
    grid
}

pub fn draw_frame(
    out: &mut impl Write, world: &World, controller: &SessionController, status: Option<&str>,
) -> io::Result<()> {
    let grid = compose_frame(world, controller, status);

    queue!(
        out,
        MoveTo(PADDING_LEFT as u16, PADDING_TOP as u16 - 1),
        SetForegroundColor(Color::White),
        Print(hud_line(controller))
    )?;

    let mut last_color = Color::White;
    for (i, row) in grid.iter().enumerate() {
        queue!(out, MoveTo(PADDING_LEFT as u16, PADDING_TOP as u16 + i as u16))?;
        for cell in row {
            if cell.color != last_color {
                queue!(out, SetForegroundColor(cell.color))?;
                last_color = cell.color;
            }
            queue!(out, Print(cell.ch))?;
        }
    }
    queue!(out, ResetColor)?;
    out.flush()
}

/// Title, legend and controls. Waits for any key.
pub fn splash_screen(out: &mut impl Write) -> io::Result<()> {
    let mut lines = vec![
        "/------------------------------------\\".to_string(),
        "|                                    |".to_string(),
        "|            PAPER  CHASE            |".to_string(),
        "|                                    |".to_string(),
        "\\------------------------------------/".to_string(),
        String::new(),
        "Things fall from the sky. Catch the money, dodge the documents.".to_string(),
        String::new(),
        "@:  you".to_string(),
    ];
    for kind in ObjectKind::ALL {
        let spec = kind.spec();
        lines.push(format!("{}:  {}", spec.glyph, spec.label));
    }
    lines.extend([
        String::new(),
        "Arrow keys:  move".to_string(),
        "Space:       restart after game over".to_string(),
        "Enter:       save your initials".to_string(),
        "Esc:         quit".to_string(),
        String::new(),
        "(Press any key to continue...)".to_string(),
    ]);

    queue!(out, Clear(ClearType::All))?;
    for (i, line) in lines.iter().enumerate() {
        queue!(
            out,
            MoveTo(PADDING_LEFT as u16, PADDING_TOP as u16 + i as u16),
            Print(line)
        )?;
    }
    out.flush()?;

    loop {
        if let Event::Key(key) = read()? {
            if key.kind == KeyEventKind::Press {
                break;
            }
        }
    }
    queue!(out, Clear(ClearType::All))?;
    out.flush()
}
