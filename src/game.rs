use std::{io, time::{Duration, Instant}};

use anyhow::bail;
use crossterm::style::Color;
use log::{debug, info, warn};
use rand::Rng;

use crate::{Coords, TermInt};
use crate::config::{Board, Config};
use crate::input;
use crate::machine::{GameMachine, GameStatus, Snapshot};
use crate::snake::Position;
use crate::term::{Area, TermManager, TEXT_COLOR};

const SNAKE_BODY_CHAR: char = '█';
const FOOD_CHAR: char = '●';
const DEAD_SNAKE_CHAR: char = 'X';

const SNAKE_COLOR: Color = Color::Green;
const FOOD_COLOR: Color = Color::Red;
const DEAD_SNAKE_COLOR: Color = Color::DarkRed;

/// Terminal columns per grid cell; characters are about twice as tall as wide.
const CELL_WIDTH: TermInt = 2;
const HUD_ROWS: TermInt = 2;
const MIN_WIDTH: TermInt = 60;
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Where the board and the HUD sit on the terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Layout {
    hud_top: TermInt,
    field: Area,
}

impl Layout {
    fn required_size(board: &Board) -> Coords {
        let width = (board.width as TermInt * CELL_WIDTH + 2).max(MIN_WIDTH);
        let height = board.height as TermInt + 2 + HUD_ROWS;
        (width, height)
    }

    fn new(board: &Board, (width, height): Coords) -> Self {
        let field_width = board.width as TermInt * CELL_WIDTH + 2;
        let field_height = board.height as TermInt + 2;
        let (_, min_height) = Layout::required_size(board);

        let hud_top = height.saturating_sub(min_height) / 2;
        let left = width.saturating_sub(field_width) / 2;
        Layout { hud_top, field: Area::new((left, hud_top + HUD_ROWS), field_width, field_height) }
    }

    /// Terminal position of the first column of a grid cell.
    fn cell_coords(&self, pos: Position) -> Coords {
        let (left, top) = self.field.top_left();
        (left + 1 + pos.x as TermInt * CELL_WIDTH, top + 1 + pos.y as TermInt)
    }
}

/// Terminal front end: owns the screen, polls input, drives the machine at
/// a fixed heartbeat and draws its snapshots.
pub struct SnakeGame {
    config: Config,
    term: TermManager,
    layout: Layout,
    drawn: Vec<Position>,
}

impl SnakeGame {
    pub fn new(config: Config) -> io::Result<Self> {
        let term = TermManager::new()?;
        let layout = Layout::new(&config.board, term.get_terminal_size());
        Ok(SnakeGame { config, term, layout, drawn: vec![] })
    }

    pub fn initialize(&mut self) -> anyhow::Result<()> {
        let (w, h) = self.term.get_terminal_size();
        let (min_w, min_h) = Layout::required_size(&self.config.board);
        if w < min_w || h < min_h {
            bail!("terminal is {}x{}, the game needs at least {}x{}", w, h, min_w, min_h);
        }

        if let Err(err) = self.term.setup() {
            // Setup may have switched screens before failing
            if let Err(restore_err) = self.term.restore() {
                warn!("Failed to restore terminal after setup error: {}", restore_err);
            }
            return Err(err.into());
        }
        debug!("Terminal {}x{}, field at {:?}", w, h, self.layout.field);
        Ok(())
    }

    pub fn shutdown(&mut self) -> io::Result<()> {
        self.term.restore()
    }

    /// Runs the control loop until a quit intent arrives.
    pub fn play<R: Rng>(&mut self, machine: &mut GameMachine<R>) -> io::Result<()> {
        self.show_intro()?;

        let tick = self.config.tick();
        let mut next_tick = Instant::now() + tick;
        let mut shown = machine.status();

        loop {
            let deadline = if shown == GameStatus::Running { next_tick } else { Instant::now() + IDLE_POLL };

            for ev in self.term.read_events_until(deadline)? {
                let Some(intent) = input::translate(&ev, machine.status(), self.term.button_area()) else {
                    continue;
                };
                if machine.apply(intent, Instant::now()).is_break() {
                    return Ok(());
                }
            }

            if machine.status() == GameStatus::Running && shown != GameStatus::Running {
                self.begin_round(&machine.snapshot())?;
                next_tick = Instant::now() + tick;
                shown = GameStatus::Running;
            }

            let now = Instant::now();
            if shown != GameStatus::Running || now < next_tick {
                continue;
            }

            let status = machine.tick(now);
            next_tick += tick;
            if next_tick < now {
                next_tick = now + tick;
            }

            let snap = machine.snapshot();
            self.print_snapshot(&snap)?;
            if status == GameStatus::GameOver {
                self.game_over(&snap)?;
                shown = GameStatus::GameOver;
            }
            self.term.flush()?;
        }
    }

    ///////////////////////////////////////////////////////////////////////////

    fn show_intro(&mut self) -> io::Result<()> {
        self.term.clear()?;
        self.term.draw_background()?;

        let goal = format!("Survive {:.1} seconds.", self.config.survival_timeout().as_secs_f64());
        self.term.show_message(&[
            "JUST WIN",
            "",
            goal.as_str(),
            "Arrow keys or WASD to move",
            "Esc to quit",
        ], Some("START"))?;
        self.term.flush()
    }

    fn begin_round(&mut self, snap: &Snapshot) -> io::Result<()> {
        self.term.clear()?;
        self.term.draw_background()?;
        self.term.draw_borders(self.layout.field)?;
        self.drawn.clear();

        self.print_snapshot(snap)?;
        self.term.flush()
    }

    fn game_over(&mut self, snap: &Snapshot) -> io::Result<()> {
        for pos in &snap.snake {
            self.draw_cell(*pos, DEAD_SNAKE_CHAR, DEAD_SNAKE_COLOR)?;
        }

        let reason = snap.loss_reason.map(|r| r.describe()).unwrap_or_default();
        info!("Showing game over screen after {:.1}s", snap.elapsed.as_secs_f64());
        self.term.show_message(&[
            "GAME OVER",
            "NICE TRY!",
            "This game is designed to be IMPOSSIBLE to win!",
            reason,
            "",
            "Press SPACE to try again",
        ], Some("RESTART"))
    }

    fn print_snapshot(&mut self, snap: &Snapshot) -> io::Result<()> {
        let stale: Vec<Position> = self.drawn.iter().copied().filter(|pos| !snap.snake.contains(pos)).collect();
        for pos in stale {
            self.erase_cell(pos)?;
        }

        self.draw_cell(snap.food, FOOD_CHAR, FOOD_COLOR)?;
        for (i, pos) in snap.snake.iter().enumerate() {
            let ch = if i == 0 {snap.direction.head_char()} else {SNAKE_BODY_CHAR};
            self.draw_cell(*pos, ch, SNAKE_COLOR)?;
        }
        self.drawn = snap.snake.clone();

        self.print_hud(snap)
    }

    fn print_hud(&mut self, snap: &Snapshot) -> io::Result<()> {
        let (width, _) = self.term.get_terminal_size();
        let top = self.layout.hud_top;
        let survival = self.config.survival_timeout().as_secs_f64();
        let food_timeout = self.config.food_timeout();

        let time = format!("Time: {:.1}/{:.1}", snap.elapsed.as_secs_f64(), survival);
        let food_left = food_timeout.saturating_sub(snap.food_elapsed).as_secs_f64();
        let food = format!("Food Timer: {:.1}/{:.1}", food_left, food_timeout.as_secs_f64());
        let dare = taunt(self.config.survival_timeout());

        self.term.print_str_at((1, top), &format!("{:<20}", time), TEXT_COLOR)?;
        self.term.print_str_at((1, top + 1), &format!("{:<24}", food), TEXT_COLOR)?;
        let taunt_x = width.saturating_sub(dare.len() as TermInt + 1);
        self.term.print_str_at((taunt_x, top), &dare, TEXT_COLOR)
    }

    fn draw_cell(&mut self, pos: Position, ch: char, color: Color) -> io::Result<()> {
        if !self.config.board.contains(pos) {
            return Ok(());
        }

        let (x, y) = self.layout.cell_coords(pos);
        let second = if ch == SNAKE_BODY_CHAR || ch == DEAD_SNAKE_CHAR {ch} else {' '};
        self.term.print_at((x, y), ch, color)?;
        self.term.print_at((x + 1, y), second, color)
    }

    fn erase_cell(&mut self, pos: Position) -> io::Result<()> {
        if !self.config.board.contains(pos) {
            return Ok(());
        }

        let (x, y) = self.layout.cell_coords(pos);
        self.term.erase_at((x, y))?;
        self.term.erase_at((x + 1, y))
    }
}

fn taunt(survival: Duration) -> String {
    format!("We dare you to win and survive {:.1} SEC", survival.as_secs_f64())
}
