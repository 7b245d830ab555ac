use crate::{TermInt, Coords};
use std::{io::{self, Stdout, Write, stdout}, time::Instant};

use crossterm::{cursor, execute, queue, style, terminal};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event, read, poll};
use crossterm::style::Color;
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};

pub const TEXT_COLOR: Color = Color::White;
const MESSAGE_BG: Color = Color::Black;
const BUTTON_FG: Color = Color::Black;
const BUTTON_BG: Color = Color::Green;
const BORDER_COLOR: Color = Color::DarkGrey;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

/// Rectangle of terminal cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Area {
    top_left: Coords,
    width: TermInt,
    height: TermInt,
}

pub struct TermManager {
    width: TermInt,
    height: TermInt,
    stdout: Stdout,
    screen: Vec<Cell>,
    current_msg: Option<Message>,
}

struct Message {
    area: Area,
    button: Option<Area>,
}

impl TermManager {
    pub fn new() -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let stdout = stdout();
        let mut term = TermManager { width, height, stdout, screen: vec![], current_msg: None };
        term.screen = term.blank_screen();
        Ok(term)
    }

    pub fn setup(&mut self) -> io::Result<()> {
        execute!(self.stdout, EnterAlternateScreen, EnableMouseCapture)?;
        terminal::enable_raw_mode()?;
        execute!(self.stdout, cursor::Hide, cursor::DisableBlinking)
    }

    /// Undoes `setup`. Every step runs even if an earlier one failed; the
    /// first error is returned.
    pub fn restore(&mut self) -> io::Result<()> {
        first_error([
            terminal::disable_raw_mode(),
            execute!(self.stdout, style::ResetColor, cursor::Show, cursor::EnableBlinking),
            execute!(self.stdout, DisableMouseCapture),
            execute!(self.stdout, LeaveAlternateScreen),
        ])
    }

    /// Waits for input until `deadline`, then drains whatever else is queued.
    pub fn read_events_until(&self, deadline: Instant) -> io::Result<Vec<Event>> {
        let mut events = vec![];

        let timeout = deadline.saturating_duration_since(Instant::now());
        if !poll(timeout)? {
            return Ok(events);
        }

        loop {
            events.push(read()?);
            if !poll(std::time::Duration::ZERO)? {
                return Ok(events);
            }
        }
    }

    pub fn get_terminal_size(&self) -> Coords {
        (self.width, self.height)
    }

    /// Background colour of a row: a vertical green gradient.
    pub fn background(&self, y: TermInt) -> Color {
        let ratio = y as f32 / self.height.max(1) as f32;
        Color::Rgb { r: 0, g: (100.0 + ratio * 80.0) as u8, b: 0 }
    }

    pub fn draw_background(&mut self) -> io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                self.erase_at((x, y))?;
            }
        }
        Ok(())
    }

    pub fn draw_borders(&mut self, area: Area) -> io::Result<()> {
        let (left, top) = area.top_left;
        let end_x = left + area.width - 1;
        let end_y = top + area.height - 1;

        for x in left..=end_x {
            let ch = if x == left || x == end_x {'+'} else {'-'};
            self.print_at((x, top), ch, BORDER_COLOR)?;
            self.print_at((x, end_y), ch, BORDER_COLOR)?;
        }

        for y in top + 1..end_y {
            self.print_at((left, y), '|', BORDER_COLOR)?;
            self.print_at((end_x, y), '|', BORDER_COLOR)?;
        }
        Ok(())
    }

    /// Shows a centered box with `lines`, optionally followed by a
    /// clickable button.
    pub fn show_message(&mut self, lines: &[&str], button: Option<&str>) -> io::Result<()> {
        if self.has_message() {
            self.hide_message()?;
        }

        let button_label = button.map(|label| format!("[ {} ]", label));
        let button_rows = if button_label.is_some() {2} else {0};

        let widest = lines.iter().map(|x| x.chars().count()).chain(button_label.iter().map(|b| b.len())).max().unwrap_or(0);
        let msg_height = (lines.len() + 2 + button_rows) as TermInt;
        let msg_width = (widest + 4) as TermInt;
        let center = (self.width / 2, self.height / 2);
        let top_left = (center.0.saturating_sub(msg_width / 2), center.1.saturating_sub(msg_height / 2));

        for y_diff in 0..msg_height {
            for x_diff in 0..msg_width {
                self.put_no_save((top_left.0 + x_diff, top_left.1 + y_diff), Cell { ch: ' ', fg: TEXT_COLOR, bg: MESSAGE_BG })?;
            }
        }

        // Print the message lines
        for (i, line) in lines.iter().enumerate() {
            let y = top_left.1 + i as TermInt + 1;
            self.print_centered_no_save(top_left.0, msg_width, y, line, TEXT_COLOR, MESSAGE_BG)?;
        }

        let button = match button_label {
            Some(label) => {
                let y = top_left.1 + msg_height - 2;
                let x = self.print_centered_no_save(top_left.0, msg_width, y, &label, BUTTON_FG, BUTTON_BG)?;
                Some(Area::new((x, y), label.len() as TermInt, 1))
            }
            None => None,
        };

        self.current_msg = Some(Message { area: Area::new(top_left, msg_width, msg_height), button });
        Ok(())
    }

    pub fn hide_message(&mut self) -> io::Result<()> {
        let Some(msg) = self.current_msg.take() else {
            return Ok(());
        };
        let (left, top) = msg.area.top_left;

        // Restore the content from the screen buffer
        for y in top..top + msg.area.height {
            for x in left..left + msg.area.width {
                if let Some(cell) = self.cell(x, y) {
                    self.put_no_save((x, y), cell)?;
                }
            }
        }
        Ok(())
    }

    pub fn button_area(&self) -> Option<Area> {
        self.current_msg.as_ref().and_then(|msg| msg.button)
    }

    /// Prints `ch` over whatever background the cell already has.
    pub fn print_at(&mut self, pos: Coords, ch: char, fg: Color) -> io::Result<()> {
        let bg = self.cell(pos.0, pos.1).map(|c| c.bg).unwrap_or_else(|| self.background(pos.1));
        self.put(pos, Cell { ch, fg, bg })
    }

    pub fn print_str_at(&mut self, pos: Coords, text: &str, fg: Color) -> io::Result<()> {
        for (i, ch) in text.chars().enumerate() {
            self.print_at((pos.0 + i as TermInt, pos.1), ch, fg)?;
        }
        Ok(())
    }

    pub fn erase_at(&mut self, pos: Coords) -> io::Result<()> {
        let bg = self.background(pos.1);
        self.put(pos, Cell { ch: ' ', fg: TEXT_COLOR, bg })
    }

    pub fn put(&mut self, pos: Coords, cell: Cell) -> io::Result<()> {
        if pos.0 >= self.width || pos.1 >= self.height {
            return Ok(());
        }
        self.screen[self.width as usize * pos.1 as usize + pos.0 as usize] = cell;
        self.put_no_save(pos, cell)
    }

    pub fn clear(&mut self) -> io::Result<()> {
        execute!(self.stdout, terminal::Clear(ClearType::All))?;
        self.screen = self.blank_screen();
        self.current_msg = None;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }

    pub fn has_message(&self) -> bool {
        self.current_msg.is_some()
    }

    ///////////////////////////////////////////////////////////////////////////

    fn blank_screen(&self) -> Vec<Cell> {
        (0..self.height)
            .flat_map(|y| {
                let bg = self.background(y);
                (0..self.width).map(move |_| Cell { ch: ' ', fg: TEXT_COLOR, bg })
            })
            .collect()
    }

    fn cell(&self, x: TermInt, y: TermInt) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.screen.get(self.width as usize * y as usize + x as usize).copied()
    }

    fn print_centered_no_save(&mut self, left: TermInt, width: TermInt, y: TermInt, text: &str, fg: Color, bg: Color) -> io::Result<TermInt> {
        let len = text.chars().count() as TermInt;
        let x = left + width.saturating_sub(len) / 2;
        for (i, ch) in text.chars().enumerate() {
            self.put_no_save((x + i as TermInt, y), Cell { ch, fg, bg })?;
        }
        Ok(x)
    }

    fn put_no_save(&mut self, pos: Coords, cell: Cell) -> io::Result<()> {
        // To be used for overlays, where the local buffer must keep what was
        // underneath so hide_message() can restore it
        if pos.0 >= self.width || pos.1 >= self.height {
            return Ok(());
        }
        queue!(
            self.stdout,
            cursor::MoveTo(pos.0, pos.1),
            style::SetForegroundColor(cell.fg),
            style::SetBackgroundColor(cell.bg),
            style::Print(cell.ch)
        )
    }
}

fn first_error<I: IntoIterator<Item = io::Result<()>>>(results: I) -> io::Result<()> {
    results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

impl Area {
    pub fn new(top_left: Coords, width: TermInt, height: TermInt) -> Self {
        Area { top_left, width, height }
    }

    pub fn top_left(&self) -> Coords {
        self.top_left
    }

    pub fn contains(&self, pos: Coords) -> bool {
        let (left, top) = self.top_left;
        pos.0 >= left && pos.0 < left + self.width && pos.1 >= top && pos.1 < top + self.height
    }
}
