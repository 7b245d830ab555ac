use std::collections::VecDeque;

use Direction::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right
}

impl Direction {
    pub fn is_opposite(self, other: Direction) -> bool {
        matches!((self, other), (Up, Down) | (Down, Up) | (Right, Left) | (Left, Right))
    }

    /// Grid offset of a single step, with `y` growing downwards.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Up => (0, -1),
            Down => (0, 1),
            Left => (-1, 0),
            Right => (1, 0),
        }
    }

    pub fn head_char(self) -> char {
        match self {
            Up => '^',
            Down => 'v',
            Left => '<',
            Right => '>',
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Position::new(self.x + dx, self.y + dy)
    }
}

/// Snake body stored head-first. Its length never changes after creation:
/// every step pushes a new head and drops the tail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snake {
    body: VecDeque<Position>,
    direction: Direction,
}

impl Snake {
    /// Builds a straight snake of `size` segments (at least one) trailing
    /// behind `head`.
    pub fn new(head: Position, size: usize, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();

        let body = (0..size.max(1) as i32)
            .map(|i| Position::new(head.x - dx * i, head.y - dy * i))
            .collect();
        Snake { body, direction }
    }

    pub fn body(&self) -> impl ExactSizeIterator<Item = &Position> + '_ {
        self.body.iter()
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// True when the head shares a cell with any other segment.
    pub fn bites_itself(&self) -> bool {
        let head = self.head();
        self.body.iter().skip(1).any(|segment| *segment == head)
    }

    pub fn move_step(&mut self) {
        let new_head = self.head().step(self.direction);

        self.body.pop_back();
        self.body.push_front(new_head);
    }

    /// Adopts `new_direction` unless it would reverse the snake onto itself.
    /// Returns whether the direction was accepted.
    pub fn set_direction(&mut self, new_direction: Direction) -> bool {
        if new_direction.is_opposite(self.direction) {
            return false;
        }
        self.direction = new_direction;
        true
    }

    pub fn get_direction(&self) -> Direction {
        self.direction
    }
}
