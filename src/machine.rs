use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{Board, Config, INITIAL_SNAKE_LENGTH};
use crate::snake::{Direction, Position, Snake};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameStatus {
    NotStarted,
    Running,
    GameOver,
}

/// The terminal condition that ended a run, in evaluation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LossReason {
    OutOfBounds,
    SelfCollision,
    AteFood,
    FoodTimeout,
    SurvivalTimeout,
}

impl LossReason {
    pub fn describe(self) -> &'static str {
        match self {
            LossReason::OutOfBounds => "You left the square.",
            LossReason::SelfCollision => "You bit yourself.",
            LossReason::AteFood => "You ate the food. Food is poison here.",
            LossReason::FoodTimeout => "You starved: no food for too long.",
            LossReason::SurvivalTimeout => "Time is up.",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Start,
    Turn(Direction),
    Restart,
    Quit,
}

/// Read-only view of the machine handed to the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub status: GameStatus,
    pub snake: Vec<Position>,
    pub direction: Direction,
    pub food: Position,
    pub elapsed: Duration,
    pub food_elapsed: Duration,
    pub loss_reason: Option<LossReason>,
}

#[derive(Copy, Clone, Debug)]
struct Timers {
    started: Instant,
    food_spawned: Instant,
    last_tick: Instant,
}

impl Timers {
    fn starting_at(now: Instant) -> Self {
        Timers { started: now, food_spawned: now, last_tick: now }
    }

    fn elapsed(&self) -> Duration {
        self.last_tick.saturating_duration_since(self.started)
    }

    fn food_elapsed(&self) -> Duration {
        self.last_tick.saturating_duration_since(self.food_spawned)
    }
}

/// Owns every piece of simulation state. The only way to change it is
/// through the intent methods and [`GameMachine::tick`].
pub struct GameMachine<R> {
    config: Config,
    rng: R,
    status: GameStatus,
    snake: Snake,
    pending_direction: Option<Direction>,
    food: Position,
    timers: Option<Timers>,
    loss_reason: Option<LossReason>,
}

impl<R: Rng> GameMachine<R> {
    pub fn with_rng(config: Config, mut rng: R) -> Self {
        let snake = initial_snake(&config.board);
        let food = spawn_food(&config.board, &snake, &mut rng);

        GameMachine {
            config,
            rng,
            status: GameStatus::NotStarted,
            snake,
            pending_direction: None,
            food,
            timers: None,
            loss_reason: None,
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Dispatches an intent. `Quit` breaks out of the control loop from any
    /// state; everything else continues.
    pub fn apply(&mut self, intent: Intent, now: Instant) -> ControlFlow<()> {
        match intent {
            Intent::Start => self.start(now),
            Intent::Turn(direction) => self.set_direction(direction),
            Intent::Restart => self.restart(now),
            Intent::Quit => {
                info!("Quit requested while {:?}", self.status);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn start(&mut self, now: Instant) {
        if self.status != GameStatus::NotStarted {
            return;
        }

        self.timers = Some(Timers::starting_at(now));
        self.status = GameStatus::Running;
        info!("Game started, food at ({}, {})", self.food.x, self.food.y);
    }

    /// Buffers a direction for the next tick. Only the most recent one
    /// before a tick is kept.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.status == GameStatus::Running {
            self.pending_direction = Some(direction);
        }
    }

    pub fn restart(&mut self, now: Instant) {
        if self.status != GameStatus::GameOver {
            return;
        }

        self.snake = initial_snake(&self.config.board);
        self.food = spawn_food(&self.config.board, &self.snake, &mut self.rng);
        self.pending_direction = None;
        self.timers = Some(Timers::starting_at(now));
        self.loss_reason = None;
        self.status = GameStatus::Running;
        info!("Game restarted, food at ({}, {})", self.food.x, self.food.y);
    }

    /// Advances the snake one cell and checks the terminal conditions.
    /// Does nothing unless the game is running.
    pub fn tick(&mut self, now: Instant) -> GameStatus {
        if self.status != GameStatus::Running {
            return self.status;
        }
        let Some(timers) = self.timers.as_mut() else {
            return self.status;
        };
        timers.last_tick = now;

        if let Some(direction) = self.pending_direction.take() {
            if !self.snake.set_direction(direction) {
                trace!("Ignored reversal to {:?}", direction);
            }
        }
        self.snake.move_step();

        if let Some(reason) = self.loss_condition(now) {
            self.status = GameStatus::GameOver;
            self.loss_reason = Some(reason);
            let elapsed = self.timers.map(|t| t.elapsed()).unwrap_or_default();
            info!("Game over: {:?} after {:.1}s", reason, elapsed.as_secs_f64());
        }
        self.status
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            snake: self.snake.body().copied().collect(),
            direction: self.snake.get_direction(),
            food: self.food,
            elapsed: self.timers.map(|t| t.elapsed()).unwrap_or_default(),
            food_elapsed: self.timers.map(|t| t.food_elapsed()).unwrap_or_default(),
            loss_reason: self.loss_reason,
        }
    }

    fn loss_condition(&self, now: Instant) -> Option<LossReason> {
        let head = self.snake.head();
        let timers = self.timers?;

        if !self.config.board.contains(head) {
            Some(LossReason::OutOfBounds)
        } else if self.snake.bites_itself() {
            Some(LossReason::SelfCollision)
        } else if head == self.food {
            Some(LossReason::AteFood)
        } else if now.saturating_duration_since(timers.food_spawned) > self.config.food_timeout() {
            Some(LossReason::FoodTimeout)
        } else if now.saturating_duration_since(timers.started) > self.config.survival_timeout() {
            Some(LossReason::SurvivalTimeout)
        } else {
            None
        }
    }
}

fn initial_snake(board: &Board) -> Snake {
    Snake::new(board.center(), INITIAL_SNAKE_LENGTH, Direction::Right)
}

fn spawn_food<R: Rng>(board: &Board, snake: &Snake, rng: &mut R) -> Position {
    let choices: Vec<Position> = board.interior().filter(|pos| !snake.contains(*pos)).collect();

    // The interior always has free cells left around a fresh snake
    let food = choices.choose(rng).copied().unwrap_or(Position::new(1, 1));
    debug!("Food placed at ({}, {})", food.x, food.y);
    food
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::Direction::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TICK: Duration = Duration::from_millis(100);

    fn machine(seed: u64) -> GameMachine<StdRng> {
        GameMachine::with_rng(Config::default(), StdRng::seed_from_u64(seed))
    }

    fn started(seed: u64, t0: Instant) -> GameMachine<StdRng> {
        let mut m = machine(seed);
        m.start(t0);
        m
    }

    /// Runs ticks at the configured cadence until the game ends, calling
    /// `steer` before each one. Returns the number of ticks taken.
    fn run_until_over<F>(m: &mut GameMachine<StdRng>, t0: Instant, mut steer: F) -> u32
    where
        F: FnMut(&Snapshot) -> Option<Direction>,
    {
        let mut ticks = 0;
        while m.status() == GameStatus::Running {
            if let Some(dir) = steer(&m.snapshot()) {
                m.set_direction(dir);
            }
            ticks += 1;
            m.tick(t0 + TICK * ticks);
            assert!(ticks < 1_000, "game never ended");
        }
        ticks
    }

    fn toward_food(snap: &Snapshot) -> Option<Direction> {
        let head = snap.snake[0];
        let mut wanted = vec![];
        if snap.food.x > head.x {
            wanted.push(Right);
        } else if snap.food.x < head.x {
            wanted.push(Left);
        }
        if snap.food.y > head.y {
            wanted.push(Down);
        } else if snap.food.y < head.y {
            wanted.push(Up);
        }

        wanted
            .into_iter()
            .find(|d| !d.is_opposite(snap.direction))
            .or(match snap.direction {
                Left | Right => Some(Up),
                Up | Down => Some(Left),
            })
    }

    /// A 2x2 loop next to the starting head that stays clear of the food.
    fn circle_avoiding(food: Position) -> [Direction; 4] {
        let below = [Position::new(10, 11), Position::new(9, 11)];
        if below.contains(&food) {
            [Up, Left, Down, Right]
        } else {
            [Down, Left, Up, Right]
        }
    }

    #[test]
    fn fresh_machine_waits_for_start() {
        let m = machine(1);
        let snap = m.snapshot();

        assert_eq!(snap.status, GameStatus::NotStarted);
        assert_eq!(snap.snake, vec![Position::new(10, 10), Position::new(9, 10), Position::new(8, 10)]);
        assert_eq!(snap.direction, Right);
        assert_eq!(snap.elapsed, Duration::ZERO);
        assert_eq!(snap.loss_reason, None);
    }

    #[test]
    fn tick_and_turn_before_start_are_ignored() {
        let t0 = Instant::now();
        let mut m = machine(2);
        let before = m.snapshot();

        m.set_direction(Down);
        assert_eq!(m.tick(t0 + TICK), GameStatus::NotStarted);
        m.restart(t0);

        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn start_only_from_not_started() {
        let t0 = Instant::now();
        let mut m = started(3, t0);
        m.tick(t0 + TICK);
        let running = m.snapshot();

        m.start(t0 + TICK * 2);
        assert_eq!(m.snapshot(), running);
        assert_eq!(running.elapsed, TICK);
    }

    #[test]
    fn food_is_inside_and_off_the_snake() {
        for seed in 0..200 {
            let m = machine(seed);
            let snap = m.snapshot();
            assert!((1..=18).contains(&snap.food.x), "seed {seed}: {:?}", snap.food);
            assert!((1..=18).contains(&snap.food.y), "seed {seed}: {:?}", snap.food);
            assert!(!snap.snake.contains(&snap.food));
        }
    }

    #[test]
    fn length_is_constant_while_running() {
        let t0 = Instant::now();
        let mut m = started(4, t0);
        let pattern = circle_avoiding(m.snapshot().food);

        let mut i = 0;
        while m.status() == GameStatus::Running {
            m.set_direction(pattern[i % 4]);
            i += 1;
            m.tick(t0 + TICK * i as u32);
            assert_eq!(m.snapshot().snake.len(), INITIAL_SNAKE_LENGTH);
        }
    }

    #[test]
    fn reversal_is_rejected_at_tick() {
        let t0 = Instant::now();
        let mut m = started(5, t0);

        m.set_direction(Left);
        m.tick(t0 + TICK);

        let snap = m.snapshot();
        assert_eq!(snap.direction, Right);
        assert_eq!(snap.snake[0], Position::new(11, 10));
    }

    #[test]
    fn last_intent_before_tick_wins() {
        let t0 = Instant::now();
        let mut m = started(6, t0);

        m.set_direction(Up);
        m.set_direction(Down);
        m.tick(t0 + TICK);

        let snap = m.snapshot();
        assert_eq!(snap.direction, Down);
        assert_eq!(snap.snake[0], Position::new(10, 11));
    }

    #[test]
    fn reversal_after_valid_turn_keeps_old_direction() {
        let t0 = Instant::now();
        let mut m = started(7, t0);

        m.set_direction(Up);
        m.set_direction(Left);
        m.tick(t0 + TICK);

        assert_eq!(m.snapshot().direction, Right);
    }

    fn seed_with_food<F: Fn(Position) -> bool>(wanted: F) -> u64 {
        (0..).find(|&seed| wanted(machine(seed).snapshot().food)).unwrap()
    }

    #[test]
    fn food_contact_beats_an_expired_food_timer() {
        let seed = seed_with_food(|food| food.y == 10 && food.x > 10);
        let t0 = Instant::now();
        let mut m = started(seed, t0);
        let food = m.snapshot().food;

        let steps = (food.x - 10) as u32;
        for i in 1..steps {
            assert_eq!(m.tick(t0 + TICK * i), GameStatus::Running);
        }
        assert_eq!(m.tick(t0 + Duration::from_secs(11)), GameStatus::GameOver);

        let snap = m.snapshot();
        assert_eq!(snap.loss_reason, Some(LossReason::AteFood));
        assert_eq!(snap.snake[0], food);
        assert!(snap.food_elapsed > Config::default().food_timeout());
    }

    #[test]
    fn leaving_the_square_beats_expired_timers() {
        let seed = seed_with_food(|food| !(food.y == 10 && food.x > 10));
        let t0 = Instant::now();
        let mut m = started(seed, t0);

        for i in 1..10 {
            assert_eq!(m.tick(t0 + TICK * i), GameStatus::Running);
        }
        assert_eq!(m.tick(t0 + Duration::from_secs(16)), GameStatus::GameOver);

        let snap = m.snapshot();
        assert_eq!(snap.loss_reason, Some(LossReason::OutOfBounds));
        assert_eq!(snap.snake[0], Position::new(20, 10));
        assert!(snap.elapsed > Config::default().survival_timeout());
    }

    #[test]
    fn no_input_ends_the_game_quickly() {
        let t0 = Instant::now();
        let mut m = started(8, t0);
        let food = m.snapshot().food;

        let ticks = run_until_over(&mut m, t0, |_| None);
        let snap = m.snapshot();

        assert_eq!(snap.status, GameStatus::GameOver);
        assert!(snap.elapsed <= Config::default().food_timeout());
        if food.y == 10 && food.x > 10 {
            assert_eq!(snap.loss_reason, Some(LossReason::AteFood));
        } else {
            assert_eq!(snap.loss_reason, Some(LossReason::OutOfBounds));
            assert_eq!(ticks, 10);
            assert_eq!(snap.snake[0], Position::new(20, 10));
        }
    }

    #[test]
    fn circling_starves_before_survival_timeout() {
        for seed in 0..20 {
            let t0 = Instant::now();
            let mut m = started(seed, t0);
            let pattern = circle_avoiding(m.snapshot().food);

            let mut i = 0;
            let ticks = run_until_over(&mut m, t0, |_| {
                i += 1;
                Some(pattern[(i - 1) % 4])
            });
            let snap = m.snapshot();

            assert_eq!(snap.loss_reason, Some(LossReason::FoodTimeout), "seed {seed}");
            assert_eq!(ticks, 101);
            assert_eq!(snap.food_elapsed, Duration::from_millis(10_100));
        }
    }

    #[test]
    fn reaching_food_is_fatal() {
        for seed in 0..50 {
            let t0 = Instant::now();
            let mut m = started(seed, t0);
            let food = m.snapshot().food;

            run_until_over(&mut m, t0, toward_food);
            let snap = m.snapshot();

            assert_eq!(snap.loss_reason, Some(LossReason::AteFood), "seed {seed}");
            assert_eq!(snap.snake[0], food);
            assert!(snap.elapsed < Config::default().food_timeout());
        }
    }

    #[test]
    fn survival_timeout_fires_when_food_timer_is_longer() {
        let config = Config { food_timeout_ms: 20_000, survival_timeout_ms: 1_000, ..Config::default() };
        let t0 = Instant::now();
        let mut m = GameMachine::with_rng(config, StdRng::seed_from_u64(9));
        m.start(t0);
        let pattern = circle_avoiding(m.snapshot().food);

        let mut i = 0;
        let ticks = run_until_over(&mut m, t0, |_| {
            i += 1;
            Some(pattern[(i - 1) % 4])
        });

        assert_eq!(m.snapshot().loss_reason, Some(LossReason::SurvivalTimeout));
        assert_eq!(ticks, 11);
    }

    #[test]
    fn food_timeout_is_checked_before_survival_timeout() {
        let config = Config { food_timeout_ms: 1_000, survival_timeout_ms: 1_000, ..Config::default() };
        let t0 = Instant::now();
        let mut m = GameMachine::with_rng(config, StdRng::seed_from_u64(10));
        m.start(t0);
        let pattern = circle_avoiding(m.snapshot().food);

        let mut i = 0;
        run_until_over(&mut m, t0, |_| {
            i += 1;
            Some(pattern[(i - 1) % 4])
        });

        assert_eq!(m.snapshot().loss_reason, Some(LossReason::FoodTimeout));
    }

    #[test]
    fn game_over_ignores_everything_but_restart_and_quit() {
        let t0 = Instant::now();
        let mut m = started(11, t0);
        let ticks = run_until_over(&mut m, t0, |_| None);
        let frozen = m.snapshot();
        let later = t0 + TICK * (ticks + 5);

        m.set_direction(Up);
        assert_eq!(m.tick(later), GameStatus::GameOver);
        m.start(later);
        assert!(m.apply(Intent::Turn(Down), later).is_continue());
        assert!(m.apply(Intent::Start, later).is_continue());

        assert_eq!(m.snapshot(), frozen);
    }

    #[test]
    fn restart_matches_a_fresh_start() {
        let t0 = Instant::now();
        let mut m = started(12, t0);
        let mut fresh = m.snapshot();

        let ticks = run_until_over(&mut m, t0, |_| None);
        let t1 = t0 + TICK * (ticks + 3);
        m.restart(t1);
        let mut restarted = m.snapshot();

        assert_eq!(restarted.status, GameStatus::Running);
        fresh.food = Position::new(0, 0);
        restarted.food = Position::new(0, 0);
        assert_eq!(restarted, fresh);
    }

    #[test]
    fn restart_is_ignored_while_running() {
        let t0 = Instant::now();
        let mut m = started(13, t0);
        m.tick(t0 + TICK);
        let running = m.snapshot();

        assert!(m.apply(Intent::Restart, t0 + TICK * 2).is_continue());
        assert_eq!(m.snapshot(), running);
    }

    #[test]
    fn quit_breaks_from_every_state() {
        let t0 = Instant::now();
        let mut m = machine(14);
        assert!(m.apply(Intent::Quit, t0).is_break());

        m.start(t0);
        assert!(m.apply(Intent::Quit, t0).is_break());

        run_until_over(&mut m, t0, |_| None);
        assert!(m.apply(Intent::Quit, t0).is_break());
    }

    #[test]
    fn no_intent_sequence_outlives_survival_timeout() {
        let survival = Config::default().survival_timeout();
        let directions = [Up, Down, Left, Right];

        for seed in 0..300 {
            let t0 = Instant::now();
            let mut m = started(seed, t0);
            let mut player = StdRng::seed_from_u64(seed ^ 0xDEAD_BEEF);

            run_until_over(&mut m, t0, |_| {
                if player.gen_bool(0.3) {
                    directions.choose(&mut player).copied()
                } else {
                    None
                }
            });

            let snap = m.snapshot();
            assert_eq!(snap.status, GameStatus::GameOver);
            assert!(snap.elapsed <= survival, "seed {seed} survived {:?}", snap.elapsed);
        }
    }
}
