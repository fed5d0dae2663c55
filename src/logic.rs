//! This module contains the logic for the game.
//!
//! `World` holds the player and everything that is falling. `Game` ties the
//! world to the `SessionController`: it turns key presses into commands,
//! advances one frame at a time and feeds collisions into the session.
//! `run_game` owns the terminal and drives the fixed-rate frame loop.
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    cursor::{Hide, Show},
    event::{poll, read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::display::{draw_frame, splash_screen};
use crate::highscore::HighScoreFile;
use crate::session::{Confirmation, Phase, SessionController};
use crate::structs::*;

#[derive(Clone, Debug, Default)]
pub struct World {
    player: Player,
    objects: Vec<FallingObject>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn objects(&self) -> &[FallingObject] {
        &self.objects
    }

    pub fn reset(&mut self) {
        self.player = Player::start();
        self.objects.clear();
    }

    pub fn move_player(&mut self, d_pos_x: i32, d_pos_y: i32) {
        self.player.pos_x = (self.player.pos_x + d_pos_x).clamp(0, BOARD_WIDTH - 1);
        self.player.pos_y = (self.player.pos_y + d_pos_y).clamp(0, BOARD_HEIGHT - 1);
    }

    /// Puts a new object on the top row.
    pub fn drop_object(&mut self, kind: ObjectKind, pos_x: i32, speed_level: u8) {
        let speed_level = speed_level.clamp(1, MAX_SPEED_LEVEL);
        self.objects.push(FallingObject {
            kind,
            pos_x: pos_x.clamp(0, BOARD_WIDTH - 1),
            pos_y: 0.0,
            speed: f32::from(speed_level) * ROWS_PER_SPEED_LEVEL,
        });
    }

    fn drop_random(&mut self, kind: ObjectKind, rng: &mut impl Rng) {
        let speed_level = kind
            .spec()
            .fixed_speed
            .unwrap_or_else(|| rng.gen_range(1..=MAX_SPEED_LEVEL));
        let pos_x = rng.gen_range(0..BOARD_WIDTH);
        self.drop_object(kind, pos_x, speed_level);
    }

    /// Rolls for a new money or documents object. `difficulty` is the
    /// percentage of new objects that are documents.
    pub fn spawn(&mut self, rng: &mut impl Rng, config: &GameConfig) -> Option<ObjectKind> {
        if rng.gen_range(0..100u8) >= config.spawn_chance {
            return None;
        }
        let kind = if config.difficulty > rng.gen_range(0..100u8) {
            ObjectKind::Documents
        } else {
            ObjectKind::Money
        };
        self.drop_random(kind, rng);
        Some(kind)
    }

    pub fn spawn_power_up(&mut self, rng: &mut impl Rng) {
        self.drop_random(ObjectKind::PowerUp, rng);
    }

    /// Moves everything down and forgets what fell off the board.
    pub fn advance(&mut self) {
        for object in &mut self.objects {
            object.pos_y += object.speed;
        }
        self.objects.retain(|object| object.row() < BOARD_HEIGHT);
    }

    /// Removes the objects on the player's cell and returns what they do.
    pub fn take_collisions(&mut self) -> Vec<CollisionKind> {
        let player = self.player;
        let mut hits = Vec::new();
        self.objects.retain(|object| {
            let hit = object.pos_x == player.pos_x && object.row() == player.pos_y;
            if hit {
                hits.push(object.kind.effect());
            }
            !hit
        });
        hits
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Move(i32, i32),
    Char(char),
    Backspace,
    Confirm,
    Restart,
    Quit,
}

pub fn command_for(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
        return None;
    }
    let command = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Esc => Command::Quit,
        KeyCode::Left => Command::Move(-1, 0),
        KeyCode::Right => Command::Move(1, 0),
        KeyCode::Up => Command::Move(0, -1),
        KeyCode::Down => Command::Move(0, 1),
        KeyCode::Char(' ') => Command::Restart,
        KeyCode::Char(c) => Command::Char(c),
        KeyCode::Backspace => Command::Backspace,
        KeyCode::Enter => Command::Confirm,
        _ => return None,
    };
    Some(command)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// How often the game over screen re-reads the highscore file.
const RECHECK_FRAMES: u32 = 60;

pub struct Game<R> {
    controller: SessionController,
    world: World,
    rng: R,
    config: GameConfig,
    status: Option<String>,
    game_over_frames: u32,
}

impl<R: Rng> Game<R> {
    pub fn new(controller: SessionController, config: GameConfig, rng: R) -> Self {
        Self {
            controller,
            world: World::new(),
            rng,
            config,
            status: None,
            game_over_frames: 0,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Last error worth showing on the game over screen.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn apply_command(&mut self, command: Command) -> Flow {
        if command == Command::Quit {
            return Flow::Quit;
        }

        if self.controller.phase() == Phase::Playing {
            if let Command::Move(d_pos_x, d_pos_y) = command {
                self.world.move_player(d_pos_x, d_pos_y);
            }
            return Flow::Continue;
        }

        match command {
            Command::Restart => {
                self.controller.restart();
                self.world.reset();
                self.status = None;
                self.game_over_frames = 0;
            }
            Command::Char(c) => self.controller.append_initial_char(c),
            Command::Backspace => self.controller.backspace(),
            Command::Confirm => match self.controller.confirm_initials() {
                Ok(Confirmation::NoLongerQualifies) => {
                    self.status = Some("Score no longer qualifies".to_string());
                }
                Ok(_) => self.status = None,
                Err(err) => {
                    tracing::error!("{err}");
                    self.status = Some(format!("Save failed: {err}"));
                }
            },
            Command::Move(..) | Command::Quit => {}
        }
        Flow::Continue
    }

    /// One frame: drop new objects, let everything fall, resolve what the
    /// player touched and score the frame.
    pub fn step(&mut self) {
        if self.controller.is_game_over() {
            self.controller.tick();
            self.game_over_frames += 1;
            if self.game_over_frames % RECHECK_FRAMES == 0 {
                let decided = self.controller.qualification_decided();
                match self.controller.recheck_qualification() {
                    Ok(()) if !decided => self.status = None,
                    Ok(()) => {}
                    Err(err) => tracing::warn!("{err}"),
                }
            }
            return;
        }

        self.world.spawn(&mut self.rng, &self.config);
        let score = self.controller.score();
        if score > 0 && score % POWERUP_SCORE_INTERVAL == 0 {
            self.world.spawn_power_up(&mut self.rng);
        }
        self.world.advance();

        for hit in self.world.take_collisions() {
            self.controller.record_collision(hit);
        }

        if self.controller.is_game_over() {
            tracing::info!(
                score = self.controller.score(),
                powerups = self.controller.powerup_count(),
                "game over"
            );
            if let Err(err) = self.controller.enter_game_over() {
                tracing::error!("{err}");
                self.status = Some(format!("Highscores unavailable: {err}"));
            }
        } else {
            self.controller.tick();
        }
    }
}

/// Raw mode and the alternate screen for as long as the game runs.
struct TerminalGuard {
    out: Stdout,
}

impl TerminalGuard {
    fn begin() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut guard = Self { out: io::stdout() };
        execute!(guard.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub fn run_game(args: &Args) -> anyhow::Result<()> {
    let config = GameConfig::from(args);
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let controller = SessionController::new(HighScoreFile::new(&args.path));
    let mut game = Game::new(controller, config, rng);
    tracing::info!(?config, path = %args.path.display(), "starting game");

    let mut terminal = TerminalGuard::begin().context("failed to set up the terminal")?;
    splash_screen(&mut terminal.out)?;
    game_loop(&mut game, &mut terminal.out)
}

fn game_loop<R: Rng>(game: &mut Game<R>, out: &mut Stdout) -> anyhow::Result<()> {
    let frame = Duration::from_secs_f64(1.0 / f64::from(game.config.fps));

    loop {
        let frame_start = Instant::now();

        while poll(Duration::ZERO)? {
            match read()? {
                Event::Key(key) => {
                    if let Some(command) = command_for(key) {
                        if game.apply_command(command) == Flow::Quit {
                            tracing::info!(score = game.controller().score(), "quit");
                            return Ok(());
                        }
                    }
                }
                Event::Resize(..) => execute!(out, Clear(ClearType::All))?,
                _ => {}
            }
        }

        game.step();
        draw_frame(out, game.world(), game.controller(), game.status())?;

        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            std::thread::sleep(frame - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn quiet_config() -> GameConfig {
        GameConfig {
            spawn_chance: 0,
            ..GameConfig::default()
        }
    }

    fn test_game(config: GameConfig) -> (Game<StdRng>, TempDir) {
        let dir = TempDir::new().unwrap();
        let file = HighScoreFile::new(dir.path().join("high_scores.txt"));
        let controller = SessionController::new(file);
        (Game::new(controller, config, StdRng::seed_from_u64(7)), dir)
    }

    fn above_player(world: &World, kind: ObjectKind) -> FallingObject {
        FallingObject {
            kind,
            pos_x: world.player.pos_x,
            pos_y: world.player.pos_y as f32 - 0.01,
            speed: ROWS_PER_SPEED_LEVEL,
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn player_stays_on_the_board() {
        let mut world = World::new();
        for _ in 0..200 {
            world.move_player(-1, 1);
        }
        assert_eq!(*world.player(), Player { pos_x: 0, pos_y: BOARD_HEIGHT - 1 });
        for _ in 0..200 {
            world.move_player(1, -1);
        }
        assert_eq!(*world.player(), Player { pos_x: BOARD_WIDTH - 1, pos_y: 0 });
    }

    #[test]
    fn difficulty_picks_between_money_and_documents() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut world = World::new();
        let all_hazards = GameConfig {
            difficulty: 100,
            spawn_chance: 100,
            ..GameConfig::default()
        };
        for _ in 0..20 {
            assert_eq!(world.spawn(&mut rng, &all_hazards), Some(ObjectKind::Documents));
        }
        let no_hazards = GameConfig {
            difficulty: 0,
            ..all_hazards
        };
        for _ in 0..20 {
            assert_eq!(world.spawn(&mut rng, &no_hazards), Some(ObjectKind::Money));
        }
        assert_eq!(world.spawn(&mut rng, &quiet_config()), None);
        assert_eq!(world.objects().len(), 40);
        for object in world.objects() {
            assert_eq!(object.row(), 0);
            assert!((0..BOARD_WIDTH).contains(&object.pos_x));
            assert!(object.speed > 0.0);
            assert!(object.speed <= f32::from(MAX_SPEED_LEVEL) * ROWS_PER_SPEED_LEVEL);
        }
    }

    #[test]
    fn power_ups_fall_at_top_speed() {
        let mut world = World::new();
        world.spawn_power_up(&mut StdRng::seed_from_u64(3));
        let object = &world.objects()[0];
        assert_eq!(object.kind, ObjectKind::PowerUp);
        assert_eq!(object.speed, f32::from(MAX_SPEED_LEVEL) * ROWS_PER_SPEED_LEVEL);
    }

    #[test]
    fn objects_fall_off_the_bottom() {
        let mut world = World::new();
        world.drop_object(ObjectKind::Money, 0, MAX_SPEED_LEVEL);
        for _ in 0..100 {
            world.advance();
        }
        assert_eq!(world.objects().len(), 1);
        for _ in 0..25 {
            world.advance();
        }
        assert!(world.objects().is_empty());
    }

    #[test]
    fn collisions_remove_objects_and_report_effects() {
        let mut world = World::new();
        let hit = above_player(&world, ObjectKind::Money);
        world.objects.push(hit.clone());
        world.objects.push(FallingObject { pos_x: hit.pos_x + 1, ..hit });
        world.advance();

        assert_eq!(world.take_collisions(), vec![CollisionKind::Bonus]);
        assert_eq!(world.objects().len(), 1);
        assert!(world.take_collisions().is_empty());
    }

    #[test]
    fn hazard_ends_the_session_and_opens_initials() {
        let (mut game, dir) = test_game(quiet_config());
        for _ in 0..10 {
            game.step();
        }
        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();

        assert_eq!(game.controller().score(), 10);
        assert_eq!(game.controller().phase(), Phase::GameOver { entry_active: true });

        let commands = [
            Command::Char('j'),
            Command::Char('o'),
            Command::Char('e'),
            Command::Confirm,
        ];
        for command in commands {
            assert_eq!(game.apply_command(command), Flow::Continue);
        }
        assert_eq!(
            fs::read_to_string(dir.path().join("high_scores.txt")).unwrap(),
            "10,JOE\n"
        );
        assert!(game.status().is_none());
    }

    #[test]
    fn money_and_coins_feed_the_session() {
        let (mut game, _dir) = test_game(quiet_config());
        let money = above_player(&game.world, ObjectKind::Money);
        game.world.objects.push(money);
        game.step();
        let coin = above_player(&game.world, ObjectKind::PowerUp);
        game.world.objects.push(coin);
        game.step();

        assert_eq!(game.controller().score(), 102);
        assert_eq!(game.controller().powerup_count(), 1);
        assert!(!game.controller().is_game_over());
    }

    #[test]
    fn power_up_appears_every_thousand_points() {
        let (mut game, _dir) = test_game(quiet_config());
        for _ in 0..9 {
            let money = above_player(&game.world, ObjectKind::Money);
            game.world.objects.push(money);
            game.step();
        }
        // 9 bonuses and 9 survival points
        assert_eq!(game.controller().score(), 909);
        for _ in 0..91 {
            game.step();
        }
        assert!(game.world().objects().is_empty());
        game.step();
        assert_eq!(game.world().objects().len(), 1);
        assert_eq!(game.world().objects()[0].kind, ObjectKind::PowerUp);
    }

    #[test]
    fn moves_only_apply_while_playing() {
        let (mut game, _dir) = test_game(quiet_config());
        let start = *game.world().player();
        game.apply_command(Command::Move(-1, 0));
        assert_eq!(game.world().player().pos_x, start.pos_x - 1);

        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();
        assert!(game.controller().is_game_over());

        let before = *game.world().player();
        game.apply_command(Command::Move(1, 0));
        assert_eq!(*game.world().player(), before);
    }

    #[test]
    fn restart_clears_world_and_session() {
        let (mut game, _dir) = test_game(quiet_config());
        game.world.drop_object(ObjectKind::Money, 3, 1);
        game.apply_command(Command::Restart);
        assert_eq!(game.world().objects().len(), 1);

        game.apply_command(Command::Move(1, -1));
        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();
        assert!(game.controller().is_game_over());

        assert_eq!(game.apply_command(Command::Restart), Flow::Continue);
        assert!(!game.controller().is_game_over());
        assert_eq!(game.controller().score(), 0);
        assert!(game.world().objects().is_empty());
        assert_eq!(*game.world().player(), Player::start());
    }

    #[test]
    fn failed_save_is_reported_as_status() {
        let dir = TempDir::new().unwrap();
        let file = HighScoreFile::new(dir.path().join("missing").join("scores.txt"));
        let controller = SessionController::new(file);
        let mut game = Game::new(controller, quiet_config(), StdRng::seed_from_u64(1));
        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();

        game.apply_command(Command::Char('A'));
        game.apply_command(Command::Confirm);
        assert!(game.status().unwrap().starts_with("Save failed"));
        assert!(game.controller().initials_active());
    }

    #[test]
    fn unreadable_scores_are_retried_on_the_game_over_screen() {
        let (mut game, dir) = test_game(quiet_config());
        let path = dir.path().join("high_scores.txt");
        fs::create_dir(&path).unwrap();
        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();
        assert!(game.status().unwrap().starts_with("Highscores unavailable"));
        assert!(!game.controller().initials_active());

        fs::remove_dir(&path).unwrap();
        for _ in 0..RECHECK_FRAMES {
            game.step();
        }
        assert!(game.controller().initials_active());
        assert!(game.status().is_none());
    }

    #[test]
    fn late_disqualification_is_reported() {
        let (mut game, dir) = test_game(quiet_config());
        let hazard = above_player(&game.world, ObjectKind::Documents);
        game.world.objects.push(hazard);
        game.step();
        let content = "900,AAA\n800,BBB\n700,CCC\n600,DDD\n500,EEE\n";
        fs::write(dir.path().join("high_scores.txt"), content).unwrap();

        game.apply_command(Command::Char('X'));
        game.apply_command(Command::Confirm);
        assert_eq!(game.status(), Some("Score no longer qualifies"));
        assert!(!game.controller().initials_active());
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for(press(KeyCode::Left)), Some(Command::Move(-1, 0)));
        assert_eq!(command_for(press(KeyCode::Down)), Some(Command::Move(0, 1)));
        assert_eq!(command_for(press(KeyCode::Char(' '))), Some(Command::Restart));
        assert_eq!(command_for(press(KeyCode::Char('x'))), Some(Command::Char('x')));
        assert_eq!(command_for(press(KeyCode::Enter)), Some(Command::Confirm));
        assert_eq!(command_for(press(KeyCode::Backspace)), Some(Command::Backspace));
        assert_eq!(command_for(press(KeyCode::Esc)), Some(Command::Quit));
        assert_eq!(
            command_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(command_for(press(KeyCode::Tab)), None);

        let mut release = press(KeyCode::Char('a'));
        release.kind = KeyEventKind::Release;
        assert_eq!(command_for(release), None);
    }
}
