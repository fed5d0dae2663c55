//! Session state for one run of the game.
//!
//! [`SessionController`] owns the score, the power-up counter and the game
//! over flag, and drives the game over screen: deciding whether the run made
//! the high score table and capturing the player's initials if it did.
use crate::highscore::{
    HighScoreEntry, HighScoreError, HighScoreFile, HighScoreTable, INITIALS_LEN,
};
use crate::structs::CollisionKind;

pub const BONUS_POINTS: u32 = 100;
pub const CURSOR_BLINK_FRAMES: u32 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub score: u32,
    pub powerup_count: u32,
    pub is_game_over: bool,
}

/// The initials box shown after a qualifying game over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitialsEntry {
    pub buffer: String,
    pub active: bool,
    pub cursor_visible: bool,
    pub cursor_timer: u32,
}

impl InitialsEntry {
    fn new() -> Self {
        Self {
            buffer: String::with_capacity(INITIALS_LEN),
            active: true,
            cursor_visible: true,
            cursor_timer: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.buffer.chars().count() >= INITIALS_LEN
    }

    fn blink(&mut self) {
        self.cursor_timer += 1;
        if self.cursor_timer >= CURSOR_BLINK_FRAMES {
            self.cursor_visible = !self.cursor_visible;
            self.cursor_timer = 0;
        }
    }
}

/// What `confirm_initials` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Ignored,
    Saved { rank: usize },
    NoLongerQualifies,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Playing,
    GameOver { entry_active: bool },
}

pub struct SessionController {
    session: Session,
    entry: Option<InitialsEntry>,
    high_scores: HighScoreTable,
    scores_file: HighScoreFile,
    game_over_entered: bool,
}

impl SessionController {
    pub fn new(scores_file: HighScoreFile) -> Self {
        Self {
            session: Session::default(),
            entry: None,
            high_scores: HighScoreTable::new(),
            scores_file,
            game_over_entered: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn score(&self) -> u32 {
        self.session.score
    }

    pub fn powerup_count(&self) -> u32 {
        self.session.powerup_count
    }

    pub fn is_game_over(&self) -> bool {
        self.session.is_game_over
    }

    pub fn initials(&self) -> Option<&InitialsEntry> {
        self.entry.as_ref()
    }

    pub fn initials_active(&self) -> bool {
        self.entry.as_ref().is_some_and(|entry| entry.active)
    }

    /// The table as of the last load or save.
    pub fn high_scores(&self) -> &HighScoreTable {
        &self.high_scores
    }

    pub fn phase(&self) -> Phase {
        if self.session.is_game_over {
            Phase::GameOver {
                entry_active: self.initials_active(),
            }
        } else {
            Phase::Playing
        }
    }

    pub fn record_collision(&mut self, kind: CollisionKind) {
        match kind {
            CollisionKind::Hazard => self.session.is_game_over = true,
            CollisionKind::Bonus => self.session.score += BONUS_POINTS,
            CollisionKind::PowerUp => self.session.powerup_count += 1,
        }
    }

    /// Survival point for a frame played through.
    pub fn tick_score(&mut self) {
        if !self.session.is_game_over {
            self.session.score += 1;
        }
    }

    /// Per-frame hook: scores while playing, blinks the cursor while the
    /// initials box is open.
    pub fn tick(&mut self) {
        if !self.session.is_game_over {
            self.tick_score();
        } else if let Some(entry) = self.entry.as_mut() {
            entry.blink();
        }
    }

    /// Loads the table and opens the initials box if the score makes it.
    /// Once a load has succeeded, later calls in the same session do nothing.
    /// After a failed load the next call tries again.
    pub fn enter_game_over(&mut self) -> Result<(), HighScoreError> {
        self.session.is_game_over = true;
        if self.game_over_entered {
            return Ok(());
        }

        self.high_scores = self.scores_file.load()?;
        self.game_over_entered = true;
        if self.high_scores.qualifies(self.session.score) {
            tracing::info!(score = self.session.score, "new highscore, asking for initials");
            self.entry = Some(InitialsEntry::new());
        } else {
            tracing::info!(
                score = self.session.score,
                lowest = ?self.high_scores.lowest(),
                "score did not make the highscore table"
            );
            self.entry = None;
        }
        Ok(())
    }

    /// Whether the game over load has succeeded and the initials box was
    /// opened or skipped for good.
    pub fn qualification_decided(&self) -> bool {
        self.game_over_entered
    }

    /// Reloads the table and closes the initials box if another writer has
    /// pushed this score out of it in the meantime. Retries the game over
    /// load if it failed before.
    pub fn recheck_qualification(&mut self) -> Result<(), HighScoreError> {
        if self.session.is_game_over && !self.game_over_entered {
            return self.enter_game_over();
        }
        if !self.initials_active() {
            return Ok(());
        }
        self.high_scores = self.scores_file.load()?;
        if !self.high_scores.qualifies(self.session.score) {
            tracing::info!(score = self.session.score, "score no longer qualifies");
            self.entry = None;
        }
        Ok(())
    }

    pub fn append_initial_char(&mut self, c: char) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        if !entry.active || entry.is_full() || !c.is_ascii_alphanumeric() {
            return;
        }
        entry.buffer.push(c);
    }

    pub fn backspace(&mut self) {
        if let Some(entry) = self.entry.as_mut() {
            entry.buffer.pop();
        }
    }

    /// Saves the score under the typed initials and closes the box. An empty
    /// buffer is ignored. On a write error the box stays open. If the table
    /// filled up with better scores since game over, nothing is written.
    pub fn confirm_initials(&mut self) -> Result<Confirmation, HighScoreError> {
        let initials = match self.entry.as_ref() {
            Some(entry) if entry.active && !entry.buffer.is_empty() => {
                entry.buffer.to_uppercase()
            }
            _ => return Ok(Confirmation::Ignored),
        };

        let mut table = self.scores_file.load()?;
        let Some(rank) = table.insert(HighScoreEntry::new(self.session.score, &initials)) else {
            tracing::info!(score = self.session.score, "score no longer qualifies, not saved");
            self.high_scores = table;
            self.entry = None;
            return Ok(Confirmation::NoLongerQualifies);
        };
        self.scores_file.save(&table)?;
        tracing::info!(score = self.session.score, %initials, rank, "highscore recorded");

        self.high_scores = table;
        self.entry = None;
        Ok(Confirmation::Saved { rank })
    }

    pub fn restart(&mut self) {
        self.session = Session::default();
        self.entry = None;
        self.game_over_entered = false;
        tracing::debug!("session restarted");
    }
}
