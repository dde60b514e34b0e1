//! A player's 4×3 card layout.
//!
//! Positions run row-major: column `c` is made of positions `c`, `c + 4` and
//! `c + 8`. A slot becomes `None` once its column has been cleared and stays
//! that way until the next deal.

use crate::cards::{Card, Deck};
use rand::seq::index::sample;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GRID_COLUMNS: usize = 4;
pub const GRID_ROWS: usize = 3;
pub const GRID_SLOTS: usize = GRID_COLUMNS * GRID_ROWS;
/// Cards each player turns over when a round is dealt.
pub const INITIAL_REVEALS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub value: Card,
    pub revealed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfRange(usize),
    #[error("position {0} belongs to a cleared column")]
    Cleared(usize),
    #[error("position {0} is already face up")]
    AlreadyRevealed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grid {
    slots: [Option<Slot>; GRID_SLOTS],
}

impl Grid {
    /// Lay out `cards` face down in position order.
    pub fn from_cards(cards: [Card; GRID_SLOTS]) -> Self {
        let mut grid = Grid::default();
        for (slot, value) in grid.slots.iter_mut().zip(cards) {
            *slot = Some(Slot { value, revealed: false });
        }
        grid
    }

    /// Pop twelve cards off `deck` into positions 0..11, all face down.
    /// Returns `None` and leaves the deck untouched if it is too short.
    pub fn deal(deck: &mut Deck) -> Option<Self> {
        if deck.len() < GRID_SLOTS {
            return None;
        }
        let mut cards = [Card::new(0)?; GRID_SLOTS];
        for card in cards.iter_mut() {
            *card = deck.draw()?;
        }
        Some(Self::from_cards(cards))
    }

    pub fn reveal_initial(&mut self, count: usize) -> Vec<usize> {
        self.reveal_initial_with(count, &mut thread_rng())
    }

    /// Turn `count` distinct random face-down slots face up and return their
    /// positions.
    pub fn reveal_initial_with<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<usize> {
        let hidden = self.face_down_positions();
        let picked: Vec<usize> = sample(rng, hidden.len(), count.min(hidden.len()))
            .into_iter()
            .map(|i| hidden[i])
            .collect();
        for &pos in &picked {
            self.reveal(pos);
        }
        picked
    }

    pub fn slot(&self, position: usize) -> Option<&Slot> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> &[Option<Slot>; GRID_SLOTS] {
        &self.slots
    }

    pub fn is_cleared(&self, position: usize) -> bool {
        position < GRID_SLOTS && self.slots[position].is_none()
    }

    /// Check that `position` names a live slot and hand it back mutably.
    fn live_slot_mut(&mut self, position: usize) -> Result<&mut Slot, GridError> {
        self.slots
            .get_mut(position)
            .ok_or(GridError::OutOfRange(position))?
            .as_mut()
            .ok_or(GridError::Cleared(position))
    }

    /// Put `card` face up at `position` and return the card it replaced.
    pub fn place(&mut self, position: usize, card: Card) -> Result<Card, GridError> {
        let slot = self.live_slot_mut(position)?;
        let old = slot.value;
        *slot = Slot { value: card, revealed: true };
        Ok(old)
    }

    /// Flip a face-down slot. Returns false, changing nothing, for a face-up,
    /// cleared or out-of-range position.
    pub fn reveal(&mut self, position: usize) -> bool {
        match self.live_slot_mut(position) {
            Ok(slot) if !slot.revealed => {
                slot.revealed = true;
                true
            }
            _ => false,
        }
    }

    /// Like [`Grid::reveal`] but says why nothing happened.
    pub fn try_reveal(&mut self, position: usize) -> Result<(), GridError> {
        let slot = self.live_slot_mut(position)?;
        if slot.revealed {
            return Err(GridError::AlreadyRevealed(position));
        }
        slot.revealed = true;
        Ok(())
    }

    /// Remove every column whose three slots are face up and equal. Returns the
    /// cards taken out of the grid; a second call with no change in between
    /// returns nothing.
    pub fn check_column_clear(&mut self) -> Vec<Card> {
        let mut removed = Vec::new();
        for col in 0..GRID_COLUMNS {
            let positions = column_positions(col);
            let cells: Vec<Slot> = positions.iter().filter_map(|&p| self.slots[p]).collect();
            if cells.len() != GRID_ROWS {
                continue;
            }
            let first = cells[0].value;
            if cells.iter().all(|s| s.revealed && s.value == first) {
                for p in positions {
                    self.slots[p] = None;
                }
                removed.extend(cells.iter().map(|s| s.value));
            }
        }
        removed
    }

    /// Every slot is face up or cleared.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.map_or(true, |s| s.revealed))
    }

    /// Sum of all uncleared slots, face down or not.
    pub fn score(&self) -> i32 {
        self.slots
            .iter()
            .flatten()
            .map(|s| i32::from(s.value.value()))
            .sum()
    }

    pub fn revealed_sum(&self) -> i32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.revealed)
            .map(|s| i32::from(s.value.value()))
            .sum()
    }

    pub fn face_down_positions(&self) -> Vec<usize> {
        (0..GRID_SLOTS)
            .filter(|&p| matches!(self.slots[p], Some(Slot { revealed: false, .. })))
            .collect()
    }

    pub fn uncleared_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn reveal_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.revealed = true;
        }
    }
}

pub fn column_positions(col: usize) -> [usize; GRID_ROWS] {
    [col, col + GRID_COLUMNS, col + 2 * GRID_COLUMNS]
}
