use crate::error::{ActionError, NotFoundError, PreconditionError, TurnError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use skyjo_protocol::*;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub grid: Grid,
    /// Score of the last completed round.
    pub score: i32,
    pub total_score: i32,
    pub is_host: bool,
}

impl Player {
    fn new(id: Uuid, name: String, color: String, is_host: bool) -> Self {
        Player {
            id,
            name,
            color,
            grid: Grid::default(),
            score: 0,
            total_score: 0,
            is_host,
        }
    }
}

/// The current player's progress through the acquire/resolve pair of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Holding { card: Card, source: CardSource },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// The round that just finished.
    pub round_number: u32,
    pub scores: Vec<(Uuid, i32)>,
    pub totals: Vec<(Uuid, i32)>,
    pub winner: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    NextTurn(Uuid),
    RoundOver(RoundSummary),
}

/// Authoritative state for one game. Players keep insertion order, which is
/// also turn order and the tie-break order for every comparison.
#[derive(Debug)]
pub struct Engine {
    pub(crate) players: Vec<Player>,
    pub(crate) draw_pile: Deck,
    pub(crate) discard_pile: DiscardPile,
    pub(crate) current: usize,
    pub(crate) round_number: u32,
    pub(crate) phase: Phase,
    pub(crate) turn: TurnState,
    /// Cards taken out of play this round: cleared columns plus whatever a
    /// departing player still had.
    pub(crate) removed: usize,
    pub(crate) winner: Option<Uuid>,
    max_players: usize,
    rng: StdRng,
}

impl Engine {
    pub fn new(max_players: usize) -> Self {
        Self::with_rng(max_players, StdRng::from_entropy())
    }

    pub fn with_seed(max_players: usize, seed: u64) -> Self {
        Self::with_rng(max_players, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_players: usize, rng: StdRng) -> Self {
        Engine {
            players: Vec::new(),
            draw_pile: Deck::default(),
            discard_pile: DiscardPile::default(),
            current: 0,
            round_number: 1,
            phase: Phase::Waiting,
            turn: TurnState::Idle,
            removed: 0,
            winner: None,
            max_players: max_players.clamp(MIN_PLAYERS, MAX_PLAYERS),
            rng,
        }
    }

    /// A fresh game for the same table: same players and host, zero scores.
    pub fn rematch(&self) -> Self {
        let mut next = Self::with_rng(self.max_players, StdRng::from_entropy());
        next.players = self
            .players
            .iter()
            .map(|p| Player::new(p.id, p.name.clone(), p.color.clone(), p.is_host))
            .collect();
        next
    }

    /* ---------------- membership ---------------- */

    pub fn add_player(&mut self, id: Uuid, name: String, color: String) -> Result<(), ActionError> {
        if self.phase == Phase::Playing {
            return Err(PreconditionError::RoundInProgress.into());
        }
        if self.player(id).is_some() {
            return Err(PreconditionError::AlreadyInRoom.into());
        }
        if self.players.len() >= self.max_players {
            return Err(PreconditionError::RoomFull.into());
        }
        if self.players.iter().any(|p| p.color.eq_ignore_ascii_case(&color)) {
            return Err(PreconditionError::ColorTaken(color).into());
        }
        let is_host = self.players.is_empty();
        self.players.push(Player::new(id, name, color, is_host));
        Ok(())
    }

    /// Drop a player at any point of a turn. Their grid and any card they held
    /// leave play; the turn pointer keeps pointing at whoever is next.
    pub fn remove_player(&mut self, id: Uuid) -> Option<Player> {
        let idx = self.seat_of(id)?;
        let player = self.players.remove(idx);
        self.removed += player.grid.uncleared_count();
        if self.winner == Some(id) {
            self.winner = None;
        }

        if self.players.is_empty() {
            self.current = 0;
            self.turn = TurnState::Idle;
            return Some(player);
        }

        if idx < self.current {
            self.current -= 1;
        } else if idx == self.current {
            if let TurnState::Holding { card, .. } = self.turn {
                debug!("[LEAVE] dropping held card {card} of departing player");
                self.removed += 1;
            }
            self.turn = TurnState::Idle;
            self.current %= self.players.len();
        }

        if player.is_host {
            self.players[0].is_host = true;
            info!("[HOST] {} is now host", self.players[0].name);
        }

        if self.phase == Phase::Playing && self.players.len() < MIN_PLAYERS {
            warn!("[ROUND] abandoned: only {} player(s) left", self.players.len());
            self.abandon_round();
        }
        Some(player)
    }

    fn abandon_round(&mut self) {
        self.phase = Phase::Waiting;
        self.turn = TurnState::Idle;
        self.current = 0;
        self.removed = 0;
        self.draw_pile = Deck::default();
        self.discard_pile = DiscardPile::default();
        for p in self.players.iter_mut() {
            p.grid = Grid::default();
        }
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn seat_of(&self, id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn is_host(&self, id: Uuid) -> bool {
        self.player(id).map_or(false, |p| p.is_host)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn winner(&self) -> Option<&Player> {
        self.winner.and_then(|id| self.player(id))
    }

    pub fn current_player(&self) -> Option<&Player> {
        match self.phase {
            Phase::Playing => self.players.get(self.current),
            _ => None,
        }
    }

    /// Every card the round started with, wherever it is now.
    pub fn card_count(&self) -> usize {
        let held = matches!(self.turn, TurnState::Holding { .. }) as usize;
        let on_grids: usize = self.players.iter().map(|p| p.grid.uncleared_count()).sum();
        self.draw_pile.len() + self.discard_pile.len() + held + on_grids + self.removed
    }

    /* ---------------- round lifecycle ---------------- */

    pub fn start_new_round(&mut self) -> Result<(), ActionError> {
        let deck = Deck::shuffled_with(&mut self.rng);
        self.start_round_with_deck(deck)
    }

    /// Deal from `deck` as given. Every player gets twelve cards and flips two;
    /// the next card starts the discard pile and the rest is the draw pile.
    pub fn start_round_with_deck(&mut self, mut deck: Deck) -> Result<(), ActionError> {
        match self.phase {
            Phase::Waiting | Phase::RoundEnd => {}
            Phase::Playing => return Err(PreconditionError::RoundInProgress.into()),
            Phase::GameEnd => return Err(PreconditionError::GameOver.into()),
        }
        let n = self.players.len();
        if n < MIN_PLAYERS {
            return Err(PreconditionError::NotEnoughPlayers.into());
        }
        if n > self.max_players {
            return Err(PreconditionError::RoomFull.into());
        }
        if deck.len() < n * GRID_SLOTS + 1 {
            return Err(ActionError::Internal);
        }

        for p in self.players.iter_mut() {
            p.grid = Grid::deal(&mut deck).ok_or(ActionError::Internal)?;
            p.grid.reveal_initial_with(INITIAL_REVEALS, &mut self.rng);
        }
        self.discard_pile = DiscardPile::default();
        if let Some(top) = deck.draw() {
            self.discard_pile.discard(top);
        }
        self.draw_pile = deck;
        self.removed = 0;
        self.turn = TurnState::Idle;
        self.winner = None;

        let sums: Vec<i32> = self.players.iter().map(|p| p.grid.revealed_sum()).collect();
        self.current = starting_player(&sums);
        self.phase = Phase::Playing;

        info!(
            "[DEAL] round={} players={} starter={} draw={} discard_top={:?}",
            self.round_number,
            n,
            self.players[self.current].name,
            self.draw_pile.len(),
            self.discard_pile.peek_top().map(Card::value)
        );
        Ok(())
    }

    fn end_round(&mut self) -> RoundSummary {
        self.phase = Phase::RoundEnd;
        self.turn = TurnState::Idle;
        for p in self.players.iter_mut() {
            p.grid.reveal_all();
            p.score = p.grid.score();
            p.total_score += p.score;
        }
        let finished = self.round_number;

        if self.players.iter().any(|p| p.total_score >= GAME_END_SCORE) {
            self.phase = Phase::GameEnd;
            let totals: Vec<i32> = self.players.iter().map(|p| p.total_score).collect();
            self.winner = lowest_total(&totals).map(|i| self.players[i].id);
            info!(
                "[GAME_END] after round {} winner={:?}",
                finished,
                self.winner().map(|p| p.name.as_str())
            );
        } else {
            self.round_number += 1;
            info!("[ROUND_END] round {} scored", finished);
        }

        RoundSummary {
            round_number: finished,
            scores: self.players.iter().map(|p| (p.id, p.score)).collect(),
            totals: self.players.iter().map(|p| (p.id, p.total_score)).collect(),
            winner: self.winner,
        }
    }

    /* ---------------- turn actions ---------------- */

    /// Seat of `id` if it is that player's move in a round being played.
    fn require_current(&self, id: Uuid) -> Result<usize, ActionError> {
        if self.phase != Phase::Playing {
            return Err(TurnError::NotPlaying.into());
        }
        let seat = self.seat_of(id).ok_or(NotFoundError::Player)?;
        if seat != self.current {
            return Err(TurnError::NotYourTurn.into());
        }
        Ok(seat)
    }

    fn require_idle(&self) -> Result<(), ActionError> {
        match self.turn {
            TurnState::Idle => Ok(()),
            TurnState::Holding { .. } => Err(TurnError::AlreadyHolding.into()),
        }
    }

    pub fn draw_card(&mut self, id: Uuid) -> Result<Card, ActionError> {
        self.require_current(id)?;
        self.require_idle()?;

        if self.draw_pile.is_empty() {
            let recycled = self.discard_pile.take_all_but_top();
            debug!("[DRAW] draw pile empty, reshuffling {} discards", recycled.len());
            self.draw_pile.refill_with(recycled, &mut self.rng);
        }
        let card = self.draw_pile.draw().ok_or(TurnError::EmptyPile)?;
        self.turn = TurnState::Holding { card, source: CardSource::DrawPile };
        Ok(card)
    }

    pub fn take_discard(&mut self, id: Uuid) -> Result<Card, ActionError> {
        self.require_current(id)?;
        self.require_idle()?;

        let card = self.discard_pile.take_top().ok_or(TurnError::EmptyPile)?;
        self.turn = TurnState::Holding { card, source: CardSource::DiscardPile };
        Ok(card)
    }

    pub fn place_card(&mut self, id: Uuid, position: usize) -> Result<TurnOutcome, ActionError> {
        let seat = self.require_current(id)?;
        let TurnState::Holding { card, .. } = self.turn else {
            return Err(TurnError::NothingHeld.into());
        };

        let grid = &mut self.players[seat].grid;
        let dislodged = grid.place(position, card)?;
        self.removed += grid.check_column_clear().len();
        self.discard_pile.discard(dislodged);
        self.turn = TurnState::Idle;
        debug!("[PLACE] seat={} pos={} card={} out={}", seat, position, card, dislodged);
        Ok(self.finish_turn(seat))
    }

    pub fn discard_and_reveal(&mut self, id: Uuid, position: usize) -> Result<TurnOutcome, ActionError> {
        let seat = self.require_current(id)?;
        let card = match self.turn {
            TurnState::Holding { card, source: CardSource::DrawPile } => card,
            TurnState::Holding { source: CardSource::DiscardPile, .. } => {
                return Err(TurnError::MustPlaceDiscard.into())
            }
            TurnState::Idle => return Err(TurnError::NothingHeld.into()),
        };

        let grid = &mut self.players[seat].grid;
        grid.try_reveal(position)?;
        self.removed += grid.check_column_clear().len();
        self.discard_pile.discard(card);
        self.turn = TurnState::Idle;
        debug!("[REVEAL] seat={} pos={} discarded={}", seat, position, card);
        Ok(self.finish_turn(seat))
    }

    fn finish_turn(&mut self, seat: usize) -> TurnOutcome {
        if self.players[seat].grid.is_complete() {
            return TurnOutcome::RoundOver(self.end_round());
        }
        self.current = (self.current + 1) % self.players.len();
        TurnOutcome::NextTurn(self.players[self.current].id)
    }

    /* ---------------- snapshot ---------------- */

    pub fn snapshot(&self, room: &str, has_password: bool) -> PublicRoom {
        PublicRoom {
            room: room.to_string(),
            max_players: self.max_players,
            has_password,
            players: self
                .players
                .iter()
                .map(|p| PublicPlayer {
                    id: p.id,
                    name: p.name.clone(),
                    color: p.color.clone(),
                    grid: public_grid(&p.grid),
                    score: p.score,
                    total_score: p.total_score,
                    is_host: p.is_host,
                })
                .collect(),
            current_player_id: self.current_player().map(|p| p.id),
            round_number: self.round_number,
            phase: self.phase,
            draw_pile_count: self.draw_pile.len(),
            discard_top: self.discard_pile.peek_top(),
            held: match self.turn {
                TurnState::Idle => None,
                TurnState::Holding { card, source } => Some(PublicHeld {
                    source,
                    card: (source == CardSource::DiscardPile).then_some(card),
                }),
            },
            winner_id: self.winner,
        }
    }
}

/// Index of the highest sum; the earliest wins a tie.
pub fn starting_player(revealed_sums: &[i32]) -> usize {
    let mut best = 0;
    for (i, &sum) in revealed_sums.iter().enumerate() {
        if sum > revealed_sums[best] {
            best = i;
        }
    }
    best
}

/// Index of the lowest total; the earliest wins a tie.
pub fn lowest_total(totals: &[i32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &t) in totals.iter().enumerate() {
        if best.map_or(true, |b| t < totals[b]) {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(v: i8) -> Card {
        Card::new(v).unwrap()
    }

    fn engine_with(n: usize) -> (Engine, Vec<Uuid>) {
        let mut e = Engine::with_seed(8, 11);
        let ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            e.add_player(*id, format!("P{i}"), format!("color{i}")).unwrap();
        }
        (e, ids)
    }

    #[test]
    fn starting_player_is_first_highest_sum() {
        assert_eq!(starting_player(&[5, 5, 3]), 0);
        assert_eq!(starting_player(&[1, 9, 9]), 1);
        assert_eq!(starting_player(&[-4, -2]), 1);
    }

    #[test]
    fn winner_is_first_lowest_total() {
        assert_eq!(lowest_total(&[105, 98, 110]), Some(1));
        assert_eq!(lowest_total(&[40, 40]), Some(0));
        assert_eq!(lowest_total(&[]), None);
    }

    #[test]
    fn first_player_added_is_host_and_colors_are_unique() {
        let (mut e, ids) = engine_with(2);
        assert!(e.is_host(ids[0]));
        assert!(!e.is_host(ids[1]));
        let err = e.add_player(Uuid::new_v4(), "X".into(), "COLOR1".into()).unwrap_err();
        assert_eq!(err, PreconditionError::ColorTaken("COLOR1".into()).into());
    }

    #[test]
    fn start_requires_two_players() {
        let (mut e, _) = engine_with(1);
        assert_eq!(
            e.start_new_round(),
            Err(PreconditionError::NotEnoughPlayers.into())
        );
        assert_eq!(e.phase(), Phase::Waiting);
    }

    #[test]
    fn deal_sets_up_piles_and_conserves_cards() {
        let (mut e, _) = engine_with(3);
        e.start_new_round().unwrap();
        assert_eq!(e.phase(), Phase::Playing);
        assert_eq!(e.discard_pile.len(), 1);
        assert_eq!(e.draw_pile.len(), DECK_SIZE - 3 * GRID_SLOTS - 1);
        for p in e.players() {
            assert_eq!(p.grid.face_down_positions().len(), GRID_SLOTS - INITIAL_REVEALS);
        }
        assert_eq!(e.card_count(), DECK_SIZE);
        let sums: Vec<i32> = e.players().iter().map(|p| p.grid.revealed_sum()).collect();
        assert_eq!(e.current, starting_player(&sums));
    }

    #[test]
    fn held_card_is_scoped_to_one_turn() {
        let (mut e, ids) = engine_with(2);
        e.start_new_round().unwrap();
        let me = e.players[e.current].id;
        let other = *ids.iter().find(|&&id| id != me).unwrap();

        e.draw_card(me).unwrap();
        assert_eq!(e.card_count(), DECK_SIZE);
        assert_eq!(e.draw_card(me), Err(TurnError::AlreadyHolding.into()));
        assert_eq!(e.take_discard(me), Err(TurnError::AlreadyHolding.into()));

        let pos = e.players[e.current].grid.face_down_positions()[0];
        let outcome = e.discard_and_reveal(me, pos).unwrap();
        assert_eq!(outcome, TurnOutcome::NextTurn(other));
        assert_eq!(e.turn(), TurnState::Idle);
        assert_eq!(e.card_count(), DECK_SIZE);
    }

    #[test]
    fn discard_taken_card_cannot_be_thrown_back() {
        let (mut e, _) = engine_with(2);
        e.start_new_round().unwrap();
        let me = e.players[e.current].id;
        let top = e.discard_pile.peek_top().unwrap();
        assert_eq!(e.take_discard(me), Ok(top));
        let pos = e.players[e.current].grid.face_down_positions()[0];
        assert_eq!(
            e.discard_and_reveal(me, pos),
            Err(TurnError::MustPlaceDiscard.into())
        );
        e.place_card(me, pos).unwrap();
        assert_eq!(e.card_count(), DECK_SIZE);
    }

    #[test]
    fn empty_draw_pile_recycles_discards_under_the_top() {
        let (mut e, _) = engine_with(2);
        e.start_new_round().unwrap();
        let mut rest = std::mem::take(&mut e.draw_pile.cards);
        let top = e.discard_pile.take_top().unwrap();
        e.discard_pile.cards.append(&mut rest);
        e.discard_pile.discard(top);

        let me = e.players[e.current].id;
        e.draw_card(me).unwrap();
        assert_eq!(e.discard_pile.len(), 1);
        assert_eq!(e.discard_pile.peek_top(), Some(top));
        assert_eq!(e.card_count(), DECK_SIZE);
    }

    #[test]
    fn draw_fails_cleanly_when_nothing_is_left() {
        let (mut e, _) = engine_with(2);
        e.start_new_round().unwrap();
        e.draw_pile.cards.clear();
        let me = e.players[e.current].id;
        assert_eq!(e.draw_card(me), Err(TurnError::EmptyPile.into()));
        assert_eq!(e.turn(), TurnState::Idle);
    }

    #[test]
    fn removing_current_player_mid_turn_passes_the_turn() {
        let (mut e, ids) = engine_with(3);
        e.start_new_round().unwrap();
        e.current = 2;
        e.draw_card(ids[2]).unwrap();
        e.remove_player(ids[2]).unwrap();
        assert_eq!(e.current, 0);
        assert_eq!(e.turn(), TurnState::Idle);
        assert_eq!(e.card_count(), DECK_SIZE);
        assert_eq!(e.current_player().map(|p| p.id), Some(ids[0]));
    }

    #[test]
    fn removing_earlier_player_keeps_turn_with_same_player() {
        let (mut e, ids) = engine_with(3);
        e.start_new_round().unwrap();
        e.current = 2;
        e.remove_player(ids[0]).unwrap();
        assert_eq!(e.current_player().map(|p| p.id), Some(ids[2]));
        assert!(e.is_host(ids[1]));
    }

    #[test]
    fn round_is_abandoned_when_one_player_remains() {
        let (mut e, ids) = engine_with(2);
        e.start_new_round().unwrap();
        e.remove_player(ids[1]).unwrap();
        assert_eq!(e.phase(), Phase::Waiting);
        assert!(e.current_player().is_none());
        assert_eq!(e.players[0].grid.uncleared_count(), 0);
        assert!(e.remove_player(ids[0]).is_some());
        assert!(e.players().is_empty());
    }

    #[test]
    fn snapshot_hides_drawn_card_but_shows_taken_discard() {
        let (mut e, _) = engine_with(2);
        e.start_new_round().unwrap();
        let me = e.players[e.current].id;
        e.draw_card(me).unwrap();
        let held = e.snapshot("123456", false).held.unwrap();
        assert_eq!(held, PublicHeld { source: CardSource::DrawPile, card: None });

        e.turn = TurnState::Holding { card: card(4), source: CardSource::DiscardPile };
        let held = e.snapshot("123456", false).held.unwrap();
        assert_eq!(held.card, Some(card(4)));
    }
}
