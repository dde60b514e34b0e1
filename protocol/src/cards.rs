use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest printed card value.
pub const MIN_CARD: i8 = -2;
/// Highest printed card value.
pub const MAX_CARD: i8 = 12;
/// Cards in a full deck.
pub const DECK_SIZE: usize = 150;

/// A card is nothing but its printed value; two cards of equal value are
/// interchangeable for every rule in the game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "i8", into = "i8")]
pub struct Card(i8);

impl Card {
    pub fn new(value: i8) -> Option<Card> {
        (MIN_CARD..=MAX_CARD).contains(&value).then_some(Card(value))
    }

    pub fn value(self) -> i8 {
        self.0
    }

    /// How many copies of this value a full deck holds.
    pub fn copies_in_deck(self) -> usize {
        match self.0 {
            -2 => 5,
            -1 => 10,
            0 => 15,
            _ => 10,
        }
    }
}

impl TryFrom<i8> for Card {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Card::new(value).ok_or_else(|| format!("card value {value} outside {MIN_CARD}..={MAX_CARD}"))
    }
}

impl From<Card> for i8 {
    fn from(card: Card) -> i8 {
        card.0
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}", self.0)
    }
}

/// The face-down draw pile. The top of the pile is the end of `cards`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deck {
    pub cards: Vec<Card>,
}

impl Deck {
    /// Every card of a full deck in value order, unshuffled.
    pub fn full() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for value in MIN_CARD..=MAX_CARD {
            let card = Card(value);
            cards.extend(std::iter::repeat(card).take(card.copies_in_deck()));
        }
        Deck { cards }
    }

    pub fn shuffled() -> Self {
        Self::shuffled_with(&mut thread_rng())
    }

    /// `SliceRandom::shuffle` is a Fisher-Yates pass, so every ordering is
    /// equally likely for an unbiased `rng`.
    pub fn shuffled_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::full();
        deck.cards.shuffle(rng);
        deck
    }

    /// A deck that deals `cards` in order: the first element is drawn first.
    #[cfg(test)]
    pub fn stacked(mut cards: Vec<Card>) -> Self {
        cards.reverse();
        Deck { cards }
    }

    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Put `cards` under the pile and reshuffle everything.
    pub fn refill_with<R: Rng + ?Sized>(&mut self, cards: Vec<Card>, rng: &mut R) {
        self.cards.extend(cards);
        self.cards.shuffle(rng);
    }
}

/// Face-up discard stack; the last element is the visible top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscardPile {
    pub cards: Vec<Card>,
}

impl DiscardPile {
    pub fn discard(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn peek_top(&self) -> Option<Card> {
        self.cards.last().copied()
    }

    pub fn take_top(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Remove every card except the top one, leaving the top in place.
    pub fn take_all_but_top(&mut self) -> Vec<Card> {
        match self.cards.pop() {
            Some(top) => {
                let rest = std::mem::take(&mut self.cards);
                self.cards.push(top);
                rest
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn histogram(cards: &[Card]) -> HashMap<i8, usize> {
        let mut counts = HashMap::new();
        for c in cards {
            *counts.entry(c.value()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn full_deck_has_fixed_distribution() {
        let deck = Deck::full();
        assert_eq!(deck.len(), DECK_SIZE);
        let counts = histogram(&deck.cards);
        assert_eq!(counts[&-2], 5);
        assert_eq!(counts[&-1], 10);
        assert_eq!(counts[&0], 15);
        for v in 1..=12 {
            assert_eq!(counts[&v], 10, "value {v}");
        }
    }

    #[test]
    fn shuffle_keeps_multiset_and_changes_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = Deck::shuffled_with(&mut rng);
        assert_eq!(histogram(&deck.cards), histogram(&Deck::full().cards));
        assert_ne!(deck.cards, Deck::full().cards);
    }

    #[test]
    fn shuffle_has_no_positional_bias() {
        // A -2 should sit at any given position in 5 of 150 decks: top,
        // middle and bottom each expect 1000 hits over 30000 decks.
        let mut rng = StdRng::seed_from_u64(42);
        let positions = [0, DECK_SIZE / 2, DECK_SIZE - 1];
        let mut hits = [0usize; 3];
        for _ in 0..30_000 {
            let deck = Deck::shuffled_with(&mut rng);
            for (h, &p) in hits.iter_mut().zip(&positions) {
                if deck.cards[p] == Card(MIN_CARD) {
                    *h += 1;
                }
            }
        }
        for h in hits {
            assert!((850..=1_150).contains(&h), "biased shuffle: {hits:?}");
        }
    }

    #[test]
    fn draw_empties_then_returns_none() {
        let mut deck = Deck::stacked(vec![Card(3), Card(-2)]);
        assert_eq!(deck.draw(), Some(Card(3)));
        assert_eq!(deck.draw(), Some(Card(-2)));
        assert_eq!(deck.draw(), None);
        assert!(deck.is_empty());
    }

    #[test]
    fn card_values_are_range_checked() {
        assert!(Card::new(-3).is_none());
        assert!(Card::new(13).is_none());
        assert_eq!(Card::new(12).map(Card::value), Some(12));
        assert!(serde_json::from_str::<Card>("14").is_err());
        assert_eq!(serde_json::to_string(&Card(-1)).unwrap(), "-1");
    }

    #[test]
    fn discard_pile_keeps_top_when_recycling() {
        let mut pile = DiscardPile::default();
        assert_eq!(pile.peek_top(), None);
        assert!(pile.take_all_but_top().is_empty());
        pile.discard(Card(1));
        pile.discard(Card(2));
        pile.discard(Card(9));
        let recycled = pile.take_all_but_top();
        assert_eq!(recycled, vec![Card(1), Card(2)]);
        assert_eq!(pile.peek_top(), Some(Card(9)));
        assert_eq!(pile.len(), 1);
    }
}
