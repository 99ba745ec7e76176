//! Outcome sampling
//!
//! Every synthetic session is steered by one outcome label drawn up front:
//! 70% positive, 20% neutral, 10% negative. The label decides the tone of
//! every generated section and the band the closing rating must fall in.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// How the participation went for the synthetic beneficiary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Positive,
    Neutral,
    Negative,
}

/// Draw an outcome label: 1-70 positive, 71-90 neutral, 91-100 negative.
pub fn sample_outcome<R: Rng>(rng: &mut R) -> OutcomeType {
    let draw: u8 = rng.gen_range(1..=100);
    let outcome = OutcomeType::from_draw(draw);
    tracing::debug!("Selected outcome type: {} (random value: {})", outcome, draw);
    outcome
}

impl OutcomeType {
    pub const ALL: [OutcomeType; 3] = [
        OutcomeType::Positive,
        OutcomeType::Neutral,
        OutcomeType::Negative,
    ];

    /// Map a draw in [1, 100] onto the 70/20/10 distribution
    pub fn from_draw(draw: u8) -> Self {
        match draw {
            0..=70 => OutcomeType::Positive,
            71..=90 => OutcomeType::Neutral,
            _ => OutcomeType::Negative,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Positive => "positive",
            OutcomeType::Neutral => "neutral",
            OutcomeType::Negative => "negative",
        }
    }

    /// Ratings a review with this outcome may carry
    pub fn rating_band(&self) -> RangeInclusive<u8> {
        match self {
            OutcomeType::Positive => 4..=5,
            OutcomeType::Neutral => 3..=3,
            OutcomeType::Negative => 1..=2,
        }
    }

    pub fn accepts_rating(&self, rating: i64) -> bool {
        u8::try_from(rating)
            .map(|r| self.rating_band().contains(&r))
            .unwrap_or(false)
    }

    pub fn sample_rating<R: Rng>(&self, rng: &mut R) -> u8 {
        rng.gen_range(self.rating_band())
    }

    /// "between 4 and 5", "exactly 3", ...
    pub fn rating_instruction(&self) -> String {
        let band = self.rating_band();
        if band.start() == band.end() {
            format!("exactly {}", band.start())
        } else {
            format!("between {} and {}", band.start(), band.end())
        }
    }

    pub fn reflection_tone(&self) -> &'static str {
        match self {
            OutcomeType::Positive => "positive, showing growth and improvement",
            OutcomeType::Neutral => "mixed, showing some improvement but also ongoing challenges",
            OutcomeType::Negative => "negative, showing minimal improvement and continued struggles",
        }
    }

    pub fn survey_tone(&self) -> &'static str {
        match self {
            OutcomeType::Positive => "very positive, showing significant improvement",
            OutcomeType::Neutral => "neutral, showing some improvement but also ongoing challenges",
            OutcomeType::Negative => "negative, showing minimal improvement and continued struggles",
        }
    }
}

impl fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score review text by sentiment keywords, strongest signal first.
///
/// Returns `None` when no keyword is present.
pub fn keyword_rating(text: &str) -> Option<u8> {
    const TIERS: [(u8, &[&str]); 5] = [
        (5, &["excellent", "amazing", "outstanding", "wonderful"]),
        (4, &["good", "helpful", "positive", "recommend"]),
        (3, &["okay", "average", "neutral", "mixed"]),
        (2, &["disappointing", "mediocre", "lacking"]),
        (1, &["terrible", "awful", "waste", "poor"]),
    ];

    let text = text.to_lowercase();
    TIERS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(score, _)| *score)
}

/// Per-outcome counts over a batch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeTally {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: OutcomeType) {
        match outcome {
            OutcomeType::Positive => self.positive += 1,
            OutcomeType::Neutral => self.neutral += 1,
            OutcomeType::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.positive + self.neutral + self.negative
    }

    /// Share of each outcome in (positive, neutral, negative) order
    pub fn shares(&self) -> (f64, f64, f64) {
        let total = self.total().max(1) as f64;
        (
            self.positive as f64 / total,
            self.neutral as f64 / total,
            self.negative as f64 / total,
        )
    }
}
