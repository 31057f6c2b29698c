use crate::error::{StoreError, StoreResult};
use serde::{Serialize, Serializer};
use std::fmt;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Letter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" => Some(Letter::A),
            "B" => Some(Letter::B),
            "C" => Some(Letter::C),
            "D" => Some(Letter::D),
            "E" => Some(Letter::E),
            "F" => Some(Letter::F),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
            Letter::F => "F",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Letter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

pub fn check_score(score: i64) -> StoreResult<i64> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(StoreError::validation(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )));
    }
    Ok(score)
}

pub fn parse_letter(s: &str) -> StoreResult<Letter> {
    Letter::parse(s).ok_or_else(|| {
        StoreError::validation(format!("grade must be one of A, B, C, D, E, F, got {s:?}"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cutoff {
    pub letter: Letter,
    pub min_score: i64,
}

/// Mark → grade thresholds. A score gets the first letter whose minimum it
/// reaches; anything below the last cutoff is an F.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeScale {
    cutoffs: Vec<Cutoff>,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            cutoffs: vec![
                Cutoff { letter: Letter::A, min_score: 90 },
                Cutoff { letter: Letter::B, min_score: 80 },
                Cutoff { letter: Letter::C, min_score: 70 },
                Cutoff { letter: Letter::D, min_score: 60 },
                Cutoff { letter: Letter::E, min_score: 40 },
            ],
        }
    }
}

impl GradeScale {
    pub fn new(cutoffs: Vec<Cutoff>) -> anyhow::Result<Self> {
        if cutoffs.is_empty() {
            anyhow::bail!("grade scale needs at least one cutoff");
        }
        for c in &cutoffs {
            if c.letter == Letter::F {
                anyhow::bail!("F is the implicit floor and takes no cutoff");
            }
            if !(MIN_SCORE..=MAX_SCORE).contains(&c.min_score) {
                anyhow::bail!("cutoff for {} out of range: {}", c.letter, c.min_score);
            }
        }
        for pair in cutoffs.windows(2) {
            if pair[0].letter >= pair[1].letter || pair[0].min_score <= pair[1].min_score {
                anyhow::bail!(
                    "cutoffs must run from best letter to worst with falling scores ({} {} then {} {})",
                    pair[0].letter,
                    pair[0].min_score,
                    pair[1].letter,
                    pair[1].min_score
                );
            }
        }
        Ok(Self { cutoffs })
    }

    /// Parses `A:90,B:80,...`.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut cutoffs = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((letter, score)) = part.split_once(':') else {
                anyhow::bail!("expected LETTER:SCORE, got {part:?}");
            };
            let letter = Letter::parse(letter)
                .ok_or_else(|| anyhow::anyhow!("unknown grade letter {letter:?}"))?;
            let min_score = score
                .trim()
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("cutoff score must be an integer: {score:?}"))?;
            cutoffs.push(Cutoff { letter, min_score });
        }
        Self::new(cutoffs)
    }

    pub fn cutoffs(&self) -> &[Cutoff] {
        &self.cutoffs
    }

    pub fn letter_for(&self, score: i64) -> Letter {
        self.cutoffs
            .iter()
            .find(|c| score >= c.min_score)
            .map(|c| c.letter)
            .unwrap_or(Letter::F)
    }
}
