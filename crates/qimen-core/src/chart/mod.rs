//! Chart generation abstraction
//!
//! A chart is pure data derived from a timestamp: same instant in, same
//! chart out, byte for byte. Providers are stateless and thread-safe by
//! construction, so they can sit behind an `Arc<dyn ChartProvider>` with
//! no locking.
//!
//! Callers must not depend on chart internals beyond "a value the prompt
//! assembler can render" - that substitutability is the point of the
//! trait. `QimenChartProvider` is the default; `FixedChartProvider` is a
//! placeholder for tests and development.

mod qimen;

pub use qimen::QimenChartProvider;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::Result;

/// The ten heavenly stems (天干)
pub const HEAVENLY_STEMS: [&str; 10] =
    ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];

/// The twelve earthly branches (地支)
pub const EARTHLY_BRANCHES: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];

/// The nine stars (天盤) in flying order
pub const NINE_STARS: [&str; 9] = [
    "天蓬", "天芮", "天冲", "天辅", "天禽", "天心", "天柱", "天任", "天英",
];

/// The eight gates (地盤) in flying order
pub const EIGHT_GATES: [&str; 8] = ["休", "生", "伤", "杜", "景", "死", "惊", "开"];

/// One sexagenary pillar: indices into the stem and branch tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pillar {
    pub stem: u8,
    pub branch: u8,
}

impl Pillar {
    pub fn name(&self) -> String {
        format!(
            "{}{}",
            HEAVENLY_STEMS[self.stem as usize % 10],
            EARTHLY_BRANCHES[self.branch as usize % 12]
        )
    }
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Yang dun flies forward through the palaces, yin dun backward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    Yang,
    Yin,
}

impl BoardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardType::Yang => "yang",
            BoardType::Yin => "yin",
        }
    }
}

/// One of the nine palaces. The center palace (5) receives no gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palace {
    /// Lo Shu position, 1..=9
    pub position: u8,
    pub star: String,
    pub gate: Option<String>,
}

/// A complete board state for one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chart {
    pub year_pillar: Pillar,
    pub month_pillar: Pillar,
    pub day_pillar: Pillar,
    pub hour_pillar: Pillar,
    pub board: BoardType,
    /// Index into the 24 solar terms, starting from Minor Cold
    pub solar_term: u8,
    /// Ju number, 1..=9
    pub ju: u8,
    pub palaces: Vec<Palace>,
}

/// Pure function from a timestamp to a board state.
///
/// `generate` is total for the built-in providers; the `Result` leaves
/// room for future providers that reject out-of-range timestamps with
/// `ChartGeneration`.
pub trait ChartProvider: Send + Sync {
    fn generate(&self, at: DateTime<Tz>) -> Result<Chart>;
}

/// Placeholder provider: one fixed yang ju-1 board for every timestamp.
///
/// Useful in tests and anywhere the real numerology is irrelevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedChartProvider;

impl ChartProvider for FixedChartProvider {
    fn generate(&self, _at: DateTime<Tz>) -> Result<Chart> {
        let mut gates = EIGHT_GATES.iter();
        let palaces = (1u8..=9)
            .map(|position| Palace {
                position,
                star: NINE_STARS[(position - 1) as usize].to_string(),
                gate: if position == 5 {
                    None
                } else {
                    gates.next().map(|g| g.to_string())
                },
            })
            .collect();

        Ok(Chart {
            year_pillar: Pillar { stem: 0, branch: 0 },
            month_pillar: Pillar { stem: 2, branch: 2 },
            day_pillar: Pillar { stem: 4, branch: 4 },
            hour_pillar: Pillar { stem: 6, branch: 6 },
            board: BoardType::Yang,
            solar_term: 0,
            ju: 1,
            palaces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_provider_is_constant() {
        let provider = FixedChartProvider;
        let zone = chrono_tz::America::Los_Angeles;
        let a = provider
            .generate(zone.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        let b = provider
            .generate(zone.with_ymd_and_hms(2025, 7, 4, 12, 30, 0).unwrap())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.palaces.len(), 9);
        assert!(a.palaces[4].gate.is_none(), "center palace has no gate");
    }

    #[test]
    fn pillar_names_render_stem_then_branch() {
        let pillar = Pillar { stem: 4, branch: 6 };
        assert_eq!(pillar.name(), "戊午");
    }
}
