//! Default chart provider: the traditional chaibu (拆補) method
//!
//! Computes the four sexagenary pillars, picks yin or yang dun from the
//! solar term, derives the ju number from the term's decan, and flies the
//! nine stars and eight gates around the palaces. Solar-term boundaries
//! use fixed average dates rather than an ephemeris, so results can be
//! off by a day right at a term boundary; away from boundaries they match
//! the canonical tables. 1,080 distinct boards exist and each recurs four
//! times a year, which is exactly what the fixed tables reproduce.

use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use chrono_tz::Tz;

use super::{BoardType, Chart, ChartProvider, Palace, Pillar, EIGHT_GATES, NINE_STARS};
use crate::error::Result;

/// Approximate start (month, day) of each of the 24 solar terms,
/// beginning with Minor Cold (小寒)
const TERM_BOUNDARIES: [(u32, u32); 24] = [
    (1, 6),   // 小寒 Minor Cold
    (1, 20),  // 大寒 Major Cold
    (2, 4),   // 立春 Start of Spring
    (2, 19),  // 雨水 Rain Water
    (3, 6),   // 驚蟄 Awakening of Insects
    (3, 21),  // 春分 Spring Equinox
    (4, 5),   // 清明 Clear and Bright
    (4, 20),  // 谷雨 Grain Rain
    (5, 5),   // 立夏 Start of Summer
    (5, 21),  // 小满 Grain Full
    (6, 6),   // 芒种 Grain in Ear
    (6, 21),  // 夏至 Summer Solstice
    (7, 7),   // 小暑 Minor Heat
    (7, 22),  // 大暑 Major Heat
    (8, 7),   // 立秋 Start of Autumn
    (8, 23),  // 处暑 Limit of Heat
    (9, 7),   // 白露 White Dew
    (9, 23),  // 秋分 Autumn Equinox
    (10, 8),  // 寒露 Cold Dew
    (10, 23), // 霜降 Frost's Descent
    (11, 7),  // 立冬 Start of Winter
    (11, 22), // 小雪 Minor Snow
    (12, 7),  // 大雪 Major Snow
    (12, 22), // 冬至 Winter Solstice
];

/// Ju numbers per decan for the yin-dun terms (夏至 through 大雪)
const YIN_JU: [(usize, [i64; 3]); 12] = [
    (11, [9, 3, 6]),
    (12, [8, 2, 5]),
    (13, [7, 1, 4]),
    (14, [2, 5, 8]),
    (15, [1, 4, 7]),
    (16, [9, 3, 6]),
    (17, [7, 1, 4]),
    (18, [6, 9, 3]),
    (19, [5, 8, 2]),
    (20, [6, 9, 3]),
    (21, [5, 8, 2]),
    (22, [4, 7, 1]),
];

/// Ju numbers per decan for the yang-dun terms (冬至 through 芒种)
const YANG_JU: [(usize, [i64; 3]); 12] = [
    (23, [1, 7, 4]),
    (0, [2, 8, 5]),
    (1, [3, 9, 6]),
    (2, [8, 5, 2]),
    (3, [9, 6, 3]),
    (4, [1, 7, 4]),
    (5, [3, 9, 6]),
    (6, [4, 1, 7]),
    (7, [5, 2, 8]),
    (8, [4, 1, 7]),
    (9, [5, 2, 8]),
    (10, [6, 3, 9]),
];

/// Integer Julian day number for a civil date (start of day)
fn julian_day(year: i64, month: i64, day: i64) -> i64 {
    let (y, m) = if month <= 2 {
        (year - 1, month + 12)
    } else {
        (year, month)
    };
    let a = y.div_euclid(100);
    let b = 2 - a + a.div_euclid(4);
    (365.25 * (y + 4716) as f64) as i64 + (30.6001 * (m + 1) as f64) as i64 + day + b - 1524
}

/// Day pillar: stem (JDN + 9) mod 10, branch (JDN + 1) mod 12
fn day_pillar(at: DateTime<Tz>) -> Pillar {
    let jd = julian_day(at.year() as i64, at.month() as i64, at.day() as i64);
    Pillar {
        stem: (jd + 9).rem_euclid(10) as u8,
        branch: (jd + 1).rem_euclid(12) as u8,
    }
}

/// Hour pillar: each two-hour period is one branch, with 子 covering
/// 23:00-00:59; the stem follows the five-rats rule from the day stem.
fn hour_pillar(at: DateTime<Tz>, day_stem: u8) -> Pillar {
    let branch = ((at.hour() as i64 + 1) / 2).rem_euclid(12);
    let stem = (day_stem as i64 * 2 + branch).rem_euclid(10);
    Pillar {
        stem: stem as u8,
        branch: branch as u8,
    }
}

/// Which of the 24 solar terms (month, day) falls into. Dates before
/// Minor Cold belong to the previous year's Winter Solstice period.
fn solar_term_index(month: u32, day: u32) -> usize {
    for (i, &(m, d)) in TERM_BOUNDARIES.iter().enumerate() {
        if (month, day) < (m, d) {
            return if i > 0 { i - 1 } else { TERM_BOUNDARIES.len() - 1 };
        }
    }
    TERM_BOUNDARIES.len() - 1
}

/// Year and month pillars. The year pillar rolls over at Li Chun (立春);
/// the month stem comes from the five-tigers table keyed by the year stem.
fn year_month_pillars(at: DateTime<Tz>, term_idx: usize) -> (Pillar, Pillar) {
    let (li_chun_month, li_chun_day) = (2u32, 4u32);
    let year_for_pillar = if (at.month(), at.day()) < (li_chun_month, li_chun_day) {
        at.year() as i64 - 1
    } else {
        at.year() as i64
    };

    let stem_year = (year_for_pillar - 4).rem_euclid(10);
    let branch_year = (year_for_pillar - 4).rem_euclid(12);

    // Floor division: terms 0 and 1 (深冬) still map back to month 11
    let month_index = (term_idx as i64 - 2).div_euclid(2).rem_euclid(12);

    let start_stem = match stem_year {
        0 | 5 => 2,
        1 | 6 => 4,
        2 | 7 => 6,
        3 | 8 => 8,
        _ => 0, // 4 | 9
    };

    (
        Pillar {
            stem: stem_year as u8,
            branch: branch_year as u8,
        },
        Pillar {
            stem: (start_stem + month_index).rem_euclid(10) as u8,
            branch: (month_index + 2).rem_euclid(12) as u8,
        },
    )
}

/// Dun type and ju number for the instant.
///
/// Yin dun runs from the summer solstice up to the winter solstice; the
/// ju comes from the traditional poems keyed by term and ten-day decan.
fn board_and_ju(at: DateTime<Tz>, term_idx: usize) -> (BoardType, u8) {
    let board = if (11..23).contains(&term_idx) {
        BoardType::Yin
    } else {
        BoardType::Yang
    };

    let date = at.date_naive();
    let (term_month, term_day) = TERM_BOUNDARIES[term_idx];
    let mut term_start =
        NaiveDate::from_ymd_opt(at.year(), term_month, term_day).unwrap_or(date);
    let mut diff_days = (date - term_start).num_days();
    if diff_days < 0 {
        let (prev_month, prev_day) =
            TERM_BOUNDARIES[(term_idx + TERM_BOUNDARIES.len() - 1) % TERM_BOUNDARIES.len()];
        term_start =
            NaiveDate::from_ymd_opt(at.year() - 1, prev_month, prev_day).unwrap_or(date);
        diff_days = (date - term_start).num_days();
    }

    let decan = if diff_days < 10 {
        0
    } else if diff_days < 20 {
        1
    } else {
        2
    };

    let table = match board {
        BoardType::Yin => &YIN_JU,
        BoardType::Yang => &YANG_JU,
    };
    let ju = table
        .iter()
        .find(|(idx, _)| *idx == term_idx)
        .map(|(_, jus)| jus[decan])
        .unwrap_or(match board {
            BoardType::Yin => [1, 4, 7][decan],
            BoardType::Yang => [1, 7, 4][decan],
        });

    (board, ju as u8)
}

/// Fly the nine stars around the palaces, forward on yang boards and
/// backward on yin, starting from the ju palace. Returns palace -> star.
fn fly_stars(board: BoardType, ju: u8) -> [&'static str; 9] {
    let mut map = [""; 9];
    let start = ju as i64 - 1;
    for (i, star) in NINE_STARS.iter().enumerate() {
        let pos = match board {
            BoardType::Yang => (start + i as i64).rem_euclid(9),
            BoardType::Yin => (start - i as i64).rem_euclid(9),
        };
        map[pos as usize] = star;
    }
    map
}

/// Fly the eight gates through the palaces in the same direction,
/// skipping the center palace. Returns palace -> gate (palace 5 empty).
fn fly_gates(board: BoardType, ju: u8) -> [Option<&'static str>; 9] {
    let mut map = [None; 9];
    let start = ju as i64 - 1;

    let mut order = Vec::with_capacity(EIGHT_GATES.len());
    for i in 0..9 {
        let pos = match board {
            BoardType::Yang => (start + i).rem_euclid(9),
            BoardType::Yin => (start - i).rem_euclid(9),
        };
        let palace = pos + 1;
        if palace == 5 {
            continue;
        }
        order.push(pos as usize);
        if order.len() == EIGHT_GATES.len() {
            break;
        }
    }

    for (pos, gate) in order.into_iter().zip(EIGHT_GATES.iter()) {
        map[pos] = Some(*gate);
    }
    map
}

/// The default provider. Stateless; a single instance can serve every
/// request.
#[derive(Debug, Clone, Copy, Default)]
pub struct QimenChartProvider;

impl ChartProvider for QimenChartProvider {
    fn generate(&self, at: DateTime<Tz>) -> Result<Chart> {
        let term_idx = solar_term_index(at.month(), at.day());
        let (year_pillar, month_pillar) = year_month_pillars(at, term_idx);
        let day_pillar = day_pillar(at);
        let hour_pillar = hour_pillar(at, day_pillar.stem);
        let (board, ju) = board_and_ju(at, term_idx);

        let stars = fly_stars(board, ju);
        let gates = fly_gates(board, ju);

        let palaces = (0..9)
            .map(|i| Palace {
                position: i as u8 + 1,
                star: stars[i].to_string(),
                gate: gates[i].map(|g| g.to_string()),
            })
            .collect();

        Ok(Chart {
            year_pillar,
            month_pillar,
            day_pillar,
            hour_pillar,
            board,
            solar_term: term_idx as u8,
            ju,
            palaces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Los_Angeles.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn same_timestamp_same_chart() {
        let provider = QimenChartProvider;
        let t = at(2024, 3, 15, 14, 45);
        assert_eq!(
            provider.generate(t).unwrap(),
            provider.generate(t).unwrap()
        );
    }

    #[test]
    fn charts_vary_across_the_year() {
        let provider = QimenChartProvider;
        let winter = provider.generate(at(2024, 1, 10, 9, 0)).unwrap();
        let summer = provider.generate(at(2024, 7, 10, 9, 0)).unwrap();
        assert_ne!(winter, summer);
        assert_eq!(winter.board, BoardType::Yang);
        assert_eq!(summer.board, BoardType::Yin);
    }

    #[test]
    fn millennium_pillars_match_reference() {
        // 2000-01-01 was a 戊午 day in a 己卯 year (pre-Li-Chun).
        let chart = QimenChartProvider.generate(at(2000, 1, 1, 10, 30)).unwrap();
        assert_eq!(chart.day_pillar.name(), "戊午");
        assert_eq!(chart.year_pillar.name(), "己卯");
        assert_eq!(chart.month_pillar.name(), "丙子");
        // 10:30 falls in the 巳 double-hour; 戊 day gives a 丁巳 hour.
        assert_eq!(chart.hour_pillar.name(), "丁巳");
        assert_eq!(chart.solar_term, 23);
        assert_eq!(chart.board, BoardType::Yang);
        assert_eq!(chart.ju, 4);
    }

    #[test]
    fn julian_day_epoch() {
        // Standard test vector: 2000-01-01 is JDN 2451545
        assert_eq!(julian_day(2000, 1, 1), 2451545);
    }

    #[test]
    fn hour_branch_boundaries() {
        // 23:00 wraps into the next day's 子 branch slot
        let d = day_pillar(at(2024, 5, 1, 23, 30));
        let p = hour_pillar(at(2024, 5, 1, 23, 30), d.stem);
        assert_eq!(p.branch, 0);

        let p = hour_pillar(at(2024, 5, 1, 1, 0), d.stem);
        assert_eq!(p.branch, 1, "01:00 belongs to 丑");
    }

    #[test]
    fn nine_stars_cover_all_palaces() {
        let chart = QimenChartProvider.generate(at(2024, 9, 9, 9, 9)).unwrap();
        assert_eq!(chart.palaces.len(), 9);
        for (i, palace) in chart.palaces.iter().enumerate() {
            assert_eq!(palace.position, i as u8 + 1);
            assert!(!palace.star.is_empty());
        }
        let with_gates = chart.palaces.iter().filter(|p| p.gate.is_some()).count();
        assert_eq!(with_gates, 8);
        assert!(chart.palaces[4].gate.is_none(), "center palace has no gate");
    }

    #[test]
    fn pre_minor_cold_belongs_to_winter_solstice() {
        let chart = QimenChartProvider.generate(at(2024, 1, 3, 12, 0)).unwrap();
        assert_eq!(chart.solar_term, 23);
    }
}
