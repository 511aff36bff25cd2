//! Prompt assembly
//!
//! Pure functions from a chart (plus the user's question) to the text
//! sent to the model. Kept separate from the gateway so prompt changes
//! never touch transport code.

use crate::chart::Chart;

/// Render a chart and question into the divination prompt.
///
/// The prompt carries the four pillars, board type and ju, the nine
/// palaces with their gates and stars, optional analysis context, and
/// the question last.
pub fn chart_to_prompt(chart: &Chart, question: &str, context: Option<&str>) -> String {
    let mut lines = Vec::new();
    lines.push(
        "You are a Qimen Dunjia divination assistant.  Use the provided chart to guide your answer."
            .to_string(),
    );
    lines.push(format!(
        "Year pillar: {}, Month pillar: {}, Day pillar: {}, Hour pillar: {}",
        chart.year_pillar, chart.month_pillar, chart.day_pillar, chart.hour_pillar
    ));
    lines.push(format!(
        "Board type: {} dun, Ju: {}",
        match chart.board {
            crate::chart::BoardType::Yang => "Yang",
            crate::chart::BoardType::Yin => "Yin",
        },
        chart.ju
    ));
    lines.push("Palaces (position: Gate/Star):".to_string());
    for palace in &chart.palaces {
        let gate = palace.gate.as_deref().unwrap_or("—");
        lines.push(format!("  {}: {}/{}", palace.position, gate, palace.star));
    }
    if let Some(context) = context {
        lines.push("Context:".to_string());
        lines.push(context.to_string());
    }
    lines.push("Question:".to_string());
    lines.push(question.trim().to_string());
    lines.join("\n")
}

/// Prompt for a crypto outlook reading. `symbol` is upper-cased into the
/// question.
pub fn quantification_prompt(chart: &Chart, symbol: &str) -> String {
    let symbol = symbol.to_uppercase();
    let context = format!(
        "Provide a bullish or bearish forecast for {} based on current market sentiment and the Qimen chart.",
        symbol
    );
    chart_to_prompt(
        chart,
        &format!("What is the outlook for {}?", symbol),
        Some(&context),
    )
}

/// Prompt for general investment guidance from the current chart
pub fn finance_prompt(chart: &Chart) -> String {
    chart_to_prompt(
        chart,
        "What should I consider when investing today?",
        Some("Offer a summary of the current economic climate and suggest prudent investment actions."),
    )
}

/// Prompt for a personal destiny reading from a birth chart
pub fn destiny_prompt(chart: &Chart) -> String {
    chart_to_prompt(
        chart,
        "What does this chart suggest about my future?",
        Some("Provide an overview of the querent's career, romance, wealth and health prospects based on the birth chart."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartProvider, FixedChartProvider};
    use chrono::TimeZone;

    fn fixed_chart() -> Chart {
        let zone = chrono_tz::America::Los_Angeles;
        FixedChartProvider
            .generate(zone.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap()
    }

    #[test]
    fn question_comes_last() {
        let prompt = chart_to_prompt(&fixed_chart(), "  Will the deal close?  ", None);
        assert!(prompt.ends_with("Question:\nWill the deal close?"));
        assert!(prompt.starts_with("You are a Qimen Dunjia divination assistant."));
    }

    #[test]
    fn center_palace_renders_a_dash_for_its_gate() {
        let prompt = chart_to_prompt(&fixed_chart(), "q", None);
        assert!(prompt.contains("  5: —/"));
    }

    #[test]
    fn context_slots_between_palaces_and_question() {
        let prompt = chart_to_prompt(&fixed_chart(), "q", Some("Extra background."));
        let ctx = prompt.find("Context:\nExtra background.").unwrap();
        let q = prompt.find("Question:").unwrap();
        assert!(ctx < q);
    }

    #[test]
    fn quantification_uppercases_the_symbol() {
        let prompt = quantification_prompt(&fixed_chart(), "btc");
        assert!(prompt.contains("What is the outlook for BTC?"));
        assert!(prompt.contains("bullish or bearish forecast for BTC"));
    }

    #[test]
    fn all_pillars_appear() {
        let chart = fixed_chart();
        let prompt = finance_prompt(&chart);
        for pillar in [
            &chart.year_pillar,
            &chart.month_pillar,
            &chart.day_pillar,
            &chart.hour_pillar,
        ] {
            assert!(prompt.contains(&pillar.name()));
        }
    }
}
