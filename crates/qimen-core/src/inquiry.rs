//! Inquiry pipeline: reserve, chart, ask, settle
//!
//! The one place the ledger, the chart provider and the LLM gateway are
//! sequenced together. Points are reserved before any work happens;
//! the reservation commits only after the model answers, and every
//! failure in between releases it. A crash mid-flight leaves an open
//! reservation row for the expiry sweep, so no charge is ever stranded
//! past the ttl.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::chart::{Chart, ChartProvider};
use crate::error::Result;
use crate::ledger::PointsLedger;
use crate::llm::{LlmBackend, LlmClient};
use crate::prompts;

/// A settled inquiry: the model's answer and the balance after the charge
#[derive(Debug, Clone)]
pub struct InquiryOutcome {
    pub answer: String,
    pub points_remaining: i64,
}

/// Drives a metered inquiry end to end. Cheap to clone; clones share the
/// chart provider and the gateway.
#[derive(Clone)]
pub struct InquiryPipeline {
    ledger: PointsLedger,
    charts: Arc<dyn ChartProvider>,
    llm: LlmClient,
}

impl InquiryPipeline {
    pub fn new(ledger: PointsLedger, charts: Arc<dyn ChartProvider>, llm: LlmClient) -> Self {
        Self {
            ledger,
            charts,
            llm,
        }
    }

    pub fn ledger(&self) -> &PointsLedger {
        &self.ledger
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    /// Run a plain divination inquiry: chart for the current instant,
    /// the user's question verbatim.
    pub async fn run(&self, user_id: &str, cost: i64, question: &str) -> Result<InquiryOutcome> {
        let at = self.ledger.now();
        self.run_at(user_id, cost, at, |chart| {
            prompts::chart_to_prompt(chart, question, None)
        })
        .await
    }

    /// Run a metered inquiry against the chart for `at`, with a custom
    /// prompt builder.
    ///
    /// Charge sequencing: reserve first, commit after the answer arrives,
    /// release on any failure in between. The reservation row is the only
    /// thing held across the network call.
    pub async fn run_at<F>(
        &self,
        user_id: &str,
        cost: i64,
        at: DateTime<Tz>,
        build_prompt: F,
    ) -> Result<InquiryOutcome>
    where
        F: FnOnce(&Chart) -> String,
    {
        let token = self.ledger.reserve(user_id, cost)?;

        let result = async {
            let chart = self.charts.generate(at)?;
            let prompt = build_prompt(&chart);
            self.llm.ask(&prompt).await
        }
        .await;

        match result {
            Ok(answer) => {
                self.ledger.commit(&token)?;
                let points_remaining = self.ledger.get_balance(user_id)?;
                info!(user = %user_id, cost, points_remaining, "Inquiry settled");
                Ok(InquiryOutcome {
                    answer,
                    points_remaining,
                })
            }
            Err(e) => {
                if let Err(release_err) = self.ledger.release(&token) {
                    // The sweep will pick the reservation up if this fails
                    warn!(token = %token, error = %release_err, "Failed to release reservation");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::FixedChartProvider;
    use crate::db::users::INITIAL_POINTS;
    use crate::db::Database;
    use crate::error::Error;
    use crate::ledger::DEFAULT_TZ;

    fn setup(llm: LlmClient) -> (InquiryPipeline, String) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("seeker@example.com", "changeme1").unwrap();
        let ledger = PointsLedger::new(db, DEFAULT_TZ);
        let pipeline = InquiryPipeline::new(ledger, Arc::new(FixedChartProvider), llm);
        (pipeline, user.id)
    }

    #[tokio::test]
    async fn successful_inquiry_charges_once() {
        let (pipeline, user) = setup(LlmClient::mock());

        let outcome = pipeline.run(&user, 1, "Should I travel east?").await.unwrap();
        assert_eq!(outcome.points_remaining, INITIAL_POINTS - 1);
        // The mock echoes the head of the prompt
        assert!(outcome.answer.starts_with("[Stubbed LLM response]"));
        assert!(outcome.answer.contains("Qimen Dunjia divination assistant"));

        assert_eq!(
            pipeline.ledger().get_balance(&user).unwrap(),
            INITIAL_POINTS - 1
        );
    }

    #[tokio::test]
    async fn gateway_failure_refunds_the_charge() {
        let (pipeline, user) = setup(LlmClient::failing_mock());

        let err = pipeline.run(&user, 3, "Anything?").await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(_)));
        assert_eq!(
            pipeline.ledger().get_balance(&user).unwrap(),
            INITIAL_POINTS
        );
    }

    #[tokio::test]
    async fn insufficient_balance_fails_before_any_work() {
        let (pipeline, user) = setup(LlmClient::mock());

        let err = pipeline
            .run(&user, INITIAL_POINTS + 1, "Too rich for me")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientPoints { .. }));
        assert_eq!(
            pipeline.ledger().get_balance(&user).unwrap(),
            INITIAL_POINTS
        );
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let (pipeline, _) = setup(LlmClient::mock());
        let err = pipeline.run("ghost", 1, "hello?").await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[tokio::test]
    async fn custom_prompt_builder_sees_the_requested_chart() {
        let (pipeline, user) = setup(LlmClient::mock());
        let zone = DEFAULT_TZ;
        let at = chrono::TimeZone::with_ymd_and_hms(&zone, 1990, 6, 15, 8, 0, 0).unwrap();

        let outcome = pipeline
            .run_at(&user, 1, at, |chart| prompts::destiny_prompt(chart))
            .await
            .unwrap();
        // The fixed chart's pillars sit in the head of the echoed prompt
        assert!(outcome.answer.contains("Year pillar: 甲子"));
    }
}
