use std::fmt;

/// Where one subscription ended up after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    /// The send completed and the watermark moved. `rejected` counts items
    /// the service refused inside completed batches.
    WatermarkUpdated { sent: usize, rejected: usize },
    /// Nothing newer than the watermark.
    Skipped,
    /// The feed could not be fetched or parsed.
    FailedFetch(String),
    /// A create call failed outright.
    FailedDispatch(String),
}

impl SubscriptionOutcome {
    pub fn advanced_watermark(&self) -> bool {
        matches!(self, SubscriptionOutcome::WatermarkUpdated { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SubscriptionOutcome::FailedFetch(_) | SubscriptionOutcome::FailedDispatch(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub url: String,
    pub title: String,
    pub outcome: SubscriptionOutcome,
}

/// Per-subscription outcomes of a run, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub subscriptions: Vec<SubscriptionReport>,
}

impl SyncReport {
    pub(crate) fn push(&mut self, report: SubscriptionReport) {
        self.subscriptions.push(report);
    }

    pub fn outcome(&self, url: &str) -> Option<&SubscriptionOutcome> {
        self.subscriptions
            .iter()
            .find(|r| r.url == url)
            .map(|r| &r.outcome)
    }

    /// True when at least one watermark moved and the store should be saved.
    pub fn has_updates(&self) -> bool {
        self.subscriptions
            .iter()
            .any(|r| r.outcome.advanced_watermark())
    }

    pub fn sent(&self) -> usize {
        self.subscriptions
            .iter()
            .map(|r| match r.outcome {
                SubscriptionOutcome::WatermarkUpdated { sent, .. } => sent,
                _ => 0,
            })
            .sum()
    }

    pub fn rejected(&self) -> usize {
        self.subscriptions
            .iter()
            .map(|r| match r.outcome {
                SubscriptionOutcome::WatermarkUpdated { rejected, .. } => rejected,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.subscriptions
            .iter()
            .filter(|r| r.outcome.is_failure())
            .count()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let updated = self
            .subscriptions
            .iter()
            .filter(|r| r.outcome.advanced_watermark())
            .count();
        let skipped = self
            .subscriptions
            .iter()
            .filter(|r| r.outcome == SubscriptionOutcome::Skipped)
            .count();

        write!(
            f,
            "{} feeds: {} synced, {} unchanged, {} failed; {} entries sent, {} refused",
            self.subscriptions.len(),
            updated,
            skipped,
            self.failures(),
            self.sent(),
            self.rejected()
        )
    }
}
