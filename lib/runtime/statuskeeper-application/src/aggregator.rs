//! Paginated policy/violation collection across alerting credentials.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use statuskeeper_domain::{ApiKey, OldestViolations, PolicyIndex};
use statuskeeper_ports::AlertingPort;

/// Upper bound on pages per listing, so a backend that never returns an
/// empty page cannot stall a cycle.
pub const DEFAULT_MAX_PAGES: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Policies,
    Violations,
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listing::Policies => f.write_str("policies"),
            Listing::Violations => f.write_str("violations"),
        }
    }
}

/// A listing that stopped before reaching its empty terminal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Masked credential.
    pub credential: String,
    pub listing: Listing,
    pub page: u32,
    pub error: String,
}

/// Result of one refresh. Always carries whatever was collected, even when
/// some listings failed part-way.
#[derive(Debug, Clone, Default)]
pub struct Refresh {
    pub policies: PolicyIndex,
    pub oldest: OldestViolations,
    pub failures: Vec<FetchFailure>,
}

impl Refresh {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ViolationAggregator {
    alerting: Arc<dyn AlertingPort>,
    page_timeout: Duration,
    max_pages: u32,
}

impl ViolationAggregator {
    pub fn new(alerting: Arc<dyn AlertingPort>, page_timeout: Duration) -> Self {
        Self {
            alerting,
            page_timeout,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn alerting(&self) -> &Arc<dyn AlertingPort> {
        &self.alerting
    }

    /// Builds this cycle's policy index and oldest-violation view from
    /// scratch. Policies are unioned by normalized name (last write wins),
    /// violations merged by longest duration.
    pub async fn refresh(&self, credentials: &[ApiKey]) -> Refresh {
        let mut refresh = Refresh::default();

        for credential in credentials {
            let (policies, failure) = self
                .paginate(credential, Listing::Policies, |page| {
                    self.alerting.list_policies(credential, page)
                })
                .await;
            refresh.failures.extend(failure);
            for policy in policies {
                refresh.policies.insert(policy.key(), policy);
            }

            let (violations, failure) = self
                .paginate(credential, Listing::Violations, |page| {
                    self.alerting.list_open_violations(credential, page)
                })
                .await;
            refresh.failures.extend(failure);
            refresh.oldest.merge(violations.into_iter().collect());
        }

        info!(
            policies = refresh.policies.len(),
            policies_with_violations = refresh.oldest.len(),
            failures = refresh.failures.len(),
            "alerting refresh finished"
        );
        refresh
    }

    async fn paginate<T, F, Fut>(
        &self,
        credential: &ApiKey,
        listing: Listing,
        mut fetch: F,
    ) -> (Vec<T>, Option<FetchFailure>)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            debug!(%credential, %listing, page, "fetching page");
            let outcome = match timeout(self.page_timeout, fetch(page)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("timed out after {:?}", self.page_timeout)),
            };

            match outcome {
                Ok(batch) if batch.is_empty() => {
                    debug!(%credential, %listing, total = items.len(), "listing complete");
                    return (items, None);
                }
                Ok(batch) => items.extend(batch),
                Err(err) => {
                    warn!(
                        %credential,
                        %listing,
                        page,
                        kept = items.len(),
                        error = %err,
                        "page fetch failed, treating as end of listing"
                    );
                    let failure = FetchFailure {
                        credential: credential.masked(),
                        listing,
                        page,
                        error: err.to_string(),
                    };
                    return (items, Some(failure));
                }
            }
        }

        warn!(%credential, %listing, max_pages = self.max_pages, "page limit reached");
        let failure = FetchFailure {
            credential: credential.masked(),
            listing,
            page: self.max_pages,
            error: format!("page limit of {} reached", self.max_pages),
        };
        (items, Some(failure))
    }
}
