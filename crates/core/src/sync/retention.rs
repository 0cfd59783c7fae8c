//! Retention sweeper: per-store archival of aged-out doc pages
//!
//! Operates on each database independently and never consults the
//! correlation map: the external database drops pages a fixed number of
//! days after their start date, the internal database drops pages once
//! their end time has passed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use crosscal_domain::{Config, DocDatabase, Result};
use tracing::{info, warn};

use super::ports::DocumentGateway;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepSummary {
    pub archived: usize,
}

/// Periodic archival of doc pages past their retention policy.
pub struct RetentionSweeper {
    docs: Arc<dyn DocumentGateway>,
    external_enabled: bool,
    retention_days: i64,
}

impl RetentionSweeper {
    pub fn new(docs: Arc<dyn DocumentGateway>, config: &Config) -> Self {
        Self {
            docs,
            external_enabled: config.docs.external_db_id.is_some(),
            retention_days: config.sync.retention_days,
        }
    }

    /// Run one sweep over both databases. Individual archive failures are
    /// logged and skipped; the sweep always visits every candidate.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        let now = Utc::now();

        if self.external_enabled {
            let threshold = now - Duration::days(self.retention_days);
            for page in self.docs.list_pages(DocDatabase::External).await? {
                let Some(start) = page.start else { continue };
                if start <= threshold {
                    match self.docs.archive_page(&page.id).await {
                        Ok(()) => {
                            summary.archived += 1;
                            info!(page_id = %page.id, start = %start,
                                "external page archived past retention window");
                        }
                        Err(err) => {
                            warn!(page_id = %page.id, error = %err,
                                "failed to archive external page");
                        }
                    }
                }
            }
        }

        for page in self.docs.list_pages(DocDatabase::Internal).await? {
            let Some(end) = page.end.or(page.start) else { continue };
            if end <= now {
                match self.docs.archive_page(&page.id).await {
                    Ok(()) => {
                        summary.archived += 1;
                        info!(page_id = %page.id, end = %end,
                            "internal page archived past its end time");
                    }
                    Err(err) => {
                        warn!(page_id = %page.id, error = %err,
                            "failed to archive internal page");
                    }
                }
            }
        }

        Ok(summary)
    }
}
