use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::cleanup::cleanup;
use crate::config::Settings;
use crate::domain::{ContentItem, ItemId, dedupe_ids};
use crate::error::FailureReason;
use crate::fetcher::Fetcher;
use crate::oracle::{self, Freshness};
use crate::orchestrator::{FetchJob, JobStatus, Orchestrator};
use crate::relocator::relocate;
use crate::remote::RemoteMetadata;
use crate::store::Store;
use crate::validator::validate;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Treat every item as stale.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub items: Vec<ContentItem>,
    pub stale: Vec<ItemId>,
}

impl SyncPlan {
    pub fn freshness(&self, id: &ItemId) -> Freshness {
        if self.stale.contains(id) {
            Freshness::NeedsFetch
        } else {
            Freshness::Fresh
        }
    }
}

/// Outcome of one run. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub succeeded: BTreeSet<ItemId>,
    pub failed: BTreeMap<ItemId, FailureReason>,
    pub up_to_date: BTreeSet<ItemId>,
    pub cleanup_warning: Option<String>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn report(&self) -> SyncReport {
        let mut items = Vec::new();
        for id in &self.up_to_date {
            items.push(ItemReport {
                id: id.to_string(),
                outcome: ItemOutcome::UpToDate,
                error: None,
                message: None,
            });
        }
        for id in &self.succeeded {
            items.push(ItemReport {
                id: id.to_string(),
                outcome: ItemOutcome::Fetched,
                error: None,
                message: None,
            });
        }
        for (id, reason) in &self.failed {
            items.push(ItemReport {
                id: id.to_string(),
                outcome: ItemOutcome::Failed,
                error: Some(reason.tag().to_string()),
                message: Some(reason.to_string()),
            });
        }
        SyncReport {
            fetched: self.succeeded.len(),
            failed: self.failed.len(),
            up_to_date: self.up_to_date.len(),
            cleanup_warning: self.cleanup_warning.clone(),
            items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    UpToDate,
    Fetched,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub outcome: ItemOutcome,
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub failed: usize,
    pub up_to_date: usize,
    pub cleanup_warning: Option<String>,
    pub items: Vec<ItemReport>,
}

pub struct SyncEngine<F: Fetcher, R: RemoteMetadata> {
    settings: Settings,
    store: Store,
    fetcher: F,
    remote: R,
}

impl<F: Fetcher, R: RemoteMetadata> SyncEngine<F, R> {
    pub fn new(settings: Settings, fetcher: F, remote: R) -> Self {
        let store = Store::from_settings(&settings);
        Self {
            settings,
            store,
            fetcher,
            remote,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Builds descriptors from disk and decides which items are stale.
    /// Remote metadata is only consulted for items that are present locally.
    pub fn plan(&self, ids: &[ItemId], options: SyncOptions) -> SyncPlan {
        let lookup_timeout = self.settings.remote.lookup_timeout();
        let items = dedupe_ids(ids.iter().cloned())
            .into_iter()
            .map(|id| {
                let item = ContentItem::inspect(&self.store, id);
                if item.is_present() && !options.force {
                    let updated_at = self.remote.fetch_update_time(&item.id, lookup_timeout);
                    item.with_remote_updated_at(updated_at)
                } else {
                    item
                }
            })
            .collect::<Vec<_>>();
        let stale = oracle::decide_all(&items, options.force);
        tracing::info!(items = items.len(), stale = stale.len(), "staleness check done");
        SyncPlan { items, stale }
    }

    pub fn run(&self, ids: &[ItemId], options: SyncOptions) -> SyncResult {
        let plan = self.plan(ids, options);
        let mut result = SyncResult::default();
        for item in &plan.items {
            if !plan.stale.contains(&item.id) {
                result.up_to_date.insert(item.id.clone());
            }
        }

        if !plan.stale.is_empty() {
            let jobs = Orchestrator::new(&self.fetcher, &self.store, &self.settings.download)
                .run(&plan.stale);
            let items = plan
                .items
                .iter()
                .map(|item| (&item.id, item))
                .collect::<HashMap<_, _>>();

            for id in &plan.stale {
                let outcome = match (jobs.get(id), items.get(id)) {
                    (Some(job), Some(item)) => self.settle(job, item),
                    _ => Err(FailureReason::FetchProcess {
                        exit_code: None,
                        stderr: "job did not run".to_string(),
                    }),
                };
                match outcome {
                    Ok(()) => {
                        tracing::info!(item = %id, "synchronized");
                        result.succeeded.insert(id.clone());
                    }
                    Err(reason) => {
                        if reason.needs_operator_attention() {
                            tracing::error!(item = %id, error = %reason, "item left partially relocated");
                        } else {
                            tracing::warn!(item = %id, kind = reason.tag(), error = %reason, "item failed");
                        }
                        result.failed.insert(id.clone(), reason);
                    }
                }
            }
        }

        result.cleanup_warning = cleanup(&self.store.staging_root()).map(|err| {
            format!(
                "could not fully remove staging area {}: {err}",
                self.store.staging_root()
            )
        });

        tracing::info!(
            fetched = result.succeeded.len(),
            failed = result.failed.len(),
            up_to_date = result.up_to_date.len(),
            "sync finished"
        );
        result
    }

    fn settle(&self, job: &FetchJob, item: &ContentItem) -> Result<(), FailureReason> {
        match job.status {
            JobStatus::Succeeded => {}
            JobStatus::TimedOut => {
                return Err(FailureReason::FetchTimeout {
                    secs: self.settings.download.timeout,
                });
            }
            JobStatus::Failed | JobStatus::Pending | JobStatus::Running => {
                return Err(FailureReason::FetchProcess {
                    exit_code: job.exit_code,
                    stderr: job.stderr.clone(),
                });
            }
        }
        validate(job, self.store.manifest_name())?;
        relocate(job, item)
    }
}
