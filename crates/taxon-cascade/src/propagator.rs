//! # Cascade Propagator
//!
//! Recomputes the totals of every item whose effective tax depends on a
//! changed category or subcategory.
//!
//! ## Propagation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Category Tax Changed                               │
//! │                                                                         │
//! │  1. Enumerate: subcategories of C without their own tax                │
//! │                items directly under C + items under those subcategories │
//! │                                                                         │
//! │  2. Partition: items with their own tax ──► skipped_overrides           │
//! │                                                                         │
//! │  3. Invalidate: drop every target from the tax cache                   │
//! │                                                                         │
//! │  4. Batches (sequential, batch_size items each):                       │
//! │     ┌──────────────────────────────────────────────────────────────┐   │
//! │     │  per item, concurrently:                                     │   │
//! │     │    invalidate ──► re-read item ──► resolve ──► compute total │   │
//! │     │    ──► write total if amounts/tax unchanged ──► cache        │   │
//! │     │        (changed since the read: re-read and try again)       │   │
//! │     │  failure ──► collected, batch continues                      │   │
//! │     └──────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  5. Deadline passed: finished items stay recomputed, the rest of the   │
//! │     batch and all later batches are reported as abandoned.             │
//! │     Nothing is rolled back.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::cache::TaxCache;
use crate::config::CascadeConfig;
use crate::error::{CascadeError, CascadeResult};
use crate::report::{CascadeReport, CascadeTrigger, ItemFailure};
use crate::resolver::TaxResolver;
use taxon_core::total::compute_total;
use taxon_core::{EntityKind, Item};
use taxon_db::{HierarchyStore, TotalBasis};

/// Re-reads allowed when an item keeps changing under a recompute.
pub const MAX_SETTLE_ATTEMPTS: usize = 3;

/// Items of one batch, split by how they ended.
#[derive(Debug, Default)]
struct BatchOutcome {
    recomputed: Vec<String>,
    failures: Vec<ItemFailure>,
    unfinished: Vec<String>,
}

/// Batched recomputation of dependent item totals.
#[derive(Clone)]
pub struct CascadePropagator {
    store: Arc<dyn HierarchyStore>,
    cache: TaxCache,
    resolver: TaxResolver,
    batch_size: usize,
    timeout: Option<Duration>,
}

impl CascadePropagator {
    pub fn new(store: Arc<dyn HierarchyStore>, cache: TaxCache, config: &CascadeConfig) -> Self {
        let resolver = TaxResolver::new(store.clone(), cache.clone());
        Self {
            store,
            cache,
            resolver,
            batch_size: config.batch_size().max(1),
            timeout: config.cascade_timeout(),
        }
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Recomputes items that inherit from a category whose tax changed.
    ///
    /// Items under a subcategory with its own tax are not affected and are
    /// not enumerated.
    ///
    /// ## Errors
    /// * `NotFound` - no such category
    /// * `Database` - enumeration failed (nothing was recomputed)
    pub async fn on_category_tax_changed(&self, category_id: &str) -> CascadeResult<CascadeReport> {
        let started = Instant::now();

        self.store
            .get_category(category_id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::Category, category_id))?;

        let sub_categories = self.store.find_sub_categories_by_category(category_id).await?;
        let inherited: Vec<String> = sub_categories
            .into_iter()
            .filter(|sub_category| !sub_category.has_tax_override())
            .map(|sub_category| sub_category.id)
            .collect();
        let inherited_set: HashSet<&str> = inherited.iter().map(String::as_str).collect();

        let affected: Vec<Item> = self
            .store
            .find_items_by_category(category_id)
            .await?
            .into_iter()
            .filter(|item| match &item.sub_category_id {
                None => true,
                Some(sub_category_id) => inherited_set.contains(sub_category_id.as_str()),
            })
            .collect();

        info!(
            category_id,
            inherited_sub_categories = inherited.len(),
            items = affected.len(),
            "Category tax changed, cascading"
        );

        let mut report = CascadeReport::new(CascadeTrigger::CategoryTaxChanged {
            category_id: category_id.to_string(),
        });
        report.inherited_sub_categories = inherited;

        Ok(self.run(report, affected, started).await)
    }

    /// Recomputes the items of a subcategory whose tax changed.
    ///
    /// ## Errors
    /// * `NotFound` - no such subcategory
    pub async fn on_sub_category_tax_changed(
        &self,
        sub_category_id: &str,
    ) -> CascadeResult<CascadeReport> {
        let started = Instant::now();

        self.store
            .get_sub_category(sub_category_id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::SubCategory, sub_category_id))?;

        let affected = self.store.find_items_by_sub_category(sub_category_id).await?;

        info!(
            sub_category_id,
            items = affected.len(),
            "SubCategory tax changed, cascading"
        );

        let report = CascadeReport::new(CascadeTrigger::SubCategoryTaxChanged {
            sub_category_id: sub_category_id.to_string(),
        });

        Ok(self.run(report, affected, started).await)
    }

    /// Recomputes an explicit set of items.
    pub async fn recompute_items(&self, trigger: CascadeTrigger, items: Vec<Item>) -> CascadeReport {
        let started = Instant::now();
        info!(%trigger, items = items.len(), "Recomputing items");
        self.run(CascadeReport::new(trigger), items, started).await
    }

    // =========================================================================
    // Batch Execution
    // =========================================================================

    async fn run(&self, mut report: CascadeReport, items: Vec<Item>, started: Instant) -> CascadeReport {
        let deadline = self.timeout.map(|timeout| started + timeout);

        let (overrides, targets): (Vec<Item>, Vec<Item>) =
            items.into_iter().partition(Item::has_tax_override);
        report.skipped_overrides = overrides.into_iter().map(|item| item.id).collect();

        self.cache
            .invalidate_all(targets.iter().map(|item| item.id.as_str()))
            .await;

        let batches: Vec<&[Item]> = targets.chunks(self.batch_size).collect();
        let total_batches = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                report
                    .abandoned
                    .extend(batches[index..].iter().flat_map(|b| b.iter()).map(|i| i.id.clone()));
                break;
            }

            let outcome = self.run_batch(batch, deadline).await;
            report.recomputed.extend(outcome.recomputed);
            report.failures.extend(outcome.failures);

            if !outcome.unfinished.is_empty() {
                report.abandoned.extend(outcome.unfinished);
                report.abandoned.extend(
                    batches[index + 1..]
                        .iter()
                        .flat_map(|b| b.iter())
                        .map(|i| i.id.clone()),
                );
                break;
            }

            report.batches_completed += 1;
            debug!(
                batch = index + 1,
                of = total_batches,
                size = batch.len(),
                "Cascade batch complete"
            );
        }

        report.elapsed = started.elapsed();

        if !report.abandoned.is_empty() {
            warn!(
                trigger = %report.trigger,
                abandoned = report.abandoned.len(),
                batches_completed = report.batches_completed,
                "Cascade deadline passed"
            );
        }

        info!(
            trigger = %report.trigger,
            recomputed = report.recomputed.len(),
            skipped = report.skipped_overrides.len(),
            failed = report.failures.len(),
            abandoned = report.abandoned.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cascade finished"
        );

        report
    }

    /// Runs one batch concurrently until it drains or the deadline passes.
    async fn run_batch(&self, batch: &[Item], deadline: Option<Instant>) -> BatchOutcome {
        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .map(|item| async move { (item.id.as_str(), self.recompute_item(item).await) })
            .collect();

        let mut outcome = BatchOutcome::default();
        let mut finished: HashSet<&str> = HashSet::with_capacity(batch.len());

        loop {
            let next = match deadline {
                Some(deadline) => match timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => break,
                },
                None => pending.next().await,
            };

            let Some((item_id, result)) = next else {
                break;
            };
            finished.insert(item_id);

            match result {
                Ok(()) => outcome.recomputed.push(item_id.to_string()),
                Err(err) => {
                    warn!(item_id, error = %err, "Item recompute failed");
                    outcome.failures.push(ItemFailure::new(item_id, &err));
                }
            }
        }

        // Cancels anything still in flight.
        drop(pending);

        outcome.unfinished = batch
            .iter()
            .filter(|item| !finished.contains(item.id.as_str()))
            .map(|item| item.id.clone())
            .collect();

        outcome
    }

    async fn recompute_item(&self, item: &Item) -> CascadeResult<()> {
        self.settle_item(&item.id).await.map(|_| ())
    }

    /// Brings one item's stored total in line with its current amounts and
    /// effective tax, and returns the item as stored.
    ///
    /// The total write is conditioned on the amounts and own tax it was
    /// computed from. When an edit lands in between, the item is re-read
    /// and recomputed, up to [`MAX_SETTLE_ATTEMPTS`] times.
    ///
    /// ## Errors
    /// * `NotFound` - the item is gone
    /// * `ConcurrentModification` - every attempt lost to a concurrent edit
    pub async fn settle_item(&self, item_id: &str) -> CascadeResult<Item> {
        for attempt in 1..=MAX_SETTLE_ATTEMPTS {
            self.cache.invalidate(item_id).await;

            let mut current = self
                .store
                .get_item(item_id)
                .await?
                .ok_or_else(|| CascadeError::not_found(EntityKind::Item, item_id))?;

            let resolution = self.resolver.resolve_item(&current).await?;
            let totals =
                compute_total(current.base_amount(), current.discount(), &resolution.descriptor)?;

            if totals.total_amount == current.total_amount() {
                trace!(item_id, "Total unchanged");
            } else {
                let written = self
                    .store
                    .write_item_total(item_id, &TotalBasis::of(&current), totals.total_amount)
                    .await?;
                if !written {
                    debug!(item_id, attempt, "Item changed during recompute, retrying");
                    continue;
                }
                current.total_amount_cents = totals.total_amount.cents();
            }

            self.cache.insert(item_id, resolution.descriptor).await;
            return Ok(current);
        }

        Err(CascadeError::ConcurrentModification {
            entity: EntityKind::Item,
            id: item_id.to_string(),
        })
    }
}
