//! History & query service
//!
//! Listing returns one entry per release name (its latest revision),
//! filtered, sorted and paginated. Pagination is offset-by-key: the cursor
//! is the name of the next item under the current sort order, so pages stay
//! stable while other names are inserted concurrently.

use crate::error::{Result, StoreError};
use crate::storage::ReleaseStorage;
use moor_types::{Release, ReleaseStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sort index for release listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortBy {
    /// Release name
    #[default]
    Name,
    /// Last-deployed timestamp of the latest revision
    LastReleased,
    /// Name of the deployed chart
    ChartName,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Parameters for a release listing
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Name key to start the page at (inclusive); empty starts from the top
    pub offset: String,

    /// Maximum page size; 0 returns everything from the offset on
    pub limit: usize,

    /// Sort index
    pub sort_by: SortBy,

    /// Sort direction
    pub sort_order: SortOrder,

    /// Regular expression over release names; empty matches all
    pub filter: String,

    /// Statuses to include; empty includes all
    pub status_codes: Vec<ReleaseStatus>,

    /// Namespace to restrict to; empty includes all
    pub namespace: String,
}

/// One page of a release listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage {
    /// Latest revision of each matching name, in sort order
    pub releases: Vec<Release>,

    /// Name of the item following the last one returned; empty when the
    /// result set is exhausted
    pub next: String,

    /// Number of releases in this page
    pub count: usize,

    /// Size of the full matching set, disregarding pagination
    pub total: usize,
}

/// List the latest revision of every matching release name.
pub async fn list_latest(storage: &dyn ReleaseStorage, query: &ListQuery) -> Result<ListPage> {
    let filter = if query.filter.is_empty() {
        None
    } else {
        Some(Regex::new(&query.filter)?)
    };

    // Latest revision per name, computed from a snapshot of the store.
    let mut latest: BTreeMap<String, Release> = BTreeMap::new();
    for release in storage.list().await? {
        match latest.get(&release.name) {
            Some(existing) if existing.version >= release.version => {}
            _ => {
                latest.insert(release.name.clone(), release);
            }
        }
    }

    let mut matching: Vec<Release> = latest
        .into_values()
        .filter(|r| filter.as_ref().map_or(true, |re| re.is_match(&r.name)))
        .filter(|r| query.status_codes.is_empty() || query.status_codes.contains(&r.status()))
        .filter(|r| query.namespace.is_empty() || r.namespace == query.namespace)
        .collect();

    matching.sort_by(|a, b| {
        let ordering = match query.sort_by {
            SortBy::Name => a.name.cmp(&b.name),
            SortBy::LastReleased => a
                .info
                .last_deployed
                .cmp(&b.info.last_deployed)
                .then_with(|| a.name.cmp(&b.name)),
            SortBy::ChartName => a
                .chart
                .metadata
                .name
                .cmp(&b.chart.metadata.name)
                .then_with(|| a.name.cmp(&b.name)),
        };
        match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let total = matching.len();

    let start = if query.offset.is_empty() {
        0
    } else {
        matching
            .iter()
            .position(|r| r.name == query.offset)
            .ok_or_else(|| StoreError::OffsetNotFound(query.offset.clone()))?
    };

    let end = if query.limit == 0 {
        total
    } else {
        total.min(start + query.limit)
    };

    let next = matching.get(end).map(|r| r.name.clone()).unwrap_or_default();
    let releases: Vec<Release> = matching[start..end].to_vec();
    let count = releases.len();

    Ok(ListPage {
        releases,
        next,
        count,
        total,
    })
}
