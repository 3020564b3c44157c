use std::sync::Arc;

use serde::Serialize;

use crate::application::conditional::{self, ConditionalError, Decision, Fingerprint};
use crate::application::repos::{RegionCounts, RepoError, VehiclesRepo};
use crate::domain::Region;

pub const KIND_SUMMARY: &str = "summary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    pub region: Region,
    pub total: u64,
    pub available: u64,
    pub off_road: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total: u64,
    pub available: u64,
    pub off_road: u64,
    pub regions: Vec<RegionSummary>,
}

impl FleetSummary {
    pub fn from_counts(mut counts: Vec<RegionCounts>) -> Self {
        counts.sort_by_key(|row| row.region);
        let regions: Vec<RegionSummary> = counts
            .into_iter()
            .map(|row| RegionSummary {
                region: row.region,
                total: row.total,
                available: row.total.saturating_sub(row.off_road),
                off_road: row.off_road,
            })
            .collect();

        let total = regions.iter().map(|row| row.total).sum();
        let off_road = regions.iter().map(|row| row.off_road).sum();
        Self {
            total,
            available: regions.iter().map(|row| row.available).sum(),
            off_road,
            regions,
        }
    }
}

/// Fleet-wide availability counts for the dashboard header.
#[derive(Clone)]
pub struct DashboardService {
    vehicles: Arc<dyn VehiclesRepo>,
}

impl DashboardService {
    pub fn new(vehicles: Arc<dyn VehiclesRepo>) -> Self {
        Self { vehicles }
    }

    pub async fn summary(&self, region: Option<Region>) -> Result<FleetSummary, RepoError> {
        let counts = self.vehicles.region_counts(region).await?;
        Ok(FleetSummary::from_counts(counts))
    }

    pub async fn summary_conditional(
        &self,
        validator: Option<&str>,
        region: Option<Region>,
    ) -> Result<Decision<FleetSummary>, ConditionalError<RepoError>> {
        conditional::resolve(
            validator,
            self.fingerprint(region),
            || async { self.summary(region).await.map(Some) },
        )
        .await
    }

    async fn fingerprint(&self, region: Option<Region>) -> Result<Option<Fingerprint>, RepoError> {
        let version = self.vehicles.collection_version().await?;
        let key = region.map(Region::as_str).unwrap_or("all");
        Ok(Some(Fingerprint::of_collection(KIND_SUMMARY, key, version)))
    }
}
