use std::sync::Arc;

use crate::application::api_keys::ApiKeyService;
use crate::application::audit::AuditService;
use crate::application::dashboard::DashboardService;
use crate::application::incidents::IncidentService;
use crate::application::repos::{ApiKeysRepo, AuditRepo, HealthRepo, IncidentsRepo, VehiclesRepo};
use crate::application::vehicles::VehicleService;
use crate::domain::claims::{ClaimNames, ClaimSet, ClaimsTransformer, Policy, PolicyTable};

use super::error::ApiError;
use super::rate_limit::ApiRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub vehicles: VehicleService,
    pub incidents: IncidentService,
    pub dashboard: DashboardService,
    pub audit: AuditService,
    pub api_keys: Arc<ApiKeyService>,
    pub claims: Arc<ClaimsTransformer>,
    pub policies: Arc<PolicyTable>,
    pub rate_limiter: Arc<ApiRateLimiter>,
    pub health: Arc<dyn HealthRepo>,
}

impl ApiState {
    /// Wire every service over one store that implements all repositories.
    pub fn new<R>(store: Arc<R>, claim_names: ClaimNames, rate_limiter: ApiRateLimiter) -> Self
    where
        R: VehiclesRepo + IncidentsRepo + AuditRepo + ApiKeysRepo + HealthRepo + 'static,
    {
        let vehicles_repo: Arc<dyn VehiclesRepo> = store.clone();
        let incidents_repo: Arc<dyn IncidentsRepo> = store.clone();
        let audit_repo: Arc<dyn AuditRepo> = store.clone();
        let keys_repo: Arc<dyn ApiKeysRepo> = store.clone();
        let health: Arc<dyn HealthRepo> = store;

        let audit = AuditService::new(audit_repo);
        let vehicles = VehicleService::new(
            vehicles_repo.clone(),
            incidents_repo.clone(),
            audit.clone(),
        );
        let incidents = IncidentService::new(incidents_repo, vehicles.clone(), audit.clone());
        let dashboard = DashboardService::new(vehicles_repo);
        let policies = PolicyTable::new(&claim_names);

        Self {
            vehicles,
            incidents,
            dashboard,
            audit,
            api_keys: Arc::new(ApiKeyService::new(keys_repo)),
            claims: Arc::new(ClaimsTransformer::new(claim_names)),
            policies: Arc::new(policies),
            rate_limiter: Arc::new(rate_limiter),
            health,
        }
    }

    pub fn authorize(&self, claims: &ClaimSet, policy: Policy) -> Result<(), ApiError> {
        self.policies
            .evaluate(policy, claims)
            .map_err(super::handlers::authz_to_api)
    }
}
