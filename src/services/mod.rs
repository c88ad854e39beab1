pub mod approval;
pub mod budgets;
pub mod identity;
pub mod pricing;
pub mod provisioning;

use std::sync::Arc;

use crate::config::Config;
use crate::repository::Repositories;

pub struct AppState {
    pub config: Config,
    pub repos: Repositories,
    pub identity: Arc<identity::IdentityService>,
    pub provisioning: Arc<provisioning::ProvisioningService>,
    pub budgets: Arc<budgets::BudgetService>,
}

impl AppState {
    pub fn new(repos: Repositories, config: Config) -> Self {
        let identity = Arc::new(identity::IdentityService::new(
            repos.identities.clone(),
            repos.profiles.clone(),
            &config.jwt_secret,
            config.jwt_ttl_minutes,
        ));
        let provisioning = Arc::new(provisioning::ProvisioningService::new(
            identity.clone(),
            repos.profiles.clone(),
            repos.doctors.clone(),
        ));
        let budgets = Arc::new(budgets::BudgetService::new(
            &repos,
            config.service_fee_rate,
            approval::ApprovalPolicy {
                allow_revision_cycle: config.allow_revision_cycle,
            },
        ));

        Self {
            config,
            repos,
            identity,
            provisioning,
            budgets,
        }
    }
}
