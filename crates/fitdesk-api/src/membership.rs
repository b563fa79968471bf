//! Membership & Billing API

use async_trait::async_trait;
use fitdesk_checkout::{BillingRecord, Plan, UpgradeInfo};

use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::HttpClient;

/// Remote membership and billing service
///
/// Source of truth for every amount the checkout shows or charges.
#[async_trait]
pub trait MembershipApi: Send + Sync {
    async fn list_plans(&self) -> Result<Vec<Plan>>;

    async fn get_plan(&self, plan_id: &str) -> Result<Plan>;

    /// Prorated cost of moving `user_id` to `new_plan_id`
    async fn upgrade_cost(&self, user_id: &str, new_plan_id: &str) -> Result<UpgradeInfo>;

    async fn billing_history(&self, user_id: &str) -> Result<Vec<BillingRecord>>;
}

/// HTTP implementation of [`MembershipApi`]
#[derive(Clone, Debug)]
pub struct HttpMembershipApi {
    http: HttpClient,
}

impl HttpMembershipApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env())
    }
}

#[async_trait]
impl MembershipApi for HttpMembershipApi {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.http.send_json(self.http.get("plans")).await
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Plan> {
        self.http
            .send_json(self.http.get(&format!("plans/{plan_id}")))
            .await
    }

    async fn upgrade_cost(&self, user_id: &str, new_plan_id: &str) -> Result<UpgradeInfo> {
        let request = self
            .http
            .get("memberships/upgrade-cost")
            .query(&[("userId", user_id), ("newPlanId", new_plan_id)]);

        let info: UpgradeInfo = self.http.send_json(request).await?;
        tracing::debug!(
            user_id = %user_id,
            new_plan_id = %new_plan_id,
            upgrade_cost = %info.upgrade_cost,
            "Fetched upgrade cost"
        );

        Ok(info)
    }

    async fn billing_history(&self, user_id: &str) -> Result<Vec<BillingRecord>> {
        let request = self
            .http
            .get("billing/history")
            .query(&[("userId", user_id)]);

        self.http.send_json(request).await
    }
}
