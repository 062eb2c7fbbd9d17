//! Public pages: landing, about, maintenance and 404.

use askama::Template;
use askama_web::WebTemplate;
use axum::{http::StatusCode, response::IntoResponse};
use liquifund_core::{RENTAL_DURATION_DAYS, RETURN_MULTIPLIER, RentalPlan};

use crate::filters;

/// A rental plan as listed on the landing page and the rent tab.
#[derive(Debug, Clone)]
pub struct PlanView {
    pub code: &'static str,
    pub name: &'static str,
    pub price: String,
    pub expected_return: String,
    pub profit: String,
}

impl From<&RentalPlan> for PlanView {
    fn from(plan: &RentalPlan) -> Self {
        Self {
            code: plan.currency.code(),
            name: plan.currency.name(),
            price: plan.price().to_string(),
            expected_return: plan.expected_return().to_string(),
            profit: plan.profit().to_string(),
        }
    }
}

/// The whole catalogue, cheapest first.
#[must_use]
pub fn plan_catalogue() -> Vec<PlanView> {
    RentalPlan::catalogue().iter().map(PlanView::from).collect()
}

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/landing.html")]
pub struct LandingTemplate {
    pub plans: Vec<PlanView>,
    pub duration_days: u32,
    pub multiplier: u32,
}

/// About page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate;

/// Shown to non-admins while maintenance mode is on.
#[derive(Template, WebTemplate, Default)]
#[template(path = "pages/maintenance.html")]
pub struct MaintenanceTemplate;

/// 404 page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate;

/// Display the landing page.
pub async fn landing() -> impl IntoResponse {
    LandingTemplate {
        plans: plan_catalogue(),
        duration_days: RENTAL_DURATION_DAYS,
        multiplier: RETURN_MULTIPLIER,
    }
}

/// Display the about page.
pub async fn about() -> impl IntoResponse {
    AboutTemplate
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_view_lists_every_plan() {
        let plans = plan_catalogue();
        assert_eq!(plans.len(), 6);
        assert_eq!(plans[0].code, "CAD");
        assert_eq!(plans[5].price, "1200");
        assert_eq!(plans[5].expected_return, "2400");
    }

    #[tokio::test]
    async fn test_not_found_status() {
        let response = not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
