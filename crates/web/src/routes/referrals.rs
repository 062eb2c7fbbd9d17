//! Referral program page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use liquifund_core::{Kes, ReferralStatus};

use super::MessageQuery;
use crate::api::types::{ReferralEntry, Referrer};
use crate::error::{Result, or_default_logged};
use crate::filters;
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Totals shown above the referral history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralSummary {
    pub total: usize,
    pub completed: usize,
    pub earnings: Kes,
}

impl ReferralSummary {
    #[must_use]
    pub fn from_entries(entries: &[ReferralEntry]) -> Self {
        Self {
            total: entries.len(),
            completed: entries
                .iter()
                .filter(|r| r.status == ReferralStatus::Completed)
                .count(),
            earnings: entries.iter().map(|r| r.reward).sum(),
        }
    }
}

/// Code, share link and history, as shown on the referrals page and the
/// dashboard's referrals tab.
#[derive(Debug, Clone)]
pub struct ReferralPanel {
    pub code: Option<String>,
    pub link: Option<String>,
    pub history: Vec<ReferralEntry>,
    pub summary: ReferralSummary,
}

impl ReferralPanel {
    #[must_use]
    pub fn new(code: Option<String>, link: Option<String>, history: Vec<ReferralEntry>) -> Self {
        let summary = ReferralSummary::from_entries(&history);
        Self {
            code,
            link,
            history,
            summary,
        }
    }
}

/// Referrals page template.
#[derive(Template, WebTemplate)]
#[template(path = "client/referrals.html")]
pub struct ReferralsTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
    pub referred_by: Option<Referrer>,
    pub panel: ReferralPanel,
}

/// Load the referral panel for the signed-in user.
///
/// The code and history are fetched concurrently; either may fail on its own
/// without taking the page down.
pub(crate) async fn load_panel(state: &AppState, guard: &RequireSession) -> Result<ReferralPanel> {
    let authed = state.api().authed(&guard.session);
    let (code, history) = tokio::join!(authed.referral_code(), authed.referral_history());
    let code = or_default_logged(code.map(Some), "referral code")?;
    let history = or_default_logged(history, "referral history")?;
    let link = code.as_deref().map(|c| state.config().referral_link(c));
    Ok(ReferralPanel::new(code, link, history))
}

/// Display the referral program page.
pub async fn referrals(
    State(state): State<AppState>,
    guard: RequireSession,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    // The guard has just refreshed the profile, so `referred_by` is current.
    let panel = load_panel(&state, &guard).await?;
    Ok(ReferralsTemplate {
        error: query.error,
        success: query.success,
        referred_by: guard.profile.referred_by.clone(),
        panel,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(status: &str, reward: u32) -> ReferralEntry {
        serde_json::from_value(json!({
            "referred_email": "friend@example.com",
            "created_at": "2025-03-01T08:00:00Z",
            "status": status,
            "reward": reward,
        }))
        .unwrap()
    }

    #[test]
    fn test_summary_counts_completed_and_sums_rewards() {
        let summary = ReferralSummary::from_entries(&[
            entry("completed", 50),
            entry("pending", 0),
            entry("completed", 50),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.earnings, Kes::from_shillings(100));
    }

    #[test]
    fn test_empty_history() {
        let panel = ReferralPanel::new(None, None, Vec::new());
        assert_eq!(panel.summary.total, 0);
        assert_eq!(panel.summary.earnings, Kes::ZERO);
    }
}
