use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::{API_V1_PREFIX, BulkAction};

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn v1(base: &str, path: &str) -> String {
    base_join(base, &format!("{}/{}", API_V1_PREFIX, path))
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn action_seg(action: BulkAction) -> &'static str {
    match action {
        BulkAction::Approve => "approve",
        BulkAction::Reject => "reject",
    }
}

pub fn version(base: &str) -> String {
    v1(base, "version")
}
pub fn auth_login(base: &str) -> String {
    v1(base, "auth/login")
}
pub fn auth_kid_login(base: &str) -> String {
    v1(base, "auth/kid-login")
}
pub fn auth_logout(base: &str) -> String {
    v1(base, "auth/logout")
}
pub fn children(base: &str) -> String {
    v1(base, "children")
}
pub fn child(base: &str, child_id: i32) -> String {
    v1(base, &format!("children/{child_id}"))
}
pub fn child_progress(base: &str, child_id: i32) -> String {
    v1(base, &format!("children/{child_id}/progress"))
}
pub fn child_home(base: &str, child_id: i32, since: Option<&str>) -> String {
    let url = v1(base, &format!("children/{child_id}/home"));
    match since {
        Some(s) => format!("{url}?since={}", enc(s)),
        None => url,
    }
}
pub fn child_pin(base: &str, child_id: i32) -> String {
    v1(base, &format!("children/{child_id}/pin"))
}
pub fn child_adjustments(base: &str, child_id: i32) -> String {
    v1(base, &format!("children/{child_id}/adjustments"))
}
pub fn complete_chore(base: &str, child_id: i32, chore_id: i32) -> String {
    v1(base, &format!("children/{child_id}/chores/{chore_id}/complete"))
}
pub fn redeem_reward(base: &str, child_id: i32, reward_id: i32) -> String {
    v1(base, &format!("children/{child_id}/rewards/{reward_id}/redeem"))
}
pub fn chores(base: &str) -> String {
    v1(base, "chores")
}
pub fn chore(base: &str, chore_id: i32) -> String {
    v1(base, &format!("chores/{chore_id}"))
}
pub fn rewards(base: &str) -> String {
    v1(base, "rewards")
}
pub fn reward(base: &str, reward_id: i32) -> String {
    v1(base, &format!("rewards/{reward_id}"))
}
pub fn approvals_count(base: &str) -> String {
    v1(base, "approvals/count")
}
pub fn chore_approvals(base: &str) -> String {
    v1(base, "approvals/chores")
}
pub fn redemption_approvals(base: &str) -> String {
    v1(base, "approvals/redemptions")
}
pub fn chore_decision(base: &str, log_id: i32, action: BulkAction) -> String {
    v1(
        base,
        &format!("approvals/chores/{log_id}/{}", action_seg(action)),
    )
}
pub fn redemption_decision(base: &str, redemption_id: i32, action: BulkAction) -> String {
    v1(
        base,
        &format!("approvals/redemptions/{redemption_id}/{}", action_seg(action)),
    )
}
pub fn chore_bulk(base: &str) -> String {
    v1(base, "approvals/chores/bulk")
}
pub fn redemption_bulk(base: &str) -> String {
    v1(base, "approvals/redemptions/bulk")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_double_slashes() {
        assert_eq!(
            children("http://localhost:5151/"),
            "http://localhost:5151/api/v1/children"
        );
        assert_eq!(
            chore_decision("http://h", 4, BulkAction::Reject),
            "http://h/api/v1/approvals/chores/4/reject"
        );
    }

    #[test]
    fn since_is_encoded() {
        assert_eq!(
            child_home("http://h", 1, Some("2026-01-01T00:00:00+00:00")),
            "http://h/api/v1/children/1/home?since=2026%2D01%2D01T00%3A00%3A00%2B00%3A00"
        );
    }
}
