//! Test-context resolution (SPEC_FULL.md §4.5). Thin wrapper over
//! [`db::Gateway::resolve_test_context`], ported in shape from `worker.py`'s
//! `get_test_details`. The gateway already applies the question-count and
//! duration defaults (SPEC_FULL.md §3); a missing attempt is still a hard
//! failure for the caller, since there is no row to eventually write a risk
//! score to.

use db::{Attempt, Gateway, TestContext};
use uuid::Uuid;

pub async fn resolve(
    gateway: &Gateway,
    attempt_id: Uuid,
) -> Result<(Attempt, TestContext), base::Error> {
    let resolved = gateway.resolve_test_context(attempt_id).await?;
    Ok((resolved.attempt, resolved.context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_matches_spec_defaults() {
        let ctx = TestContext::default();
        assert!(!ctx.is_public);
        assert_eq!(ctx.total_questions, 30);
        assert_eq!(ctx.duration_minutes, 60.0);
    }
}
