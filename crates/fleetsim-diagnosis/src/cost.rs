//! ---
//! fleetsim_section: "07-diagnosis-resilience"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "USD cost estimation from provider token counts."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use fleetsim_common::records::TokenUsage;

/// USD per 1,000 prompt tokens.
pub const PROMPT_COST_PER_1K: f64 = 0.000_15;

/// USD per 1,000 completion tokens.
pub const COMPLETION_COST_PER_1K: f64 = 0.000_6;

/// Estimate the USD cost of one provider call from its token usage against
/// the fixed per-1,000-token rate table.
pub fn estimate_usd(usage: &TokenUsage) -> f64 {
    let prompt = usage.prompt_tokens as f64 / 1000.0 * PROMPT_COST_PER_1K;
    let completion = usage.completion_tokens as f64 / 1000.0 * COMPLETION_COST_PER_1K;
    prompt + completion
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_scales_with_both_token_kinds() {
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 1000,
            total_tokens: 2000,
        };
        let cost = estimate_usd(&usage);
        assert!((cost - 0.000_75).abs() < 1e-12);
    }

    #[test]
    fn zero_usage_costs_nothing() {
        assert_eq!(estimate_usd(&TokenUsage::default()), 0.0);
    }

    #[test]
    fn completion_tokens_cost_four_times_prompt_tokens() {
        let prompt_only = TokenUsage {
            prompt_tokens: 4000,
            completion_tokens: 0,
            total_tokens: 4000,
        };
        let completion_only = TokenUsage {
            prompt_tokens: 0,
            completion_tokens: 1000,
            total_tokens: 1000,
        };
        let a = estimate_usd(&prompt_only);
        let b = estimate_usd(&completion_only);
        assert!((a - b).abs() < 1e-12);
    }
}
