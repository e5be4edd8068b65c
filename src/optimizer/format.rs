//! Step 6 of the L9 pipeline: render the three outbound message chunks.
//! Each is handed to `chat::split_message` separately, so none of these
//! functions need to worry about the 2000-character cap themselves.

use std::collections::HashMap;

use crate::model::pool::GardenPool;

use super::algorithm::HeroAssignment;

pub fn render_current_state(display_name: &str, hero_count: usize, assignments: &[HeroAssignment]) -> String {
    let mut out = format!("Garden report for {display_name}\n{hero_count} heroes scanned.\n\nCurrent assignments:\n");
    for a in assignments {
        out.push_str(&format!("- hero #{}: currently earning ~{:.2}% APR\n", a.hero_id, a.current_apr));
    }
    out
}

pub fn render_recommendation(assignments: &[HeroAssignment], pools_by_pid: &HashMap<u32, GardenPool>) -> String {
    let mut out = String::from("Recommended garden assignments:\n");
    for a in assignments {
        let pair = pools_by_pid.get(&a.pool_pid).map(|p| p.pair_name.as_str()).unwrap_or("unknown pool");
        out.push_str(&format!(
            "- hero #{}: move to {} (pid {}) for ~{:.2}% APR (+{:.2}%)\n",
            a.hero_id, pair, a.pool_pid, a.expected_apr, a.delta_apr
        ));
    }
    out
}

pub fn render_math_breakdown(assignments: &[HeroAssignment]) -> String {
    let total_delta: f64 = assignments.iter().map(|a| a.delta_apr).sum();
    let avg_delta = if assignments.is_empty() { 0.0 } else { total_delta / assignments.len() as f64 };
    let mut out = format!(
        "Math breakdown:\nTotal APR improvement across {} heroes: {:.2} percentage points\nAverage improvement per hero: {:.2} points\n\n",
        assignments.len(),
        total_delta,
        avg_delta
    );
    for a in assignments {
        out.push_str(&format!(
            "  hero #{}: {:.2}% -> {:.2}% (delta {:.2}%)\n",
            a.hero_id, a.current_apr, a.expected_apr, a.delta_apr
        ));
    }
    out
}

/// Annual USD improvement on a given staked-value base, used in the
/// report JSON written back to the job row.
pub fn additional_annual_usd(assignments: &[HeroAssignment], staked_value_per_hero_usd: f64) -> f64 {
    assignments.iter().map(|a| a.delta_apr / 100.0 * staked_value_per_hero_usd).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::split_message;

    fn assignment(hero_id: u64, delta: f64) -> HeroAssignment {
        HeroAssignment { hero_id, pool_pid: 1, current_apr: 5.0, expected_apr: 5.0 + delta, delta_apr: delta }
    }

    #[test]
    fn rendered_chunks_respect_the_message_cap() {
        let assignments: Vec<HeroAssignment> = (0..50).map(|i| assignment(i, 1.0)).collect();
        let breakdown = render_math_breakdown(&assignments);
        let chunks = split_message(&breakdown, 2000);
        assert!(chunks.iter().all(|c| c.len() <= 2000));
        assert_eq!(chunks.concat(), breakdown);
    }

    #[test]
    fn annual_usd_improvement_scales_with_delta_and_stake() {
        let assignments = vec![assignment(1, 10.0)];
        assert_eq!(additional_annual_usd(&assignments, 1000.0), 100.0);
    }
}
