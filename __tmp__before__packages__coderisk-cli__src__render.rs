use coderisk_orchestration::{RiskLevel, Verdict};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

fn risk_label(level: &RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "LOW",
        RiskLevel::Medium => "MEDIUM",
        RiskLevel::High => "HIGH",
    }
}

fn risk_rank(level: &RiskLevel) -> u8 {
    match level {
        RiskLevel::Low => 0,
        RiskLevel::Medium => 1,
        RiskLevel::High => 2,
    }
}

fn rank_to_level(rank: u8) -> RiskLevel {
    match rank {
        2 => RiskLevel::High,
        1 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Renders verdicts for a human reviewer. A `Low` verdict always states a
/// positive reason ("no escalation signal", "well covered by tests") --
/// never just an absence of output, which would read as the tool having
/// nothing to say rather than having checked and found no risk.
pub fn render_human(verdicts: &[Verdict], verbosity: Verbosity) -> String {
    if verbosity == Verbosity::Quiet {
        let worst = verdicts
            .iter()
            .map(|v| risk_rank(&v.risk_level))
            .max()
            .unwrap_or(0);
        return risk_label(&rank_to_level(worst)).to_string();
    }

    let mut out = String::new();
    for verdict in verdicts {
        out.push_str(&format!(
            "[{}] {} (confidence {:.2})\n",
            risk_label(&verdict.risk_level),
            verdict.file_path,
            verdict.confidence
        ));
        out.push_str(&format!("  {}\n", verdict.rationale));

        if verdict.degraded {
            out.push_str("  note: this verdict is degraded; treat with caution\n");
        }

        if verbosity == Verbosity::Verbose || verbosity == Verbosity::Debug {
            for hop in &verdict.hops {
                out.push_str(&format!("  hop: {:?}\n", hop.action));
                if verbosity == Verbosity::Debug {
                    out.push_str(&format!("    observation: {}\n", hop.observation));
                }
            }
        }
        out.push('\n');
    }
    out
}

/// The stable machine-readable schema: one object per changed file, with a
/// top-level schema version so downstream tooling can detect breaking
/// changes.
pub fn render_json(verdicts: &[Verdict]) -> serde_json::Value {
    json!({
        "schema_version": 1,
        "verdicts": verdicts.iter().map(|v| json!({
            "file_path": v.file_path,
            "risk_level": risk_label(&v.risk_level),
            "confidence": v.confidence,
            "rationale": v.rationale,
            "degraded": v.degraded,
            "hops": v.hops.len(),
        })).collect::<Vec<_>>(),
    })
}

/// Exit code mapping for the `check` subcommand: 0 allows the commit, 1
/// signals a high-risk change a reviewer should look at, 2 marks a
/// degraded run (the tool could not reach a confident verdict).
pub fn exit_code(verdicts: &[Verdict]) -> i32 {
    if verdicts.iter().any(|v| v.degraded) {
        return 2;
    }
    if verdicts.iter().any(|v| v.risk_level == RiskLevel::High) {
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderisk_orchestration::RiskLevel;

    fn sample_verdict(level: RiskLevel, degraded: bool) -> Verdict {
        Verdict {
            file_path: "pkg/mod.py".to_string(),
            risk_level: level,
            confidence: 0.9,
            rationale: "No escalation signal from the Phase-1 baseline.".to_string(),
            hops: Vec::new(),
            degraded,
        }
    }

    #[test]
    fn low_risk_rationale_is_never_empty() {
        let verdict = sample_verdict(RiskLevel::Low, false);
        assert!(!verdict.rationale.trim().is_empty());
    }

    #[test]
    fn exit_code_reflects_highest_risk() {
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::Low, false)]), 0);
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::High, false)]), 1);
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::High, true)]), 2);
    }

    #[test]
    fn json_schema_has_stable_top_level_shape() {
        let value = render_json(&[sample_verdict(RiskLevel::Medium, false)]);
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["verdicts"][0]["risk_level"], "MEDIUM");
    }
}


