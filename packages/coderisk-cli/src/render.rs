use std::collections::HashMap;

use coderisk_ir::ModificationKind;
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

fn modification_label(kind: &ModificationKind) -> &'static str {
    match kind {
        ModificationKind::NewFile => "NEW_FILE",
        ModificationKind::DeletedFile => "DELETED_FILE",
        ModificationKind::NewFunction => "NEW_FUNCTION",
        ModificationKind::ModifiedFunction => "MODIFIED_FUNCTION",
        ModificationKind::DeletedFunction => "DELETED_FUNCTION",
        ModificationKind::NewClass => "NEW_CLASS",
        ModificationKind::ModifiedClass => "MODIFIED_CLASS",
        ModificationKind::ConfigOnly => "CONFIG_ONLY",
        ModificationKind::DocOnly => "DOC_ONLY",
        ModificationKind::WhitespaceOnly => "WHITESPACE_ONLY",
    }
}

/// Renders verdicts for a human reviewer. A `Low` verdict always states a
/// positive reason ("no escalation signal", "well covered by tests") --
/// never just an absence of output, which would read as the tool having
/// nothing to say rather than having checked and found no risk.
pub fn render_human(verdicts: &[Verdict], verbosity: Verbosity) -> String {
    let overall = overall_risk_level(verdicts);
    if verbosity == Verbosity::Quiet {
        return risk_label(&overall).to_string();
    }

    let mut out = String::new();
    for verdict in verdicts {
        out.push_str(&format!(
            "[{}] {} (confidence {:.2})\n",
            risk_label(&verdict.risk_level),
            verdict.files.join(", "),
            verdict.confidence
        ));
        for factor in &verdict.key_factors {
            out.push_str(&format!("  - {factor}\n"));
        }
        for rec in &verdict.recommendations {
            out.push_str(&format!("  recommend: {rec}\n"));
        }

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

/// The stable machine-readable schema (spec §6): one top-level verdict
/// aggregating every investigated target, the per-file modification kinds
/// that drove it, and one entry per investigated group.
pub fn render_json(
    verdicts: &[Verdict],
    modification_kinds: &HashMap<String, Vec<ModificationKind>>,
    duration_ms: u64,
) -> serde_json::Value {
    let overall = overall_risk_level(verdicts);
    let degraded = verdicts.iter().any(|v| v.degraded);
    let confidence = highest_risk_confidence(verdicts, &overall);

    let mut targets: Vec<&String> = modification_kinds.keys().collect();
    targets.sort();
    let targets: Vec<serde_json::Value> = targets
        .into_iter()
        .map(|path| {
            json!({
                "path": path,
                "modifications": modification_kinds[path]
                    .iter()
                    .map(modification_label)
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let groups: Vec<serde_json::Value> = verdicts
        .iter()
        .map(|v| {
            json!({
                "files": v.files,
                "phase1": v.phase1,
                "phase2_hops": v.hops.iter().map(|h| json!({
                    "action": h.action,
                    "result": h.observation,
                    "confidence": h.action.confidence(),
                })).collect::<Vec<_>>(),
                "verdict": risk_label(&v.risk_level),
            })
        })
        .collect();

    let mut recommendations = Vec::new();
    for v in verdicts {
        for rec in &v.recommendations {
            if !recommendations.contains(rec) {
                recommendations.push(rec.clone());
            }
        }
    }

    json!({
        "schema_version": "1",
        "verdict": risk_label(&overall),
        "confidence": confidence,
        "degraded": degraded,
        "duration_ms": duration_ms,
        "targets": targets,
        "groups": groups,
        "recommendations": recommendations,
    })
}

fn overall_risk_level(verdicts: &[Verdict]) -> RiskLevel {
    verdicts
        .iter()
        .map(|v| v.risk_level)
        .max()
        .unwrap_or(RiskLevel::Low)
}

/// Confidence reported alongside the top-level verdict: the confidence of
/// whichever group actually drove that verdict, so a HIGH overall verdict
/// isn't paired with a LOW-risk group's unrelated confidence number.
fn highest_risk_confidence(verdicts: &[Verdict], overall: &RiskLevel) -> f64 {
    verdicts
        .iter()
        .filter(|v| v.risk_level == *overall)
        .map(|v| v.confidence)
        .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.min(c))))
        .unwrap_or(1.0)
}

/// Exit code mapping for the `check` subcommand (spec §6): 0 allows the
/// commit, 1 flags a MEDIUM change for review, 2 blocks on HIGH, 3 is
/// reserved for the binary's own error path (an `anyhow` bail before a
/// verdict is ever produced).
pub fn exit_code(verdicts: &[Verdict]) -> i32 {
    match overall_risk_level(verdicts) {
        RiskLevel::High => 2,
        RiskLevel::Medium => 1,
        RiskLevel::Low => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_verdict(level: RiskLevel, degraded: bool) -> Verdict {
        Verdict {
            files: vec!["pkg/mod.py".to_string()],
            risk_level: level,
            confidence: 0.9,
            phase1: Vec::new(),
            key_factors: vec!["no escalation signal from the Phase-1 baseline".to_string()],
            recommendations: Vec::new(),
            hops: Vec::new(),
            degraded,
        }
    }

    #[test]
    fn low_risk_key_factors_are_never_empty() {
        let verdict = sample_verdict(RiskLevel::Low, false);
        assert!(!verdict.key_factors.is_empty());
    }

    #[test]
    fn exit_code_reflects_highest_risk() {
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::Low, false)]), 0);
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::Medium, false)]), 1);
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::High, false)]), 2);
        assert_eq!(exit_code(&[sample_verdict(RiskLevel::High, true)]), 2);
    }

    #[test]
    fn json_schema_has_stable_top_level_shape() {
        let kinds = HashMap::new();
        let value = render_json(&[sample_verdict(RiskLevel::Medium, false)], &kinds, 42);
        assert_eq!(value["schema_version"], "1");
        assert_eq!(value["verdict"], "MEDIUM");
        assert_eq!(value["duration_ms"], 42);
        assert!(value["groups"][0]["files"].is_array());
    }
}
