//! `rflow smoke`: built-in risk gate scenarios with a pass/fail table, plus an
//! optional timing loop.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;
use serde_json::{Value, json};

use riskflow_core::node::{NodeError, NodeExecutionResult};
use riskflow_core::risk::parse_risk_level;
use riskflow_types::risk::RiskLevel;
use riskflow_types::workflow::NodeExecutionStatus;

use super::gate::evaluate_gate;

struct Scenario {
    name: &'static str,
    node_config: Value,
    input: Value,
    snapshot: Option<Value>,
    /// `None` expects a configuration error.
    status: Option<NodeExecutionStatus>,
    fields: Vec<(&'static str, Value)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfReport {
    pub iterations: usize,
    pub total_ms: f64,
    pub avg_us: f64,
    pub evals_per_sec: f64,
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "config threshold blocks at HIGH",
            node_config: json!({ "riskProfileCode": "default", "blockWhenRiskGte": "HIGH" }),
            input: json!({ "riskLevel": "HIGH" }),
            snapshot: Some(json!({ "SIGNAL_BLOCK_RISK_GTE": "EXTREME" })),
            status: Some(NodeExecutionStatus::Success),
            fields: vec![
                ("riskGateBlocked", json!(true)),
                ("blockedByRiskLevel", json!(true)),
                ("threshold", json!("HIGH")),
            ],
        },
        Scenario {
            name: "snapshot threshold unwraps value",
            node_config: json!({ "riskProfileCode": "default" }),
            input: json!({ "riskLevel": "HIGH" }),
            snapshot: Some(json!({
                "resolvedParams": { "SIGNAL_BLOCK_RISK_GTE": { "value": "EXTREME" } }
            })),
            status: Some(NodeExecutionStatus::Success),
            fields: vec![
                ("riskGateBlocked", json!(false)),
                ("threshold", json!("EXTREME")),
            ],
        },
        Scenario {
            name: "default threshold is HIGH",
            node_config: json!({ "riskProfileCode": "default" }),
            input: json!({ "hitScore": 30 }),
            snapshot: None,
            status: Some(NodeExecutionStatus::Success),
            fields: vec![
                ("riskLevel", json!("EXTREME")),
                ("threshold", json!("HIGH")),
                ("riskGateBlocked", json!(true)),
            ],
        },
        Scenario {
            name: "blocker rules classify values",
            node_config: json!({
                "riskProfileCode": "default",
                "blockWhenRiskGte": "EXTREME",
                "blockerRules": ["flags.allowBlock", "flags.noneValue", "flags.score"]
            }),
            input: json!({
                "riskLevel": "LOW",
                "flags": { "allowBlock": true, "noneValue": "none", "score": 1 }
            }),
            snapshot: None,
            status: Some(NodeExecutionStatus::Success),
            fields: vec![
                ("blockers", json!(["flags.allowBlock", "flags.score"])),
                ("blockerCount", json!(2)),
            ],
        },
        Scenario {
            name: "hard block fails the node",
            node_config: json!({
                "riskProfileCode": "default",
                "blockWhenRiskGte": "HIGH",
                "hardBlock": true
            }),
            input: json!({ "riskLevel": "EXTREME" }),
            snapshot: None,
            status: Some(NodeExecutionStatus::Failed),
            fields: vec![("riskGateBlocked", json!(true))],
        },
        Scenario {
            name: "soft block keeps running",
            node_config: json!({
                "riskProfileCode": "default",
                "blockWhenRiskGte": "HIGH",
                "hardBlock": false
            }),
            input: json!({ "riskLevel": "EXTREME" }),
            snapshot: None,
            status: Some(NodeExecutionStatus::Success),
            fields: vec![("riskGateBlocked", json!(true))],
        },
        Scenario {
            name: "pass clears degrade action",
            node_config: json!({ "riskProfileCode": "default", "degradeAction": "HOLD" }),
            input: json!({ "riskLevel": "LOW" }),
            snapshot: None,
            status: Some(NodeExecutionStatus::Success),
            fields: vec![
                ("riskGatePassed", json!(true)),
                ("degradeAction", Value::Null),
            ],
        },
        Scenario {
            name: "missing riskProfileCode is a config error",
            node_config: json!({ "blockWhenRiskGte": "HIGH" }),
            input: json!({ "riskLevel": "HIGH" }),
            snapshot: None,
            status: None,
            fields: Vec::new(),
        },
    ]
}

/// Every accepted spelling of each level must parse to the same value.
fn check_parser() -> ScenarioReport {
    let cases: [(RiskLevel, [Value; 6]); 4] = [
        (RiskLevel::Low, [json!("LOW"), json!("l"), json!("低"), json!(1), json!("1"), json!(" low ")]),
        (RiskLevel::Medium, [json!("medium"), json!("M"), json!("中"), json!(2), json!("2"), json!(1.6)]),
        (RiskLevel::High, [json!("High"), json!("h"), json!("高"), json!(3), json!("3"), json!("2.6")]),
        (RiskLevel::Extreme, [json!("EXTREME"), json!("E"), json!("极高"), json!(4), json!("4"), json!(9)]),
    ];
    let mismatches: Vec<String> = cases
        .iter()
        .flat_map(|(level, inputs)| {
            inputs
                .iter()
                .filter(move |input| parse_risk_level(input) != Some(*level))
                .map(move |input| format!("{input} -> expected {level}"))
        })
        .collect();
    ScenarioReport {
        name: "risk level parser canonicalizes".to_string(),
        passed: mismatches.is_empty(),
        detail: if mismatches.is_empty() {
            "24 representations".to_string()
        } else {
            mismatches.join("; ")
        },
    }
}

fn check(scenario: &Scenario, result: Result<NodeExecutionResult, NodeError>) -> Result<String, String> {
    let result = match (scenario.status, result) {
        (None, Err(e)) => return Ok(e.to_string()),
        (None, Ok(r)) => return Err(format!("expected a config error, got {}", r.status)),
        (Some(_), Err(e)) => return Err(e.to_string()),
        (Some(want), Ok(r)) if r.status != want => {
            return Err(format!("status {} (expected {want})", r.status));
        }
        (Some(_), Ok(r)) => r,
    };
    for (key, want) in &scenario.fields {
        let got = result.output.get(key).unwrap_or(&Value::Null);
        if got != want {
            return Err(format!("{key} = {got} (expected {want})"));
        }
    }
    Ok(result.status.to_string())
}

pub async fn run_scenarios() -> Vec<ScenarioReport> {
    let mut reports = vec![check_parser()];
    for scenario in scenarios() {
        let result = evaluate_gate(
            scenario.node_config.clone(),
            scenario.input.clone(),
            scenario.snapshot.clone(),
        )
        .await;
        let (passed, detail) = match check(&scenario, result) {
            Ok(detail) => (true, detail),
            Err(detail) => (false, detail),
        };
        reports.push(ScenarioReport {
            name: scenario.name.to_string(),
            passed,
            detail,
        });
    }
    reports
}

/// Time `iterations` gate evaluations, cycling through the valid scenarios.
pub async fn run_perf(iterations: usize) -> PerfReport {
    let cases: Vec<Scenario> = scenarios().into_iter().filter(|s| s.status.is_some()).collect();
    let started = Instant::now();
    for i in 0..iterations {
        let case = &cases[i % cases.len()];
        // Errors are impossible for these cases; only the time matters here.
        let _ = evaluate_gate(case.node_config.clone(), case.input.clone(), case.snapshot.clone()).await;
    }
    let total = started.elapsed();
    perf_report(iterations, total)
}

fn perf_report(iterations: usize, total: Duration) -> PerfReport {
    let secs = total.as_secs_f64();
    PerfReport {
        iterations,
        total_ms: secs * 1_000.0,
        avg_us: if iterations == 0 { 0.0 } else { secs * 1_000_000.0 / iterations as f64 },
        evals_per_sec: if secs > 0.0 { iterations as f64 / secs } else { 0.0 },
    }
}

pub async fn handle_smoke(perf: Option<usize>, json: bool) -> Result<()> {
    let reports = run_scenarios().await;
    let perf = match perf {
        Some(n) => Some(run_perf(n).await),
        None => None,
    };
    let failed = reports.iter().filter(|r| !r.passed).count();

    if json {
        let out = json!({ "scenarios": reports, "perf": perf });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Scenario").fg(Color::White),
            Cell::new("Result").fg(Color::White),
            Cell::new("Detail").fg(Color::White),
        ]);
        for report in &reports {
            let result = if report.passed {
                Cell::new("✓ pass").fg(Color::Green)
            } else {
                Cell::new("✗ fail").fg(Color::Red)
            };
            table.add_row(vec![
                Cell::new(&report.name).fg(Color::Cyan),
                result,
                Cell::new(&report.detail).fg(Color::DarkGrey),
            ]);
        }

        println!();
        println!("{table}");
        println!();
        println!(
            "  {} of {} scenarios passed",
            style(reports.len() - failed).bold(),
            reports.len()
        );
        if let Some(perf) = &perf {
            println!(
                "  {} evaluations in {:.1} ms ({:.1} µs each, {:.0}/s)",
                style(perf.iterations).bold(),
                perf.total_ms,
                perf.avg_us,
                perf.evals_per_sec
            );
        }
        println!();
    }

    if failed > 0 {
        bail!("{failed} smoke scenario(s) failed");
    }
    Ok(())
}
