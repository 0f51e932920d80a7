use stackflow_core::config::AppConfig;
use stackflow_engine::graph::Graph;
use stackflow_engine::WorkflowValidation;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Print one line per check and return whether the workflow can run.
pub fn run_checks(validation: &WorkflowValidation, graph: Option<&Graph>, config: &AppConfig) -> bool {
    let checks = collect(validation, graph, config);

    let mut ok_count = 0;
    let mut fail_count = 0;
    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count == 0
}

fn collect(validation: &WorkflowValidation, graph: Option<&Graph>, config: &AppConfig) -> Vec<CheckResult> {
    let mut checks = vec![check_definition(validation, graph)];
    // Graph checks are meaningless until the definition loads.
    if validation.load_errors.is_empty() {
        checks.push(check_structure(validation));
        checks.push(check_types(validation));
    }
    checks.push(check_engine(config));
    checks
}

fn check_definition(validation: &WorkflowValidation, graph: Option<&Graph>) -> CheckResult {
    if validation.load_errors.is_empty() {
        let detail = match graph {
            Some(g) => format!("{} nodes, {} edges", g.node_count(), g.edges().len()),
            None => "Loaded".into(),
        };
        CheckResult {
            label: "Definition".into(),
            ok: true,
            detail,
        }
    } else {
        let errors: Vec<String> = validation.load_errors.iter().map(|e| e.to_string()).collect();
        CheckResult {
            label: "Definition".into(),
            ok: false,
            detail: errors.join("; "),
        }
    }
}

fn check_structure(validation: &WorkflowValidation) -> CheckResult {
    match &validation.report.structural {
        None => CheckResult {
            label: "Structure".into(),
            ok: true,
            detail: "Acyclic, single writer per input, output reachable".into(),
        },
        Some(e) => CheckResult {
            label: "Structure".into(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

fn check_types(validation: &WorkflowValidation) -> CheckResult {
    let mismatches = &validation.report.type_mismatches;
    if mismatches.is_empty() {
        CheckResult {
            label: "Port types".into(),
            ok: true,
            detail: "All edges compatible".into(),
        }
    } else {
        let lines: Vec<String> = mismatches.iter().map(|m| m.to_string()).collect();
        CheckResult {
            label: "Port types".into(),
            ok: false,
            detail: lines.join("; "),
        }
    }
}

fn check_engine(config: &AppConfig) -> CheckResult {
    CheckResult {
        label: "Engine".into(),
        ok: true,
        detail: format!(
            "timeout {}s per node, {} execution, {} generation retries",
            config.engine.node_timeout_secs,
            if config.engine.parallel_tiers { "tiered" } else { "sequential" },
            config.retry.max_retries
        ),
    }
}
