//! Subcommand handlers. Each returns whether every requested item passed.

use anyhow::Result;
use filegate_core::config::{CacheConfig, GateConfig};
use filegate_core::is_sensitive_name;
use filegate_core::scan_cache::DetectionCache;
use filegate_security::{
    allows, format_report, format_screening_result, format_screening_result_compact,
    generate_report, DetectionResult, FileGate, GateDecision, ScreenOptions, ScreeningResult,
    ThreatLevel,
};

use crate::cli::{Cli, ScreenArgs};

/// Environment configuration with command-line overrides applied.
pub fn build_gate(cli: &Cli) -> Result<FileGate> {
    let mut config = GateConfig::from_env();
    if !cli.roots.is_empty() {
        config.allowed_roots = cli.roots.clone();
    }
    if let Some(base) = &cli.base {
        config.base_dir = Some(base.clone());
    }
    if let Some(signatures) = &cli.signatures {
        config.signatures_file = Some(signatures.clone());
    }
    FileGate::from_config(&config)
}

fn screen_options(gate: &FileGate, args: &ScreenArgs) -> ScreenOptions {
    ScreenOptions {
        check_extension_mismatch: !args.no_mismatch,
        check_executable_content: !args.no_executable,
        check_suspicious_patterns: !args.no_patterns,
        strict_mode: args.strict || gate.options().strict_mode,
    }
}

pub fn resolve(gate: &FileGate, requested: &str) -> bool {
    match gate.resolve(requested) {
        Ok(path) => {
            println!("{}", path);
            true
        }
        Err(e) => {
            eprintln!("⛔ {}: {}", requested, e);
            false
        }
    }
}

pub fn check_names(names: &[String]) -> bool {
    let mut all_clear = true;
    for name in names {
        if is_sensitive_name(name) {
            println!("⛔ {}: sensitive", name);
            all_clear = false;
        } else {
            println!("✅ {}: ok", name);
        }
    }
    all_clear
}

pub fn detect(gate: &FileGate, requested: &str, json: bool) -> Result<bool> {
    let path = match gate.resolve(requested) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("⛔ {}: {}", requested, e);
            return Ok(false);
        }
    };
    let detection = match gate.screener().classifier().analyze_file(&path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("⛔ {}: {}", requested, e);
            return Ok(false);
        }
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
    } else {
        println!("{}", format_detection(&path.to_string(), &detection));
    }
    Ok(true)
}

fn format_detection(path: &str, d: &DetectionResult) -> String {
    let mut output = format!(
        "{}: {} ({}, {}) confidence {:.2}\n",
        path, d.detected_type, d.mime, d.category, d.confidence
    );
    match &d.declared_extension {
        Some(ext) => output.push_str(&format!(
            "  extension .{} {}\n",
            ext,
            if d.extension_match { "matches" } else { "DOES NOT match" }
        )),
        None => output.push_str("  no extension\n"),
    }
    if d.is_executable {
        output.push_str("  executable content\n");
    }
    for warning in &d.warnings {
        output.push_str(&format!("  ⚠️  {}\n", warning));
    }
    output.trim_end().to_string()
}

/// Screen every path. Denied paths are reported on stderr and fail the run.
fn screen_all(
    gate: &FileGate,
    paths: &[String],
    opts: &ScreenOptions,
    mut cache: Option<&mut DetectionCache>,
) -> (Vec<GateDecision>, bool) {
    let mut decisions = Vec::with_capacity(paths.len());
    let mut all_resolved = true;
    for requested in paths {
        let decision = match cache.as_deref_mut() {
            Some(c) => gate.authorize_read_cached(requested, opts, c),
            None => gate.authorize_read_with(requested, opts),
        };
        match decision {
            Ok(d) => decisions.push(d),
            Err(e) => {
                eprintln!("⛔ {}: {}", requested, e);
                all_resolved = false;
            }
        }
    }
    (decisions, all_resolved)
}

/// The gate's decision plus, when `--allow-type` is given, the
/// [`allows`] rule: listed type and below medium threat.
fn passes_allow_list(decision: &GateDecision, allow_types: &[String]) -> bool {
    decision.is_allowed()
        && (allow_types.is_empty() || allows(decision.screening(), Some(allow_types)))
}

pub fn screen(
    gate: &FileGate,
    paths: &[String],
    args: &ScreenArgs,
    allow_types: &[String],
    use_cache: bool,
    json: bool,
    compact: bool,
) -> Result<bool> {
    let opts = screen_options(gate, args);
    let mut cache = use_cache.then(|| DetectionCache::open(&CacheConfig::from_env()));
    let (decisions, all_resolved) = screen_all(gate, paths, &opts, cache.as_mut());
    if let Some(cache) = cache.as_mut() {
        if let Err(e) = cache.save() {
            tracing::warn!("Failed to save detection cache: {:#}", e);
        }
    }

    let mut all_passed = all_resolved;
    let mut results: Vec<&ScreeningResult> = Vec::with_capacity(decisions.len());
    for decision in &decisions {
        let result = decision.screening();
        let ok = passes_allow_list(decision, allow_types);
        all_passed &= ok;
        if !json {
            let line = if compact {
                format_screening_result_compact(result)
            } else {
                format_screening_result(result)
            };
            println!("{}", line);
            if decision.is_allowed() && !ok {
                if result.threat_level >= ThreatLevel::Medium {
                    println!("     └─ threat {} is too high for an allow-listed read", result.threat_level);
                } else {
                    println!("     └─ type {} is not in the allow list", result.detected_type);
                }
            }
        }
        results.push(result);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(all_passed)
}

pub fn report(gate: &FileGate, paths: &[String], args: &ScreenArgs, json: bool) -> Result<bool> {
    let opts = screen_options(gate, args);
    let (decisions, all_resolved) = screen_all(gate, paths, &opts, None);
    let results: Vec<ScreeningResult> = decisions
        .into_iter()
        .map(|d| match d {
            GateDecision::Allowed { screening, .. } | GateDecision::Blocked { screening, .. } => {
                screening
            }
        })
        .collect();
    let report = generate_report(&results);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(&report));
    }
    Ok(all_resolved && report.failed == 0)
}

pub fn signatures(gate: &FileGate, json: bool) -> Result<bool> {
    let registry = gate.screener().classifier().registry();
    if json {
        let all: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(true);
    }
    for sig in registry.iter() {
        let exts = if sig.extensions.is_empty() {
            "-".to_string()
        } else {
            sig.extensions.join(",")
        };
        println!(
            "{:<11} {:<11} {}{:<50} {}",
            sig.type_tag,
            sig.category.to_string(),
            if sig.is_executable { "⚠️ " } else { "" },
            sig.mime,
            exts
        );
    }
    Ok(true)
}
