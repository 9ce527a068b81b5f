// CLI commands for running code against the execution service
use anyhow::{bail, Context, Result};
use codelab_common::types::{TestCase, VerdictStatus};
use codelab_common::{EngineConfig, ValidationPolicy};
use codelab_engine::{language, ExecutionEngine, ReferenceSolution};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// One entry of a test file
#[derive(Debug, Deserialize)]
struct TestCaseFile {
    input: String,
    output: String,
}

/// Load test cases from a JSON array of {"input", "output"}
fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    let entries: Vec<TestCaseFile> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test file {}", path.display()))?;

    if entries.is_empty() {
        bail!("Test file {} contains no test cases", path.display());
    }

    Ok(entries
        .into_iter()
        .map(|e| TestCase::new(e.input, e.output))
        .collect())
}

/// Parse a `language=path` argument
fn parse_solution_arg(arg: &str) -> Result<(String, String)> {
    let Some((language, path)) = arg.split_once('=') else {
        bail!("Invalid solution '{}', expected language=path", arg);
    };
    let language = language.trim();
    let path = path.trim();
    if language.is_empty() || path.is_empty() {
        bail!("Invalid solution '{}', expected language=path", arg);
    }
    Ok((language.to_string(), path.to_string()))
}

fn load_solutions(args: &[String]) -> Result<Vec<ReferenceSolution>> {
    args.iter()
        .map(|arg| {
            let (language, path) = parse_solution_arg(arg)?;
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read solution {}", path))?;
            Ok(ReferenceSolution::new(language, source))
        })
        .collect()
}

fn engine() -> Result<ExecutionEngine> {
    let config = EngineConfig::from_env();
    ExecutionEngine::with_judge0(config).context("Failed to build execution engine")
}

fn verdict_label(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Pass => "✅ pass",
        VerdictStatus::Fail => "❌ fail",
        VerdictStatus::Error => "⚠️  error",
    }
}

/// Print the supported languages
pub fn list_languages() {
    println!("{:<12} {:>4}  aliases", "language", "id");
    for lang in language::supported_languages() {
        println!("{:<12} {:>4}  {}", lang.name, lang.id, lang.aliases.join(", "));
    }
}

/// Run a source file against a test file, returns whether every test passed
pub async fn run(
    language: &str,
    source: &Path,
    tests: &Path,
    timeout_ms: Option<u64>,
) -> Result<bool> {
    let source_code = fs::read_to_string(source)
        .with_context(|| format!("Failed to read source {}", source.display()))?;
    let test_cases = load_test_cases(tests)?;

    println!("🚀 Running {} test case(s) in {}", test_cases.len(), language);

    let outcome = engine()?
        .execute_submission(
            &source_code,
            language,
            &test_cases,
            timeout_ms.map(Duration::from_millis),
        )
        .await?;

    for verdict in &outcome.verdicts {
        let raw = &verdict.raw_result;
        println!(
            "  #{:<3} {:<10} {}",
            verdict.test_case_index + 1,
            verdict_label(verdict.status),
            raw.status_description
        );
        if !verdict.passed() && !raw.stderr.is_empty() {
            println!("        stderr: {}", raw.stderr.trim_end());
        }
        if !verdict.passed() && !raw.compile_output.is_empty() {
            println!("        compile: {}", raw.compile_output.trim_end());
        }
    }

    println!(
        "\n{} / {} passed (batch {})",
        outcome.passed_count(),
        outcome.verdicts.len(),
        outcome.batch_id
    );

    Ok(outcome.all_passed)
}

/// Validate reference solutions, returns whether all of them passed
pub async fn validate(solutions: &[String], tests: &Path, report_all: bool) -> Result<bool> {
    let solutions = load_solutions(solutions)?;
    let test_cases = load_test_cases(tests)?;
    let policy = if report_all {
        ValidationPolicy::ReportAll
    } else {
        ValidationPolicy::FailFast
    };

    println!(
        "🔍 Validating {} reference solution(s) against {} test case(s)",
        solutions.len(),
        test_cases.len()
    );

    let report = engine()?
        .validate_with_policy(&solutions, &test_cases, policy)
        .await?;

    for language in &report.validated {
        println!("  ✅ {}", language);
    }
    for failure in &report.failures {
        println!(
            "  ❌ {}: testcase {} failed ({})",
            failure.language,
            failure.test_case_index + 1,
            failure.status_description
        );
    }

    if report.is_valid() {
        println!("\n✅ Problem is valid");
    } else {
        println!("\n❌ Problem rejected");
    }

    Ok(report.is_valid())
}
