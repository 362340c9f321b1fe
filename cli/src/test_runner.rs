use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use expander::{ScriptEngine, Session, Settings};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Target format identifier. Defaults to "html".
    #[serde(default = "default_target")]
    pub target: String,

    /// Default format specifier applied to plain numbers.
    #[serde(default)]
    pub default_format: Option<String>,

    /// Expected exact expansion (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected expansion error: its Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Expected error code (`scan`, `eval`, `unit`, `format`, `include`).
    #[serde(default)]
    pub expect_code: Option<String>,

    /// Extra files written next to the document before expansion,
    /// keyed by path relative to the include directory.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

fn default_target() -> String {
    "html".to_string()
}

/// Parse a `.test.md` file into its TOML config and Markdown source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let Some(after_open) = content.strip_prefix("---") else {
        return Err("missing opening --- frontmatter delimiter".into());
    };
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_suffix(".test.md"))
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let outcome = match expand_fixture(&config, source) {
        Ok(outcome) => check(&config, outcome),
        Err(reason) => Some(reason),
    };

    match outcome {
        Some(reason) => fail(description, reason),
        None => TestResult {
            path: path.to_path_buf(),
            description,
            outcome: TestOutcome::Pass,
        },
    }
}

/// Lay the document and its `files` out in a scratch directory and expand it.
/// The outer `Err` is a harness failure; the inner result is the expansion's.
fn expand_fixture(config: &TestConfig, source: &str) -> Result<Result<String, (String, &'static str)>, String> {
    let dir = tempfile::tempdir().map_err(|e| format!("cannot create scratch dir: {}", e))?;
    for (name, contents) in &config.files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
        }
        std::fs::write(&path, contents).map_err(|e| format!("cannot write {}: {}", name, e))?;
    }
    let main = dir.path().join("main.md");
    std::fs::write(&main, source).map_err(|e| format!("cannot write document: {}", e))?;

    let mut settings = Settings {
        target: config.target.clone(),
        base_dir: Some(dir.path().to_path_buf()),
        ..Settings::default()
    };
    settings.format.default = config.default_format.clone();

    let mut session =
        Session::new(ScriptEngine::new(), settings).map_err(|e| format!("invalid settings: {}", e))?;
    Ok(session
        .expand_file(&main)
        .map(|expansion| expansion.to_string())
        .map_err(|e| (e.to_string(), e.kind.code())))
}

/// Compare an expansion result against the fixture's expectations.
/// Returns `Some(reason)` on mismatch.
fn check(config: &TestConfig, result: Result<String, (String, &'static str)>) -> Option<String> {
    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected), _, Err((message, code))) => {
            if !message.contains(expected.as_str()) {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ))
            } else if let Some(expected_code) = &config.expect_code
                && expected_code != code
            {
                Some(format!(
                    "expected error code `{}`, got `{}`: {}",
                    expected_code, code, message
                ))
            } else {
                None
            }
        }
        (Some(expected), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but expansion succeeded",
            expected
        )),
        (None, _, Err((message, code))) => Some(format!("unexpected {} error: {}", code, message)),
        (None, Some(expected), Ok(actual)) => {
            let actual = actual.trim();
            let expected = expected.trim();
            if actual == expected {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                ))
            }
        }
        (None, None, Ok(_)) => None,
    }
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".test.md"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only tests in those categories run.
/// Returns the exit code: 0 when everything passes.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        filter_categories(all, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(if cat.is_empty() { "(root)" } else { cat.as_str() }, "1", no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

fn filter_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }
    let mut filtered = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let prefix = format!("{}/", req);
        let matching: Vec<&String> = all
            .keys()
            .filter(|cat| cat.as_str() == req || cat.starts_with(&prefix))
            .collect();
        if matching.is_empty() {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        for cat in matching {
            filtered.insert(cat.clone(), all[cat].clone());
        }
    }
    filtered
}
