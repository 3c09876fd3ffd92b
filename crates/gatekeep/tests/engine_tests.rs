//! End-to-end runs through the public [`Engine`] API.

use gatekeep::{Engine, RunError, StaticFetcher, Verdict};

fn run(source: &str) -> gatekeep::RunResult {
    Engine::new().run_source(source).expect("run")
}

#[test]
fn clean_script_passes() {
    let result = run(r#"
        let limit = 10
        allow if 3 < limit
    "#);
    assert_eq!(result.report.verdict(), Verdict::Passed);
}

#[test]
fn block_wins_over_everything_after_it() {
    let result = run(r#"
        block "no direct pushes"
        warn "minor nit"
        print "still runs"
    "#);
    assert_eq!(result.report.verdict(), Verdict::Blocked);
    assert_eq!(result.output, vec!["still runs".to_string()]);

    let blocks: Vec<_> = result.report.blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].message.as_deref(), Some("no direct pushes"));
}

#[test]
fn conditional_warn_with_message() {
    let result = run(r#"
        let count = 5
        warn if count > 3 message "too many: ${count}"
    "#);
    assert_eq!(result.report.verdict(), Verdict::Warned);
    let warnings: Vec<_> = result.report.warnings().collect();
    assert_eq!(warnings[0].message.as_deref(), Some("too many: 5"));
}

#[test]
fn parse_error_is_an_errored_run() {
    let err = Engine::new().run_source("let = 3").unwrap_err();
    assert!(matches!(err, RunError::Parse(_)));
    assert_eq!(err.verdict(), Verdict::Errored);
}

#[test]
fn unknown_macro_fails_before_any_statement_runs() {
    let err = Engine::new()
        .run_source("print \"should not print\"\n@missing")
        .unwrap_err();
    assert!(matches!(err, RunError::Resolve(_)));
}

#[test]
fn render_points_at_the_failing_line() {
    let source = "let x = 1\nlet = 2\n";
    let err = Engine::new().run_source(source).unwrap_err();
    let rendered = err.render(source);
    assert!(rendered.contains("let = 2"), "rendered: {rendered}");
}

#[test]
fn imports_resolve_through_the_fetcher() {
    let engine = Engine::new().with_fetcher(
        StaticFetcher::new()
            .with_path("checks.gk", "macro nits { warn \"imported nit\" }"),
    );
    let result = engine
        .run_source("import \"checks.gk\" as checks\n@checks.nits")
        .unwrap();
    assert_eq!(result.report.verdict(), Verdict::Warned);
}

#[test]
fn dir_fetcher_reads_imports_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("shared.gk"),
        "macro deny { block \"denied from import\" }",
    )
    .unwrap();

    let engine = Engine::new().with_fetcher(gatekeep::DirFetcher::new(
        dir.path(),
        dir.path().join("packages"),
    ));
    let result = engine
        .run_source("import \"shared.gk\"\n@deny")
        .unwrap();
    assert_eq!(result.report.verdict(), Verdict::Blocked);
}

#[test]
fn git_context_is_reachable_from_scripts() {
    let snapshot = gatekeep::gatekeep_git::GitSnapshot {
        branch: "main".into(),
        ..Default::default()
    };
    let result = Engine::new()
        .with_git(snapshot)
        .run_source(
            r#"
            warn if git.branch.is_main message "pushing straight to ${git.branch.name}"
            print git.files.all.length
            "#,
        )
        .unwrap();
    assert_eq!(result.report.verdict(), Verdict::Warned);
    assert_eq!(result.output, vec!["0".to_string()]);
}

#[test]
fn warning_group_downgrades_blocks() {
    let result = run(r#"
        group style warning {
            block "tabs are forbidden"
        }
    "#);
    assert_eq!(result.report.verdict(), Verdict::Warned);
}

#[test]
fn disabled_group_is_skipped_entirely() {
    let result = run(r#"
        group legacy disabled {
            block "would fail"
            print "would print"
        }
    "#);
    assert_eq!(result.report.verdict(), Verdict::Passed);
    assert!(result.output.is_empty());
}

#[test]
fn uncaught_failing_command_blocks_but_does_not_abort() {
    let result = run(r#"
        run "exit 3"
        print "after"
    "#);
    assert_eq!(result.report.verdict(), Verdict::Blocked);
    assert_eq!(result.output, vec!["after".to_string()]);
}

#[test]
fn try_catch_turns_a_failing_command_into_a_value() {
    let result = run(r#"
        try {
            run "exit 3"
        } catch err {
            print err.kind
        }
    "#);
    assert_eq!(result.report.verdict(), Verdict::Passed);
    assert_eq!(result.output, vec!["command failed".to_string()]);
}

#[test]
fn parallel_output_is_deterministic() {
    let result = run(r#"
        parallel {
            print "first"
            print "second"
            print "third"
        }
    "#);
    assert_eq!(
        result.output,
        vec!["first".to_string(), "second".to_string(), "third".to_string()]
    );
}

#[test]
fn verdict_exit_codes_follow_hook_convention() {
    assert_eq!(run("allow \"fine\"").report.verdict().exit_code(), 0);
    assert_eq!(run("warn \"hm\"").report.verdict().exit_code(), 0);
    assert_eq!(run("block \"no\"").report.verdict().exit_code(), 1);
}
