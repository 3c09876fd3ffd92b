use gatekeep_syntax::ast::{ExprKind, MatchPattern, OutcomeAction, Severity, StmtKind};
use gatekeep_syntax::{parse, tokenize};

fn parse_src(source: &str) -> Vec<gatekeep_syntax::Stmt> {
    parse(tokenize(source).unwrap()).unwrap()
}

#[test]
fn test_simple_run() {
    let statements = parse_src(r#"run "echo hello""#);
    assert_eq!(statements.len(), 1);
    match &statements[0].kind {
        StmtKind::Run { command } => {
            assert!(matches!(&command.kind, ExprKind::String(s) if s == "echo hello"));
        }
        _ => panic!("Expected Run statement"),
    }
}

#[test]
fn test_block_if_with_message() {
    let statements = parse_src(r#"block if file("a").size > 1MB message "Too large""#);
    match &statements[0].kind {
        StmtKind::Outcome {
            action,
            condition,
            message,
        } => {
            assert_eq!(*action, OutcomeAction::Block);
            assert!(condition.is_some());
            assert_eq!(message.as_deref(), Some("Too large"));
        }
        _ => panic!("Expected Outcome statement"),
    }
}

#[test]
fn test_unconditional_warn() {
    let statements = parse_src(r#"warn "branch is stale""#);
    match &statements[0].kind {
        StmtKind::Outcome {
            action,
            condition,
            message,
        } => {
            assert_eq!(*action, OutcomeAction::Warn);
            assert!(condition.is_none());
            assert_eq!(message.as_deref(), Some("branch is stale"));
        }
        _ => panic!("Expected Outcome statement"),
    }
}

#[test]
fn test_realistic_script() {
    let source = r#"
        # pre-commit policy
        let limit = 500

        group size critical {
            foreach git.files.staged matching "*.rs" {
                f in
                block if f.lines > limit message "file ${f.name} is too long"
            }
        }

        group style warning {
            run "cargo fmt --check"
        }

        match git.branch {
            "main" -> block "no direct commits to main"
            "release/*" -> warn "committing to a release branch"
            _ -> print "branch ok"
        }
    "#;
    let statements = parse_src(source);
    assert_eq!(statements.len(), 4);

    let StmtKind::Group { severity, body, .. } = &statements[1].kind else {
        panic!("Expected Group");
    };
    assert_eq!(*severity, Severity::Critical);
    assert!(matches!(body[0].kind, StmtKind::Foreach { .. }));

    let StmtKind::Match { arms, .. } = &statements[3].kind else {
        panic!("Expected Match");
    };
    assert!(matches!(&arms[1].pattern, MatchPattern::Glob(p) if p == "release/*"));
}

#[test]
fn test_parallel_preserves_child_order() {
    let statements = parse_src(
        r#"
        parallel {
            run "cargo test"
            run "cargo clippy"
        }
        "#,
    );
    let StmtKind::Parallel { body } = &statements[0].kind else {
        panic!("Expected Parallel");
    };
    assert_eq!(body.len(), 2);
    assert!(body[0].id < body[1].id);
}

#[test]
fn test_macro_roundtrip_through_program() {
    let statements = parse_src(
        r#"
        macro max_lines(n) {
            block if 10 > n
        }
        @max_lines(100)
        "#,
    );
    assert!(matches!(statements[0].kind, StmtKind::MacroDef { .. }));
    let StmtKind::MacroCall {
        namespace,
        name,
        args,
    } = &statements[1].kind
    else {
        panic!("Expected MacroCall");
    };
    assert!(namespace.is_none());
    assert_eq!(name, "max_lines");
    assert_eq!(args.len(), 1);
}

#[test]
fn test_nested_else_if_chain() {
    let statements = parse_src(
        r#"
        if a { print "a" }
        else if b { print "b" }
        else { print "c" }
        "#,
    );
    let StmtKind::If { else_body, .. } = &statements[0].kind else {
        panic!("Expected If");
    };
    let nested = else_body.as_ref().unwrap();
    assert!(matches!(&nested[0].kind, StmtKind::If { else_body, .. } if else_body.is_some()));
}

#[test]
fn test_missing_brace_is_a_parse_error() {
    let tokens = tokenize("parallel run \"x\"").unwrap();
    let err = parse(tokens).unwrap_err();
    assert!(err.to_string().contains("'{'"));
}
