//! Bounded-concurrency execution of `parallel` blocks.
//!
//! Each direct child statement becomes one task running against its own
//! clone of the environment, so sibling writes never interleave and a
//! task observes the world exactly as it was when the block started.
//! Results merge back in child order: output, outcomes, and errors are
//! deterministic no matter how the scheduler interleaved the tasks.

use super::{Flow, Interpreter};
use crate::env::ScopeId;
use crate::error::{EvalError, EvalErrorKind};
use crate::report::{OutcomeKind, Report};
use gatekeep_syntax::Stmt;
use rayon::prelude::*;

impl Interpreter {
    pub(crate) fn exec_parallel(
        &mut self,
        body: &[Stmt],
        scope: ScopeId,
    ) -> Result<Flow, EvalError> {
        if body.is_empty() {
            return Ok(Flow::Normal);
        }

        let subs: Vec<Interpreter> = body
            .iter()
            .map(|_| {
                let mut sub = self.clone();
                sub.buffered = true;
                sub.report = Report::new();
                sub.output = Vec::new();
                sub
            })
            .collect();

        let run_all = || -> Vec<(Result<Flow, EvalError>, Interpreter)> {
            body.par_iter()
                .zip(subs.into_par_iter())
                .map(|(stmt, mut sub)| {
                    let result = sub.exec_stmt(stmt, scope);
                    (result, sub)
                })
                .collect()
        };

        // A bounded pool caps concurrency; 0 leaves it to rayon (one
        // worker per core).
        let results = if self.config.max_parallel_tasks > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.max_parallel_tasks)
                .build()
                .map_err(|e| {
                    EvalError::io(format!("failed to build thread pool: {}", e), None)
                })?;
            pool.install(run_all)
        } else {
            run_all()
        };

        // Merge in child-statement order. Every task ran to completion;
        // a failing sibling never cancels the others.
        let mut first_error: Option<EvalError> = None;
        for (stmt, (result, sub)) in body.iter().zip(results) {
            for line in sub.output {
                self.emit(line);
            }
            self.report.extend(sub.report);

            match result {
                // `break`/`continue` do not escape a parallel block.
                Ok(_) => {}
                Err(e) if matches!(e.kind, EvalErrorKind::NonZeroExit { .. }) => {
                    self.push_outcome(OutcomeKind::Block, Some(e.message.clone()), stmt);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(Flow::Normal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{ScriptedRunner, run_program_sharing, run_program_with};
    use crate::report::{OutcomeKind, Verdict};
    use std::sync::Arc;

    #[test]
    fn outcomes_merge_in_child_order() {
        // Whatever the interleaving, the report lists child results in
        // source order.
        let interp = run_program_with(
            r#"
            parallel {
                block "first"
                warn "second"
                print "third"
            }
            "#,
            ScriptedRunner::ok(),
        );
        let outcomes = &interp.report().outcomes;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].kind, OutcomeKind::Block);
        assert_eq!(outcomes[0].message.as_deref(), Some("first"));
        assert_eq!(outcomes[1].kind, OutcomeKind::Warn);
        assert!(outcomes[0].origin < outcomes[1].origin);
    }

    #[test]
    fn output_merges_in_child_order() {
        let interp = run_program_with(
            r#"
            parallel {
                print "a"
                print "b"
                print "c"
            }
            "#,
            ScriptedRunner::ok(),
        );
        assert_eq!(interp.output(), ["a", "b", "c"]);
    }

    #[test]
    fn failing_sibling_does_not_cancel_others() {
        let runner = Arc::new(ScriptedRunner::failing_on("make lint"));
        let interp = run_program_sharing(
            r#"
            parallel {
                run "make lint"
                run "make test"
                run "make docs"
            }
            "#,
            runner.clone(),
        );
        assert_eq!(interp.report().verdict(), Verdict::Blocked);
        // Only the failing command contributes an outcome.
        assert_eq!(interp.report().outcomes.len(), 1);
        assert!(
            interp.report().outcomes[0]
                .message
                .as_deref()
                .unwrap()
                .contains("make lint")
        );
        // All three siblings ran despite the failure.
        let mut calls = runner.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, ["make docs", "make lint", "make test"]);
    }

    #[test]
    fn sibling_env_writes_are_isolated() {
        let interp = run_program_with(
            r#"
            let x = "before"
            parallel {
                let x = "task"
                print "ok"
            }
            print x
            "#,
            ScriptedRunner::ok(),
        );
        assert_eq!(interp.output(), ["ok", "before"]);
    }

    #[test]
    fn nested_statements_run_inside_parallel() {
        let interp = run_program_with(
            r#"
            parallel {
                foreach [1, 2] { n in print n }
                if true { print "branch" }
            }
            "#,
            ScriptedRunner::ok(),
        );
        assert_eq!(interp.output(), ["1", "2", "branch"]);
    }
}
