// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Async tree-walking interpreter for Ember.
//!
//! Lowers the AST straight onto `ember-rt`: `eval_expr`/`exec_stmt` are
//! real `async fn`s that `.await` the runtime's own channel and scheduler
//! futures, so a `spawn` statement becomes an actual `Scheduler::spawn`
//! call rather than a separate bytecode or native-codegen step.

mod env;
mod interp;
pub mod value;

pub use interp::{EvalError, Interpreter};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ast::decl::Decl;
    use ember_rt::Scheduler;

    fn parse(src: &str) -> Vec<Decl> {
        let lexed = ember_lexer::Lexer::new(src).tokenize();
        assert!(lexed.is_ok(), "lex errors: {:?}", lexed.errors);
        let parsed = ember_parser::Parser::new(lexed.tokens).parse();
        assert!(parsed.is_ok(), "parse errors: {:?}", parsed.errors);
        parsed.decls
    }

    fn run_main(src: &str) -> Value {
        let decls = parse(src);
        let interp = Interpreter::new(&decls);
        let scheduler = Scheduler::new();
        let handle = scheduler.spawn(
            async move { interp.call("main", vec![]).await },
            ember_rt::Priority::Normal,
        );
        scheduler.run().expect("scheduler run should succeed");
        handle
            .result()
            .expect("main should have completed")
            .expect("main should not error")
    }

    #[test]
    fn runs_arithmetic() {
        let result = run_main("func main() { return 2 + 3 * 4; }");
        assert_eq!(result.as_int(), Some(14));
    }

    #[test]
    fn runs_producer_consumer_pipeline() {
        let result = run_main(
            r#"
            func producer(ch) {
                let i = 0;
                while i < 5 {
                    send(ch, i);
                    i = i + 1;
                }
                close(ch);
            }

            func main() {
                let ch = channel(2);
                spawn {
                    producer(ch);
                }
                let total = 0;
                let (v, ok) = recv(ch);
                while ok {
                    total = total + v;
                    let (v2, ok2) = recv(ch);
                    v = v2;
                    ok = ok2;
                }
                return total;
            }
            "#,
        );
        assert_eq!(result.as_int(), Some(0 + 1 + 2 + 3 + 4));
    }

    #[test]
    fn select_picks_ready_case_in_order() {
        let result = run_main(
            r#"
            func main() {
                let a = channel(1);
                let b = channel(1);
                send(a, 1);
                let picked = 0;
                select {
                    recv(a) as (v, ok) => { picked = 1; }
                    recv(b) as (v, ok) => { picked = 2; }
                }
                return picked;
            }
            "#,
        );
        assert_eq!(result.as_int(), Some(1));
    }

    #[test]
    fn cancel_stops_a_sleeping_task() {
        let result = run_main(
            r#"
            func sleeper() {
                sleep(100);
                return 1;
            }

            func main() {
                let t = spawn Low { sleep(100); };
                cancel(t);
                return 0;
            }
            "#,
        );
        assert_eq!(result.as_int(), Some(0));
    }
}
