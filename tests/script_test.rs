use std::time::{Duration, Instant};

use codebuddy_script::{execute_script, ScriptConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    // tracing_subscriberの初期化
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn verbose() -> ScriptConfig {
    ScriptConfig {
        verbose: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_plain_script_succeeds() {
    let source = r#"
        let total = 0
        for (let i = 0; i < 10; i += 1) {
            total += i
        }
        function greet(name) { return `hello ${name}` }
        print(greet("world"))
        let point = {x: 1, y: 2}
        point.z = point.x + point.y
        print(point)
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, vec![r#"hello world"#, r#"{"x":1,"y":2,"z":3}"#]);
    assert_eq!(result.return_value, None);
}

#[tokio::test]
async fn test_return_value_is_the_returned_expression() {
    let result = execute_script(
        "let xs = range(4)\nreturn {count: len(xs), last: xs[3], name: \"ok\", nested: [true, null]}",
        ScriptConfig::default(),
    )
    .await;
    assert_eq!(
        result.return_value,
        Some(json!({"count": 4, "last": 3, "name": "ok", "nested": [true, null]}))
    );
}

#[tokio::test]
async fn test_return_stops_the_script() {
    let result = execute_script("print(1)\nreturn 2\nprint(3)", ScriptConfig::default()).await;
    assert_eq!(result.output, vec!["1"]);
    assert_eq!(result.return_value, Some(json!(2)));
}

#[tokio::test]
async fn test_same_script_gives_same_output() {
    let source = r#"
        let words = split("the quick brown fox", " ")
        for (word in words) {
            print(upper(word) + " " + str(len(word)))
        }
        print(join(sort(words), ","))
    "#;
    let first = execute_script(source, ScriptConfig::default()).await;
    let second = execute_script(source, ScriptConfig::default()).await;
    assert!(first.success);
    assert_eq!(first.output, second.output);
    assert_eq!(first.output.last().map(String::as_str), Some("brown,fox,quick,the"));
}

#[tokio::test]
async fn test_range_overloads() {
    let result = execute_script(
        "return [range(5), range(2, 5), range(5, 0, -1), range(3, 3), range(0, 10, 0)]",
        ScriptConfig::default(),
    )
    .await;
    assert_eq!(
        result.return_value,
        Some(json!([[0, 1, 2, 3, 4], [2, 3, 4], [5, 4, 3, 2, 1], [], []]))
    );
}

#[tokio::test]
async fn test_map_calls_back_in_index_order() {
    let source = r#"
        let order = []
        let doubled = map([1, 2, 3], x => {
            push(order, x)
            print("visit " + x)
            return x * 2
        })
        return {doubled: doubled, order: order}
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(
        result.return_value,
        Some(json!({"doubled": [2, 4, 6], "order": [1, 2, 3]}))
    );
    assert_eq!(result.output, vec!["visit 1", "visit 2", "visit 3"]);
}

#[tokio::test]
async fn test_string_repetition() {
    let result = execute_script("return \"ab\" * 3", ScriptConfig::default()).await;
    assert_eq!(result.return_value, Some(json!("ababab")));
}

#[tokio::test]
async fn test_truthiness() {
    let source = r#"
        let empty_array = []
        let empty_dict = {}
        let values = [0, "", null, false, empty_array, empty_dict, 1, "x"]
        let seen = []
        for (value in values) {
            if (value) { push(seen, true) } else { push(seen, false) }
        }
        return seen
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(
        result.return_value,
        Some(json!([false, false, false, false, true, true, true, true]))
    );
}

#[tokio::test]
async fn test_caught_string_throw_keeps_its_message() {
    let result = execute_script(
        "try { throw \"boom\" } catch (e) { return e.message }",
        ScriptConfig::default(),
    )
    .await;
    assert_eq!(result.return_value, Some(json!("boom")));
}

#[tokio::test]
async fn test_uncaught_throw_fails_the_script() {
    let string = execute_script("print(\"a\")\nthrow \"boom\"", ScriptConfig::default()).await;
    assert!(!string.success);
    assert_eq!(string.error.as_deref(), Some("boom"));
    assert_eq!(string.output, vec!["a"]);

    let object = execute_script(
        "throw {code: 42, message: \"structured\"}",
        ScriptConfig::default(),
    )
    .await;
    assert_eq!(object.error.as_deref(), Some("structured"));
}

#[tokio::test]
async fn test_finally_runs_exactly_once() {
    let source = r#"
        let runs = 0
        function normal() { try { let x = 1 } finally { runs += 1 } }
        function throws() { try { throw "x" } catch (e) { } finally { runs += 1 } }
        function returns() { try { return 1 } finally { runs += 1 } }
        function returnsFromCatch() { try { throw "x" } catch (e) { return 2 } finally { runs += 1 } }
        normal()
        throws()
        returns()
        returnsFromCatch()
        return runs
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(result.return_value, Some(json!(4)));
}

#[tokio::test]
async fn test_finally_runs_when_error_escapes() {
    let result = execute_script(
        "try { throw \"escaped\" } finally { print(\"cleanup\") }",
        ScriptConfig::default(),
    )
    .await;
    assert!(!result.success);
    assert_eq!(result.output, vec!["cleanup"]);
    assert_eq!(result.error.as_deref(), Some("escaped"));
}

#[tokio::test]
async fn test_tight_loop_times_out() {
    let config = ScriptConfig {
        timeout: Duration::from_millis(10),
        ..Default::default()
    };
    let started = Instant::now();
    let result = execute_script("let i = 0\nwhile (true) { i += 1 }", config).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("timeout"));
    assert!(started.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test]
async fn test_timeout_cannot_be_caught() {
    let config = ScriptConfig {
        timeout: Duration::from_millis(10),
        ..Default::default()
    };
    let result = execute_script(
        "try { while (true) { } } catch (e) { return \"caught\" } finally { print(\"finally\") }",
        config,
    )
    .await;
    assert!(!result.success);
    assert_eq!(result.output, vec!["finally"]);
}

#[tokio::test]
async fn test_skipped_test_blocks_do_not_run() {
    let source = "test \"broken\" { print(\"ran\")\nassert 1 == 2 }\nreturn 1";
    let result = execute_script(source, ScriptConfig::default()).await;
    assert!(result.success);
    assert!(result.output.is_empty());
    assert_eq!(result.test_results, None);
    assert_eq!(result.return_value, Some(json!(1)));
}

#[tokio::test]
async fn test_verbose_runs_test_blocks() {
    let source = r#"
        function add(a, b) { return a + b }
        test "adds" { assert add(1, 2) == 3 }
        test "fails" { assert add(1, 2) == 4, "wrong sum" }
        test "throws" { throw "kaboom" }
        print("after tests")
    "#;
    let result = execute_script(source, verbose()).await;
    assert!(result.success);
    assert_eq!(
        result.output,
        vec!["✓ adds", "✗ fails: wrong sum", "✗ throws: kaboom", "after tests"]
    );
    let results = serde_json::to_value(result.test_results.unwrap()).unwrap();
    assert_eq!(
        results,
        json!([
            {"name": "adds", "passed": true},
            {"name": "fails", "passed": false, "error": "wrong sum"},
            {"name": "throws", "passed": false, "error": "kaboom"}
        ])
    );
}

#[tokio::test]
async fn test_named_arguments_override_positional() {
    let source = r#"
        function f(a, b = 10) { return [a, b] }
        return [f(b: 5, a: 1), f(1, 2, b: 7), f(3), f(a: 4), f(1, 2, a: 9)]
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(
        result.return_value,
        Some(json!([[1, 5], [1, 7], [3, 10], [4, 10], [9, 2]]))
    );
}

#[tokio::test]
async fn test_positional_arguments_keep_their_slots() {
    let source = "function f(a, b, c) { return [a, b, c] }\nreturn [f(1, 2, a: 9), f(1, b: 8), f(1, 2, 3, c: 7)]";
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(
        result.return_value,
        Some(json!([[9, 2, null], [1, 8, null], [1, 2, 7]]))
    );
}

#[tokio::test]
async fn test_runaway_recursion_fails_cleanly() {
    let result = execute_script(
        "function f(n) { return f(n + 1) }\nreturn f(0)",
        ScriptConfig::default(),
    )
    .await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Maximum call stack size exceeded")
    );
}

#[tokio::test]
async fn test_recursion_limit_is_catchable() {
    let source = r#"
        function f(n) { return f(n + 1) }
        function down(n) {
            if (n == 0) { return 0 }
            return 1 + down(n - 1)
        }
        let message = ""
        try { f(0) } catch (e) { message = e.message }
        return {message: message, depth: down(300)}
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.return_value,
        Some(json!({"message": "Maximum call stack size exceeded", "depth": 300}))
    );
}

#[tokio::test]
async fn test_oversized_values_fail_without_aborting() {
    for (source, message) in [
        ("return \"ab\" * 1e30", "Invalid string length"),
        ("return repeat(\"ab\", 1e30)", "Invalid string length"),
        ("return padStart(\"a\", 1e30)", "Invalid string length"),
        ("return range(0, 1 / 0)", "must be finite"),
        ("return range(1e16, 1e16 + 8)", "does not advance"),
        ("let a = []\na[1e12] = 1", "Invalid array length"),
    ] {
        let result = execute_script(source, ScriptConfig::default()).await;
        assert!(!result.success, "{}", source);
        assert!(
            result.error.as_deref().unwrap_or_default().contains(message),
            "{} -> {:?}",
            source,
            result.error
        );
    }
}

#[tokio::test]
async fn test_error_in_catch_is_not_recaught() {
    let source = r#"
        try { throw "first" } catch (e) { throw "second" } catch (e) { return "recaught" }
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_assignment_to_undeclared_name_creates_global() {
    let result = execute_script(
        "function setIt() { counter = 5 }\nsetIt()\nreturn counter",
        ScriptConfig::default(),
    )
    .await;
    assert_eq!(result.return_value, Some(json!(5)));
}

#[tokio::test]
async fn test_logical_operators_evaluate_both_sides() {
    let source = r#"
        let calls = []
        function mark(name, value) { push(calls, name)
            return value }
        let a = mark("left", false) && mark("right", true)
        let b = mark("left", true) || mark("right", false)
        return {a: a, b: b, calls: calls}
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert_eq!(
        result.return_value,
        Some(json!({"a": false, "b": true, "calls": ["left", "right", "left", "right"]}))
    );
}

#[tokio::test]
async fn test_variables_are_seeded_as_globals() {
    let mut config = ScriptConfig::default();
    config
        .variables
        .insert("target".to_string(), json!({"name": "api", "replicas": 3}));
    let result = execute_script("return `${target.name} x${target.replicas}`", config).await;
    assert_eq!(result.return_value, Some(json!("api x3")));
}

#[tokio::test]
async fn test_classes_and_methods() {
    let source = r#"
        class Stack {
            items = []
            constructor(first) { push(this.items, first) }
            add(x) {
                push(this.items, x)
                return this
            }
            size() { return len(this.items) }
        }
        let s = new Stack("a")
        s.add("b").add("c")
        return s.size()
    "#;
    let result = execute_script(source, ScriptConfig::default()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.return_value, Some(json!(3)));
}

#[tokio::test]
async fn test_runtime_errors_are_structured() {
    for (source, message) in [
        ("let x = null\nreturn x.y", "Cannot read property 'y' of null"),
        ("let n = 1\nn()", "is not a function"),
        ("return nope", "Undefined variable: nope"),
        ("assert 1 > 2", "Assertion failed"),
    ] {
        let result = execute_script(source, ScriptConfig::default()).await;
        assert!(!result.success, "{}", source);
        assert!(
            result.error.as_deref().unwrap_or_default().contains(message),
            "{} -> {:?}",
            source,
            result.error
        );
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn range_matches_rust_ranges(start in -20i64..20, end in -20i64..20) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let result = runtime.block_on(execute_script(
                &format!("return range({}, {})", start, end),
                ScriptConfig::default(),
            ));
            let expected: Vec<i64> = (start..end).collect();
            prop_assert_eq!(result.return_value, Some(json!(expected)));
        }

        #[test]
        fn returned_integers_round_trip(n in -1_000_000i64..1_000_000) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let result = runtime.block_on(execute_script(
                &format!("let n = {}\nreturn n", n),
                ScriptConfig::default(),
            ));
            prop_assert!(result.success);
            prop_assert_eq!(result.return_value, Some(json!(n)));
        }
    }
}
