//! End-to-end query scenarios against NDJSON fixtures on disk.

use logql_core::{Result, SourceBindings};
use logql_engine::{render, run_query};
use pretty_assertions::assert_eq;

struct Fixture {
    dir: tempfile::TempDir,
    bindings: SourceBindings,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            bindings: SourceBindings::new(),
        }
    }

    fn source(mut self, alias: &str, lines: &str) -> Self {
        let path = self.dir.path().join(format!("{alias}.ndjson"));
        std::fs::write(&path, lines).unwrap();
        self.bindings.bind(alias, path).unwrap();
        self
    }

    fn run(&self, query: &str) -> Result<String> {
        let rows = run_query(query, &self.bindings)?;
        render(&rows)
    }
}

// ============================================================================
// Projection and filtering
// ============================================================================

#[test]
fn test_projection_with_missing_fields_as_null() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"level":"INFO","message":"boot","http":{"status":200}}
{"level":"WARN","message":"slow"}
{"level":"ERROR"}
{"message":"orphan"}
{"level":"INFO","message":"done"}
"#,
    );

    assert_eq!(
        fixture.run("SELECT level, message FROM logs").unwrap(),
        r#"[{"level":"INFO","message":"boot"},{"level":"WARN","message":"slow"},{"level":"ERROR","message":null},{"level":null,"message":"orphan"},{"level":"INFO","message":"done"}]"#
    );
}

#[test]
fn test_where_or_and_precedence() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"level":"ERROR","service":"api"}
{"level":"WARN","service":"worker"}
{"level":"WARN","service":"api"}
{"level":"INFO","service":"worker"}
"#,
    );

    assert_eq!(
        fixture
            .run(r#"SELECT level FROM logs WHERE level = "ERROR" OR level = "WARN" AND service = "worker""#)
            .unwrap(),
        r#"[{"level":"ERROR"},{"level":"WARN"}]"#
    );
}

#[test]
fn test_select_star_preserves_record_key_order() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"b":1,"a":2}
{"a":3,"b":4,"c":null}
"#,
    );

    assert_eq!(
        fixture.run("SELECT * FROM logs").unwrap(),
        r#"[{"b":1,"a":2},{"a":3,"b":4,"c":null}]"#
    );
}

#[test]
fn test_nested_paths_and_null_traversal() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"http":{"status":200,"headers":{"content-type":"text/html"}},"tags":["x","y"]}
{"http":null}
{"tags":"not-an-array"}
"#,
    );

    assert_eq!(
        fixture
            .run(r#"SELECT http.status, http.headers["content-type"] AS ct, tags.0 AS first FROM logs"#)
            .unwrap(),
        r#"[{"http.status":200,"ct":"text/html","first":"x"},{"http.status":null,"ct":null,"first":null},{"http.status":null,"ct":null,"first":null}]"#
    );
}

#[test]
fn test_null_comparisons_partition_scalars() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"id":1,"v":null}
{"id":2}
{"id":3,"v":"x"}
{"id":4,"v":[1]}
"#,
    );

    // `= null` matches null or missing, including containers coerced out.
    assert_eq!(
        fixture.run("SELECT id FROM logs WHERE v = null").unwrap(),
        r#"[{"id":1},{"id":2}]"#
    );
    // `!= null` matches present non-null scalars only; the array row drops.
    assert_eq!(
        fixture.run("SELECT id FROM logs WHERE v != null").unwrap(),
        r#"[{"id":3}]"#
    );
}

#[test]
fn test_numeric_promotion_but_not_across_strings() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"id":1,"n":200}
{"id":2,"n":200.0}
{"id":3,"n":"200"}
"#,
    );

    assert_eq!(
        fixture.run("SELECT id FROM logs WHERE n = 200").unwrap(),
        r#"[{"id":1},{"id":2}]"#
    );
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_global_aggregates_ignore_non_numerics() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"level":"INFO","bytes":100,"latency_ms":8.7}
{"level":"INFO","bytes":200,"latency_ms":8.7}
{"level":"INFO","bytes":"300","latency_ms":null}
{"level":"INFO","bytes":250,"latency_ms":"fast"}
{"level":"INFO","bytes":250}
{"level":"INFO"}
{"level":"ERROR","bytes":5,"latency_ms":1}
"#,
    );

    assert_eq!(
        fixture
            .run(r#"SELECT COUNT(*) AS total, SUM(bytes) AS sum_bytes, AVG(latency_ms) AS avg_latency FROM logs WHERE level = "INFO""#)
            .unwrap(),
        r#"[{"total":6,"sum_bytes":800,"avg_latency":8.7}]"#
    );
}

#[test]
fn test_global_aggregates_on_empty_input() {
    let fixture = Fixture::new().source("logs", "");

    assert_eq!(
        fixture
            .run("SELECT COUNT(*) AS c, SUM(x) AS s, MIN(x) AS m, UNIQUE(x) AS u FROM logs")
            .unwrap(),
        r#"[{"c":0,"s":null,"m":null,"u":[]}]"#
    );
}

#[test]
fn test_group_keys_distinguish_json_types() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"k":1}
{"k":"1"}
{"k":1.0}
{"k":true}
{"k":1}
"#,
    );

    assert_eq!(
        fixture
            .run("SELECT k, COUNT(*) AS n FROM logs GROUP BY k")
            .unwrap(),
        r#"[{"k":1,"n":2},{"k":"1","n":1},{"k":1.0,"n":1},{"k":true,"n":1}]"#
    );
}

#[test]
fn test_group_appearance_is_first_seen_order() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"svc":"worker"}
{"svc":"api"}
{"svc":"worker"}
{"svc":"cron"}
{"svc":"api"}
"#,
    );

    assert_eq!(
        fixture
            .run("SELECT svc, COUNT(*) AS n FROM logs GROUP BY svc")
            .unwrap(),
        r#"[{"svc":"worker","n":2},{"svc":"api","n":2},{"svc":"cron","n":1}]"#
    );
}

#[test]
fn test_unique_first_seen_deep_dedup() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"u":{"a":1,"b":2}}
{"u":{"b":2,"a":1}}
{"u":1}
{"u":1.0}
{"u":1}
"#,
    );

    // Key order is irrelevant to equality; the first-seen spelling wins.
    assert_eq!(
        fixture.run("SELECT UNIQUE(u) AS us FROM logs").unwrap(),
        r#"[{"us":[{"a":1,"b":2},1,1.0]}]"#
    );
}

#[test]
fn test_min_max_mixed_modes() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"v":"zeta"}
{"v":7}
{"v":2.5}
{"v":"alpha"}
{"v":null}
"#,
    );

    assert_eq!(
        fixture
            .run("SELECT MIN(v) AS lo, MAX(v) AS hi FROM logs")
            .unwrap(),
        r#"[{"lo":2.5,"hi":7}]"#
    );
}

// ============================================================================
// Conflation
// ============================================================================

#[test]
fn test_inner_conflate_group_by() {
    let fixture = Fixture::new()
        .source(
            "a",
            r#"{"req":"r1","service":"api"}
{"req":"r2","service":"api"}
{"req":"r3","service":"api"}
"#,
        )
        .source(
            "b",
            r#"{"req":"r1","status":200}
{"req":"r2","status":200}
{"req":"r3","status":502}
"#,
        );

    assert_eq!(
        fixture
            .run("SELECT a.service, b.status, COUNT(*) AS n FROM a CONFLATE b UPON a.req = b.req GROUP BY a.service, b.status")
            .unwrap(),
        r#"[{"a.service":"api","b.status":200,"n":2},{"a.service":"api","b.status":502,"n":1}]"#
    );
}

#[test]
fn test_preserving_flavors_and_row_order() {
    let fixture = Fixture::new()
        .source(
            "a",
            r#"{"k":1,"va":"a1"}
{"k":2,"va":"a2"}
"#,
        )
        .source(
            "b",
            r#"{"k":2,"vb":"b2"}
{"k":3,"vb":"b3"}
"#,
        );

    assert_eq!(
        fixture
            .run("SELECT a.k AS ak, b.k AS bk FROM a CONFLATE b UPON a.k = b.k")
            .unwrap(),
        r#"[{"ak":2,"bk":2}]"#
    );
    assert_eq!(
        fixture
            .run("SELECT a.k AS ak, b.k AS bk FROM a CONFLATE PRESERVING LEFT b UPON a.k = b.k")
            .unwrap(),
        r#"[{"ak":1,"bk":null},{"ak":2,"bk":2}]"#
    );
    assert_eq!(
        fixture
            .run("SELECT a.k AS ak, b.k AS bk FROM a CONFLATE PRESERVING RIGHT b UPON a.k = b.k")
            .unwrap(),
        r#"[{"ak":2,"bk":2},{"ak":null,"bk":3}]"#
    );
    assert_eq!(
        fixture
            .run("SELECT a.k AS ak, b.k AS bk FROM a CONFLATE PRESERVING BOTH b UPON a.k = b.k")
            .unwrap(),
        r#"[{"ak":1,"bk":null},{"ak":2,"bk":2},{"ak":null,"bk":3}]"#
    );
}

#[test]
fn test_upon_is_type_strict_and_null_matches_null() {
    let fixture = Fixture::new()
        .source(
            "a",
            r#"{"id":1,"k":200}
{"id":2,"k":null}
"#,
        )
        .source(
            "b",
            r#"{"id":10,"k":"200"}
{"id":11,"k":null}
"#,
        );

    // 200 and "200" never join; the two explicit nulls do.
    assert_eq!(
        fixture
            .run("SELECT a.id AS left_id, b.id AS right_id FROM a CONFLATE b UPON a.k = b.k")
            .unwrap(),
        r#"[{"left_id":2,"right_id":11}]"#
    );
}

#[test]
fn test_matches_for_one_left_row_follow_right_input_order() {
    let fixture = Fixture::new()
        .source("a", "{\"k\":1}\n")
        .source(
            "b",
            r#"{"k":1,"seq":3}
{"k":1,"seq":1}
{"k":1,"seq":2}
"#,
        );

    assert_eq!(
        fixture
            .run("SELECT b.seq FROM a CONFLATE b UPON a.k = b.k")
            .unwrap(),
        r#"[{"b.seq":3},{"b.seq":1},{"b.seq":2}]"#
    );
}

#[test]
fn test_alias_star_expansion_with_null_side() {
    let fixture = Fixture::new()
        .source(
            "a",
            r#"{"k":1}
{"k":2}
"#,
        )
        .source("b", "{\"k\":2,\"vb\":\"b2\"}\n");

    assert_eq!(
        fixture
            .run("SELECT a.k AS ak, b.* FROM a CONFLATE PRESERVING LEFT b UPON a.k = b.k")
            .unwrap(),
        r#"[{"ak":1,"b.k":null,"b.vb":null},{"ak":2,"b.k":2,"b.vb":"b2"}]"#
    );
}

#[test]
fn test_three_way_conflate_chain() {
    let fixture = Fixture::new()
        .source("a", "{\"r\":\"x\"}\n{\"r\":\"y\"}\n")
        .source("b", "{\"r\":\"x\",\"u\":1}\n{\"r\":\"y\",\"u\":2}\n")
        .source("c", "{\"u\":1,\"name\":\"one\"}\n");

    assert_eq!(
        fixture
            .run("SELECT a.r, c.name FROM a CONFLATE b UPON a.r = b.r CONFLATE PRESERVING LEFT c UPON b.u = c.u")
            .unwrap(),
        r#"[{"a.r":"x","c.name":"one"},{"a.r":"y","c.name":null}]"#
    );
}

// ============================================================================
// GLOSS / CANON
// ============================================================================

#[test]
fn test_gloss_fallback_and_default() {
    let fixture = Fixture::new().source(
        "a",
        r#"{"route":"/r"}
{"path":"/p"}
{}
"#,
    );

    assert_eq!(
        fixture
            .run(r#"SELECT CANON.route FROM a GLOSS { route := a.route | a.path DEFAULT "/none" }"#)
            .unwrap(),
        r#"[{"CANON.route":"/r"},{"CANON.route":"/p"},{"CANON.route":"/none"}]"#
    );
}

#[test]
fn test_gloss_strict_conflict_is_runtime_error() {
    let fixture = Fixture::new().source(
        "a",
        r#"{"route":"/x"}
{"path":"/y"}
{"route":"/a","path":"/b"}
"#,
    );

    let err = fixture
        .run("SELECT CANON.route FROM a GLOSS STRICT { route := a.route | a.path }")
        .unwrap_err();
    assert_eq!(err.code(), "E_RUNTIME");
    assert!(err.to_string().contains("CANON.route"));
}

#[test]
fn test_gloss_strict_agreeing_candidates_pass() {
    let fixture = Fixture::new().source(
        "a",
        r#"{"route":"/same","path":"/same"}
"#,
    );

    assert_eq!(
        fixture
            .run("SELECT CANON.route FROM a GLOSS STRICT { route := a.route | a.path }")
            .unwrap(),
        r#"[{"CANON.route":"/same"}]"#
    );
}

#[test]
fn test_canon_reconciles_across_conflated_sources() {
    let fixture = Fixture::new()
        .source("a", "{\"req\":\"r1\",\"status\":null}\n{\"req\":\"r2\",\"status\":200}\n")
        .source("b", "{\"req\":\"r1\",\"code\":404}\n{\"req\":\"r2\"}\n");

    assert_eq!(
        fixture
            .run("SELECT CANON.status FROM a GLOSS { status := a.status | b.code } CONFLATE b UPON a.req = b.req")
            .unwrap(),
        r#"[{"CANON.status":404},{"CANON.status":200}]"#
    );
}

#[test]
fn test_group_by_canon_label() {
    let fixture = Fixture::new().source(
        "a",
        r#"{"route":"/x"}
{"path":"/x"}
{"route":"/y"}
"#,
    );

    assert_eq!(
        fixture
            .run("SELECT CANON.route, COUNT(*) AS n FROM a GLOSS { route := a.route | a.path } GROUP BY CANON.route")
            .unwrap(),
        r#"[{"CANON.route":"/x","n":2},{"CANON.route":"/y","n":1}]"#
    );
}

// ============================================================================
// Subqueries and quantifiers
// ============================================================================

#[test]
fn test_correlated_scalar_pocket() {
    let fixture = Fixture::new()
        .source(
            "a",
            r#"{"id":1,"req":"r1"}
{"id":2,"req":"r1"}
{"id":3,"req":"r2"}
{"id":4,"req":"r3"}
"#,
        )
        .source(
            "b",
            r#"{"rid":"r1"}
{"rid":"r1"}
{"rid":"r2"}
{"rid":"r3"}
"#,
        );

    assert_eq!(
        fixture
            .run("SELECT a.id, POCKET(SELECT COUNT(*) FROM b WHERE b.rid = UPTREE.a.req) AS b_count FROM a")
            .unwrap(),
        r#"[{"a.id":1,"b_count":2},{"a.id":2,"b_count":2},{"a.id":3,"b_count":1},{"a.id":4,"b_count":1}]"#
    );
}

#[test]
fn test_scalar_pocket_default_key_is_query_text() {
    let fixture = Fixture::new()
        .source("a", "{\"id\":1}\n")
        .source("b", "{\"x\":9}\n");

    assert_eq!(
        fixture
            .run("SELECT a.id, POCKET(SELECT x FROM b) FROM a")
            .unwrap(),
        r#"[{"a.id":1,"SELECT x FROM b":9}]"#
    );
}

#[test]
fn test_scalar_pocket_zero_rows_is_null() {
    let fixture = Fixture::new()
        .source("a", "{\"id\":1}\n")
        .source("b", "");

    assert_eq!(
        fixture
            .run("SELECT a.id, POCKET(SELECT x FROM b) AS v FROM a")
            .unwrap(),
        r#"[{"a.id":1,"v":null}]"#
    );
}

#[test]
fn test_scalar_pocket_cardinality_violation() {
    let fixture = Fixture::new()
        .source("a", "{\"id\":1}\n")
        .source("b", "{\"x\":1}\n{\"x\":2}\n");

    let err = fixture
        .run("SELECT a.id, POCKET(SELECT x FROM b) AS v FROM a")
        .unwrap_err();
    assert_eq!(err.code(), "E_RUNTIME");
}

#[test]
fn test_subquery_width_violation() {
    let fixture = Fixture::new()
        .source("a", "{\"id\":1}\n")
        .source("b", "{\"x\":1,\"y\":2}\n");

    let err = fixture
        .run("SELECT a.id, POCKET(SELECT x, y FROM b) AS v FROM a")
        .unwrap_err();
    assert_eq!(err.code(), "E_RUNTIME");
}

#[test]
fn test_amongst_is_deep_and_type_strict() {
    let fixture = Fixture::new()
        .source(
            "logs",
            r#"{"status":200}
{"status":"200"}
{"status":404}
{"status":null}
"#,
        )
        .source("codes", "{\"code\":200}\n{\"code\":null}\n");

    assert_eq!(
        fixture
            .run("SELECT status FROM logs WHERE status AMONGST POCKET[ SELECT code FROM codes ]")
            .unwrap(),
        r#"[{"status":200},{"status":null}]"#
    );
}

#[test]
fn test_eitherwise_and_everywise() {
    let fixture = Fixture::new()
        .source("logs", "{\"n\":5}\n{\"n\":1}\n")
        .source("bounds", "{\"t\":2}\n{\"t\":10}\n")
        .source("empty", "");

    assert_eq!(
        fixture
            .run("SELECT n FROM logs WHERE n > EITHERWISE POCKET[ SELECT t FROM bounds ]")
            .unwrap(),
        r#"[{"n":5}]"#
    );
    assert_eq!(
        fixture
            .run("SELECT n FROM logs WHERE n > EVERYWISE POCKET[ SELECT t FROM bounds ]")
            .unwrap(),
        "[]"
    );
    // Empty table: EITHERWISE is false, EVERYWISE is vacuously true.
    assert_eq!(
        fixture
            .run("SELECT n FROM logs WHERE n > EITHERWISE POCKET[ SELECT t FROM empty ]")
            .unwrap(),
        "[]"
    );
    assert_eq!(
        fixture
            .run("SELECT n FROM logs WHERE n > EVERYWISE POCKET[ SELECT t FROM empty ]")
            .unwrap(),
        r#"[{"n":5},{"n":1}]"#
    );
}

#[test]
fn test_beholds_correlated() {
    let fixture = Fixture::new()
        .source("a", "{\"id\":1,\"req\":\"r1\"}\n{\"id\":2,\"req\":\"zz\"}\n")
        .source("b", "{\"rid\":\"r1\"}\n");

    assert_eq!(
        fixture
            .run("SELECT a.id FROM a WHERE BEHOLDS POCKET[ SELECT b.rid FROM b WHERE b.rid = UPTREE.a.req ]")
            .unwrap(),
        r#"[{"a.id":1}]"#
    );
}

// ============================================================================
// Determinism and failure modes
// ============================================================================

#[test]
fn test_same_query_twice_is_byte_identical() {
    let fixture = Fixture::new().source(
        "logs",
        r#"{"k":"a","v":1.5}
{"k":"b","v":2}
{"k":"a","v":3}
"#,
    );

    let query = "SELECT k, SUM(v) AS total FROM logs GROUP BY k";
    assert_eq!(fixture.run(query).unwrap(), fixture.run(query).unwrap());
}

#[test]
fn test_missing_source_file_is_io_error() {
    let mut bindings = SourceBindings::new();
    bindings.bind("logs", "/nonexistent/logs.ndjson").unwrap();

    let err = run_query("SELECT x FROM logs", &bindings).unwrap_err();
    assert_eq!(err.code(), "E_IO");
}

#[test]
fn test_unbound_alias_is_semantic_error() {
    let fixture = Fixture::new().source("logs", "{\"x\":1}\n");
    let err = fixture.run("SELECT x FROM other").unwrap_err();
    assert_eq!(err.code(), "E_SEMANTIC");
}

#[test]
fn test_syntax_error_is_parse_error() {
    let fixture = Fixture::new().source("logs", "{\"x\":1}\n");
    let err = fixture.run("SELECT FROM logs").unwrap_err();
    assert_eq!(err.code(), "E_PARSE");
}

#[test]
fn test_malformed_record_fails_midstream() {
    let fixture = Fixture::new().source(
        "logs",
        "{\"x\":1}\nnot json at all\n",
    );
    let err = fixture.run("SELECT x FROM logs").unwrap_err();
    assert_eq!(err.code(), "E_IO");
}
