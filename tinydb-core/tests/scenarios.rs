//! Integration tests for the six concrete scenarios from spec.md §8, plus
//! the universal invariants stated alongside them.

use pretty_assertions::assert_eq;
use tinydb_core::{Engine, EngineConfig, ErrorKind, StatementResult};
use tinydb_core::value::Value;

fn engine() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(EngineConfig::new(dir.path())).unwrap();
    (engine, dir)
}

fn rows(result: StatementResult) -> Vec<tinydb_core::executor::ResultRow> {
    match result {
        StatementResult::Rows { rows, .. } => rows,
        other => panic!("expected Rows, got {other:?}"),
    }
}

fn affected(result: StatementResult) -> usize {
    match result {
        StatementResult::Affected(n) => n,
        other => panic!("expected Affected, got {other:?}"),
    }
}

#[test]
fn pk_and_unique_enforcement() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE users (id INT PRIMARY KEY, email STRING UNIQUE, name STRING)")
        .unwrap();
    assert_eq!(
        affected(engine.execute("INSERT INTO users VALUES (1, 'a@x', 'A')").unwrap()),
        1
    );

    let dup_pk = engine.execute("INSERT INTO users VALUES (1, 'b@x', 'B')");
    assert_eq!(dup_pk.unwrap_err().kind(), ErrorKind::ConstraintError);

    let dup_unique = engine.execute("INSERT INTO users VALUES (2, 'a@x', 'B')");
    assert_eq!(dup_unique.unwrap_err().kind(), ErrorKind::ConstraintError);

    let result = rows(engine.execute("SELECT COUNT(*) FROM users").unwrap());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("COUNT(*)"), Some(&Value::Integer(1)));
}

#[test]
fn on_delete_cascade_chain() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE u (id INT PRIMARY KEY, n STRING)")
        .unwrap();
    engine
        .execute("CREATE TABLE o (id INT PRIMARY KEY, u_id INT REFERENCES u(id) ON DELETE CASCADE)")
        .unwrap();
    engine.execute("INSERT INTO u VALUES (1, 'A')").unwrap();
    engine.execute("INSERT INTO o VALUES (10, 1)").unwrap();
    engine.execute("INSERT INTO o VALUES (11, 1)").unwrap();

    assert_eq!(affected(engine.execute("DELETE FROM u WHERE id = 1").unwrap()), 1);

    let result = rows(engine.execute("SELECT COUNT(*) FROM o").unwrap());
    assert_eq!(result[0].get("COUNT(*)"), Some(&Value::Integer(0)));
}

#[test]
fn restrict_blocks_delete() {
    let (engine, _dir) = engine();
    engine.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
    engine
        .execute("CREATE TABLE c (id INT PRIMARY KEY, p_id INT REFERENCES p(id))")
        .unwrap();
    engine.execute("INSERT INTO p VALUES (1)").unwrap();
    engine.execute("INSERT INTO c VALUES (1, 1)").unwrap();

    let result = engine.execute("DELETE FROM p WHERE id = 1");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ConstraintError);

    let result = rows(engine.execute("SELECT COUNT(*) FROM p").unwrap());
    assert_eq!(result[0].get("COUNT(*)"), Some(&Value::Integer(1)));
}

#[test]
fn aggregation_with_having() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE ord (id INT PRIMARY KEY, uid INT, amt INT)")
        .unwrap();
    engine.execute("INSERT INTO ord VALUES (1,1,10)").unwrap();
    engine.execute("INSERT INTO ord VALUES (2,1,20)").unwrap();
    engine.execute("INSERT INTO ord VALUES (3,2,5)").unwrap();

    let result = rows(engine
        .execute("SELECT uid, SUM(amt) AS s FROM ord GROUP BY uid HAVING SUM(amt) > 10 ORDER BY s DESC")
        .unwrap());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("uid"), Some(&Value::Integer(1)));
    assert_eq!(result[0].get("s"), Some(&Value::Integer(30)));
}

#[test]
fn bare_group_by_collapses_groups_without_an_aggregate() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE ord (id INT PRIMARY KEY, uid INT, amt INT)")
        .unwrap();
    engine.execute("INSERT INTO ord VALUES (1,1,10)").unwrap();
    engine.execute("INSERT INTO ord VALUES (2,1,20)").unwrap();
    engine.execute("INSERT INTO ord VALUES (3,2,5)").unwrap();

    let result = rows(engine.execute("SELECT uid FROM ord GROUP BY uid").unwrap());
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get("uid"), Some(&Value::Integer(1)));
    assert_eq!(result[1].get("uid"), Some(&Value::Integer(2)));

    let result = rows(engine
        .execute("SELECT uid FROM ord GROUP BY uid HAVING uid > 1")
        .unwrap());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("uid"), Some(&Value::Integer(2)));
}

#[test]
fn left_outer_join_null_fill() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE u (id INT PRIMARY KEY, n STRING)")
        .unwrap();
    engine
        .execute("CREATE TABLE o (id INT PRIMARY KEY, u_id INT REFERENCES u(id))")
        .unwrap();
    engine.execute("INSERT INTO u VALUES (1,'A')").unwrap();
    engine.execute("INSERT INTO u VALUES (2,'B')").unwrap();
    engine.execute("INSERT INTO o VALUES (10, 1)").unwrap();

    let result = rows(engine
        .execute("SELECT u.n, o.id FROM u LEFT JOIN o ON u.id = o.u_id ORDER BY u.n")
        .unwrap());
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get("n"), Some(&Value::Text("A".to_string())));
    assert_eq!(result[0].get("id"), Some(&Value::Integer(10)));
    assert_eq!(result[1].get("n"), Some(&Value::Text("B".to_string())));
    assert_eq!(result[1].get("id"), Some(&Value::Null));
}

#[test]
fn datetime_predicate_and_arithmetic() {
    let (engine, _dir) = engine();
    engine.execute("CREATE TABLE e (id INT PRIMARY KEY, d DATE)").unwrap();
    engine.execute("INSERT INTO e VALUES (1, '2025-01-14')").unwrap();
    engine.execute("INSERT INTO e VALUES (2, '2024-07-01')").unwrap();

    let result = rows(engine.execute("SELECT id FROM e WHERE YEAR(d) = 2025").unwrap());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("id"), Some(&Value::Integer(1)));

    let result = rows(engine
        .execute("SELECT id FROM e WHERE d >= DATE_SUB('2025-01-20', 10)")
        .unwrap());
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].get("id"), Some(&Value::Integer(1)));
}

#[test]
fn three_valued_logic_excludes_null_from_where_and_where_not() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE t (id INT PRIMARY KEY, v INT)")
        .unwrap();
    engine.execute("INSERT INTO t VALUES (1, NULL)").unwrap();
    engine.execute("INSERT INTO t VALUES (2, 5)").unwrap();

    let matching = rows(engine.execute("SELECT id FROM t WHERE v > 3").unwrap());
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].get("id"), Some(&Value::Integer(2)));

    let not_matching = rows(engine.execute("SELECT id FROM t WHERE NOT (v > 3)").unwrap());
    assert!(not_matching.is_empty());
}

#[test]
fn failed_insert_leaves_row_count_unchanged() {
    let (engine, _dir) = engine();
    engine
        .execute("CREATE TABLE t (id INT PRIMARY KEY, n STRING)")
        .unwrap();
    engine.execute("INSERT INTO t VALUES (1, 'a')").unwrap();

    assert!(engine.execute("INSERT INTO t VALUES (1, 'b')").is_err());

    let result = rows(engine.execute("SELECT COUNT(*) FROM t").unwrap());
    assert_eq!(result[0].get("COUNT(*)"), Some(&Value::Integer(1)));
}

#[test]
fn repeated_create_database_fails_without_side_effects() {
    let (engine, _dir) = engine();
    engine.execute("CREATE DATABASE shop").unwrap();
    let err = engine.execute("CREATE DATABASE shop").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SemanticError);
}

#[test]
fn catalog_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = Engine::new(EngineConfig::new(dir.path())).unwrap();
        engine
            .execute("CREATE TABLE t (id INT PRIMARY KEY, n STRING)")
            .unwrap();
        engine.execute("INSERT INTO t VALUES (1, 'a')").unwrap();
        engine.execute("INSERT INTO t VALUES (2, 'b')").unwrap();
    }
    let reopened = Engine::new(EngineConfig::new(dir.path())).unwrap();
    let result = rows(reopened.execute("SELECT id, n FROM t ORDER BY id").unwrap());
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].get("n"), Some(&Value::Text("a".to_string())));
    assert_eq!(result[1].get("n"), Some(&Value::Text("b".to_string())));
}
