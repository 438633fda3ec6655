//! Failing recipes and invocation errors.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn failing_recipe_stops_the_build() {
  let env = TestEnv::from_fixture("failing.mk");

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("mk: recipe for 'a' failed: exit status 1"));

  assert_eq!(env.lines("log"), vec!["a"]);
  assert!(!env.exists("b"));
}

#[test]
fn keep_going_builds_independent_targets() {
  let env = TestEnv::from_fixture("failing.mk");

  env.mk_cmd().arg("-k").assert().failure();

  let log = env.lines("log");
  assert!(log.contains(&"b".to_string()));
  assert!(!log.contains(&"all".to_string()));
  assert!(env.exists("b"));
}

#[test]
fn ignore_errors_finishes_the_build() {
  let env = TestEnv::from_fixture("failing.mk");

  env
    .mk_cmd()
    .arg("-i")
    .assert()
    .success()
    .stderr(predicate::str::contains("(ignored)"));

  assert_eq!(env.lines("log"), vec!["a", "b", "all"]);
}

#[test]
fn cycle_is_fatal() {
  let env = TestEnv::from_fixture("cycle.mk");

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle: A -> B -> A"))
    .stdout(predicate::str::is_empty());
}

#[test]
fn unknown_target_is_fatal() {
  let env = TestEnv::with_mkfile("all: missing.c\n\ttouch all\n");

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("don't know how to make 'missing.c' (needed by 'all')"));

  env
    .mk_cmd()
    .arg("nothere")
    .assert()
    .failure()
    .stderr(predicate::str::contains("don't know how to make 'nothere'"));
}

#[test]
fn syntax_error_names_file_and_line() {
  let env = TestEnv::with_mkfile("all: a\n\ntouch\n");

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("mkfile:3: syntax error"));
}

#[test]
fn duplicate_recipes_are_rejected() {
  let env = TestEnv::with_mkfile("x:\n\techo one\nx:\n\techo two\n");

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("mkfile:3"));
}

#[test]
fn nothing_to_mk_without_mkfile() {
  let env = TestEnv::empty();

  env
    .mk_cmd()
    .assert()
    .failure()
    .stderr(predicate::str::contains("nothing to mk"));
}

#[test]
fn missing_mkfile_flag_fails() {
  let env = TestEnv::empty();

  env
    .mk_cmd()
    .args(["-f", "nope.mk"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("nope.mk"));
}

#[test]
fn unknown_debug_letter_fails() {
  let env = TestEnv::with_mkfile("x:V:\n\ttrue\n");

  env
    .mk_cmd()
    .arg("--debug=z")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown debug flag 'z'"));
}

#[test]
fn debug_cluster_keeps_other_switches() {
  let env = TestEnv::with_mkfile("out:\n\ttouch out\n");

  env.mk_cmd().arg("-dn").assert().success();
  assert!(!env.exists("out"));
}
