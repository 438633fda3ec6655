//! Dry-run, touch, explain, what-if and report output.

use predicates::prelude::*;

use super::common::TestEnv;

fn c_project() -> TestEnv {
  let env = TestEnv::from_fixture("c_project.mk");
  env.write_file("main.c", "int main() {}\n");
  env.write_file("util.c", "void util() {}\n");
  env
}

#[test]
fn dry_run_prints_without_running() {
  let env = c_project();

  env
    .mk_cmd()
    .arg("-n")
    .assert()
    .success()
    .stdout(predicate::str::contains("cp $stem.c $target").or(predicate::str::contains("cp main.c main.o")))
    .stdout(predicate::str::contains("cat main.o util.o > prog"));

  assert!(!env.exists("prog"));
  assert!(!env.exists("main.o"));
  assert!(!env.exists("log"));
}

#[test]
fn touch_mode_updates_without_running() {
  let env = c_project();

  env
    .mk_cmd()
    .arg("-t")
    .assert()
    .success()
    .stdout(predicate::str::contains("touch(main.o)"))
    .stdout(predicate::str::contains("touch(prog)"));

  assert!(env.exists("main.o") && env.exists("prog"));
  assert!(!env.exists("log"));
}

#[test]
fn explain_prints_reasons() {
  let env = c_project();

  env
    .mk_cmd()
    .arg("-e")
    .assert()
    .success()
    .stdout(predicate::str::contains("mk: main.o: target does not exist"));

  env
    .mk_cmd()
    .args(["-e", "-a"])
    .assert()
    .success()
    .stdout(predicate::str::contains("mk: prog: all targets forced"));
}

#[test]
fn what_if_rebuilds_dependents_only() {
  let env = c_project();
  env.mk_cmd().assert().success();

  env.mk_cmd().args(["-w", "util.c"]).assert().success();

  let log = env.lines("log");
  assert_eq!(log.len(), 3);
  assert_eq!(log[2], "cc -O2 util.c");
}

#[test]
fn json_report() {
  let env = c_project();

  env
    .mk_cmd()
    .args(["--format", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"jobs_run\": 3"))
    .stdout(predicate::str::contains("\"outcome\": \"done\""));
}

#[test]
fn usage_summary() {
  let env = TestEnv::from_fixture("failing.mk");

  env
    .mk_cmd()
    .args(["-k", "-u"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("Jobs: 2"))
    .stdout(predicate::str::contains("Failed: 1"))
    .stdout(predicate::str::contains("Skipped: 1"));
}

#[test]
fn debug_parse_dumps_rules() {
  let env = c_project();

  env
    .mk_cmd()
    .args(["-dp", "-n"])
    .assert()
    .success()
    .stderr(predicate::str::contains("default targets"))
    .stderr(predicate::str::contains("metarule"));
}
