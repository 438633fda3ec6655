//! Builds that succeed.

use predicates::prelude::*;

use super::common::TestEnv;

fn c_project() -> TestEnv {
  let env = TestEnv::from_fixture("c_project.mk");
  env.write_file("main.c", "int main() {}\n");
  env.write_file("util.c", "void util() {}\n");
  env
}

#[test]
fn builds_default_target() {
  let env = c_project();

  env
    .mk_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("cat main.o util.o > prog"));

  assert!(env.exists("prog"));
  let mut log = env.lines("log");
  log.sort();
  assert_eq!(log, vec!["cc -O2 main.c", "cc -O2 util.c"]);
}

#[test]
fn second_run_does_nothing() {
  let env = c_project();
  env.mk_cmd().assert().success();

  env
    .mk_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("cat").not());
  assert_eq!(env.lines("log").len(), 2);
}

#[test]
fn command_line_assignment_overrides_mkfile() {
  let env = c_project();

  env.mk_cmd().arg("CFLAGS=-g").arg("main.o").assert().success();

  assert_eq!(env.lines("log"), vec!["cc -g main.c"]);
  assert!(!env.exists("prog"));
}

#[test]
fn several_targets_on_command_line() {
  let env = c_project();

  env.mk_cmd().args(["main.o", "util.o"]).assert().success();

  assert!(env.exists("main.o") && env.exists("util.o"));
  assert!(!env.exists("prog"));
}

#[test]
fn virtual_target_always_runs() {
  let env = c_project();
  env.mk_cmd().assert().success();

  env.mk_cmd().arg("clean").assert().success();
  assert!(!env.exists("prog"));
  assert!(!env.exists("log"));

  env.mk_cmd().arg("clean").assert().success();
}

#[test]
fn explicit_mkfile_flag() {
  let env = TestEnv::empty();
  env.write_file("rules.mk", "out:\n\techo hi > out\n");

  env.mk_cmd().args(["-f", "rules.mk"]).assert().success();
  assert_eq!(env.lines("out"), vec!["hi"]);
}

#[test]
fn mkflags_and_mkargs_reach_recipes() {
  let env = TestEnv::with_mkfile("show:V:\n\techo \"flags=$MKFLAGS args=$MKARGS\" > out\n");

  env.mk_cmd().args(["-k", "show"]).assert().success();
  assert_eq!(env.lines("out"), vec!["flags=-k args=show"]);
}

#[test]
fn independent_recipes_run_concurrently() {
  let env = TestEnv::from_fixture("parallel.mk");

  env.mk_cmd().env("NPROC", "2").assert().success();

  let log = env.lines("log");
  assert_eq!(log.len(), 4);
  assert!(log[..2].iter().all(|l| l.starts_with("start")), "log: {log:?}");
}

#[test]
fn jobs_flag_overrides_nproc() {
  let env = TestEnv::from_fixture("parallel.mk");

  env.mk_cmd().env("NPROC", "1").args(["-j", "2"]).assert().success();

  let log = env.lines("log");
  assert!(log[..2].iter().all(|l| l.starts_with("start")), "log: {log:?}");
}
