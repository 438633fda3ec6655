//! End-to-end builds through the public API.

use mk_lib::{MkError, Outcome};

use super::common::{Project, targets};

#[tokio::test]
async fn independent_prereqs_run_concurrently() {
  let project = Project::new();
  let ctx = project.context(
    "all: a b\n\techo all >> log\n\
     a:\n\techo start-a >> log\n\tsleep 0.5\n\techo end-a >> log\n\ttouch a\n\
     b:\n\techo start-b >> log\n\tsleep 0.5\n\techo end-b >> log\n\ttouch b\n",
    |o| o.parallelism = 2,
  );

  let report = ctx.mk(&targets(&["all"]), false).await.unwrap();

  assert!(report.is_success());
  let log = project.lines("log");
  assert_eq!(log.len(), 5);
  assert!(log[..2].iter().all(|l| l.starts_with("start")), "log: {log:?}");
  assert_eq!(log[4], "all");
  assert_eq!(report.outcome("all"), Some(Outcome::Done));
}

#[tokio::test]
async fn failure_skips_dependent_but_running_sibling_completes() {
  let project = Project::new();
  let ctx = project.context(
    "all: a b\n\ttouch all\na:\n\texit 1\nb:\n\tsleep 0.3\n\ttouch b\n",
    |o| o.parallelism = 2,
  );

  let report = ctx.mk(&targets(&["all"]), false).await.unwrap();

  assert!(!report.is_success());
  assert_eq!(report.outcome("a"), Some(Outcome::Failed));
  assert_eq!(report.outcome("b"), Some(Outcome::Done));
  assert_eq!(report.outcome("all"), Some(Outcome::Skipped));
  assert!(project.exists("b"));
  assert!(!project.exists("all"));
}

#[tokio::test]
async fn explicit_rule_beats_pattern() {
  let project = Project::new();
  std::fs::write(project.path().join("foo.c"), "").unwrap();
  std::fs::write(project.path().join("bar.c"), "").unwrap();
  let ctx = project.context(
    "%.o: %.c\n\techo pattern $stem > $target\nfoo.o:\n\techo explicit > $target\n",
    |_| {},
  );

  let report = ctx.mk(&targets(&["foo.o", "bar.o"]), false).await.unwrap();

  assert!(report.is_success());
  assert_eq!(project.lines("foo.o"), vec!["explicit"]);
  assert_eq!(project.lines("bar.o"), vec!["pattern bar"]);
}

#[tokio::test]
async fn mutual_prereqs_are_a_cycle() {
  let project = Project::new();
  let ctx = project.context("A: B\n\ttouch A\nB: A\n\ttouch B\n", |_| {});

  let err = ctx.mk(&targets(&["A"]), false).await.unwrap_err();

  assert!(matches!(err, MkError::Cycle { .. }));
  assert!(!project.exists("A") && !project.exists("B"));
}

#[tokio::test]
async fn dry_run_reports_what_a_real_run_does() {
  let text = "prog: a.o b.o\n\tcat a.o b.o > prog\n%.o: %.c\n\tcp $stem.c $target\n";
  let outcomes = |report: &mk_lib::BuildReport| {
    let mut seen: Vec<_> = report.nodes.iter().map(|n| (n.target.clone(), n.outcome, n.ran)).collect();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    seen
  };

  let dry = Project::new();
  let real = Project::new();
  for project in [&dry, &real] {
    std::fs::write(project.path().join("a.c"), "a").unwrap();
    std::fs::write(project.path().join("b.c"), "b").unwrap();
  }

  let dry_report = dry
    .context(text, |o| o.dry_run = true)
    .mk(&[], false)
    .await
    .unwrap();
  let real_report = real.context(text, |_| {}).mk(&[], false).await.unwrap();

  assert_eq!(outcomes(&dry_report), outcomes(&real_report));
  assert!(!dry.exists("prog"));
  assert!(real.exists("prog"));
}
