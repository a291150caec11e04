//! DEPLOY integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

fn position(calls: &[String], prefix: &str) -> usize {
  calls
    .iter()
    .position(|c| c.starts_with(prefix))
    .unwrap_or_else(|| panic!("no call starting with {prefix:?} in {calls:#?}"))
}

#[test]
fn deploy_succeeds_and_tears_down_once() {
  let env = TestEnv::new();

  env
    .run("DEPLOY")
    .assert()
    .success()
    .stdout(predicate::str::contains("Deploy complete"))
    .stdout(predicate::str::contains("i-0fake"))
    .stdout(predicate::str::contains("cmd-0fake"))
    .stdout(predicate::str::contains("TornDown(Success)"));

  let calls = env.calls();
  assert!(calls[0].starts_with("cdk deploy aws-lc-ecr-* --require-approval never"));
  assert!(calls[1].starts_with("cdk deploy aws-lc-docker-image-build-* --require-approval never"));
  assert!(calls[0].contains("account=620771051181 repo=aws-lc"));
  assert_eq!(env.count_calls("aws codebuild start-build"), 2);
  assert_eq!(env.count_calls("aws ssm send-command"), 1);
  assert_eq!(env.count_calls("aws ecr describe-images"), 3);
  assert_eq!(env.count_calls("cdk destroy"), 1);

  // Both triggers fire before the first registry listing.
  let first_watch = position(&calls, "aws ecr describe-images");
  assert!(position(&calls, "aws codebuild start-build") < first_watch);
  assert!(position(&calls, "aws ssm send-command") < first_watch);
  assert!(position(&calls, "aws s3 cp") < position(&calls, "aws ec2 describe-instances"));
  assert!(position(&calls, "cdk destroy aws-lc-docker-image-build-* --force") > first_watch);
}

#[test]
fn provisioning_failure_exits_one_and_tears_down() {
  let env = TestEnv::new().failing_on("deploy aws-lc-ecr-*");

  env
    .run("DEPLOY")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("infra apply failed"));

  assert_eq!(env.count_calls("cdk destroy aws-lc-docker-image-build-*"), 1);
  assert_eq!(env.count_calls("aws codebuild"), 0);
}

#[test]
fn build_start_failure_exits_one_without_watching() {
  let env = TestEnv::new().failing_on("start-build");

  env
    .run("DEPLOY")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("failed to start build project"))
    .stderr(predicate::str::contains("TornDown(Failure)"));

  assert_eq!(env.count_calls("aws codebuild start-build"), 1);
  assert_eq!(env.count_calls("aws ecr describe-images"), 0);
  assert_eq!(env.count_calls("cdk destroy"), 1);
}

#[test]
fn teardown_failure_after_success_exits_one() {
  let env = TestEnv::new().failing_on("destroy");

  env
    .run("DEPLOY")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("teardown failed"));

  assert_eq!(env.count_calls("aws ecr describe-images"), 3);
  assert_eq!(env.count_calls("cdk destroy"), 1);
}

#[test]
fn deploy_report_as_json() {
  let env = TestEnv::new();

  env
    .run("DEPLOY")
    .args(["--output", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"states\""))
    .stdout(predicate::str::contains("\"command_id\": \"cmd-0fake\""));
}

#[test]
fn overlong_staging_bucket_fails_deploy_before_provisioning() {
  let env = TestEnv::new();

  env
    .run_for("aws-lc-formal-verification-tools", "DEPLOY")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("longer than 63 characters"));

  assert!(env.calls().is_empty(), "{:?}", env.calls());
}
