//! DESTROY integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn destroy_removes_long_lived_namespace() {
  let env = TestEnv::new();

  env
    .run("DESTROY")
    .assert()
    .success()
    .stdout(predicate::str::contains("Destroy complete"));

  assert_eq!(env.count_calls("cdk destroy aws-lc-* --force"), 1);
  assert_eq!(
    env.count_calls("aws s3 rb s3://aws-lc-win-img-stage-2026-01-01-00-00-00 --force"),
    1
  );
  assert_eq!(env.count_calls("aws s3 rb s3://unrelated"), 0);
  assert_eq!(env.count_calls("aws ecr delete-repository"), 3);
  assert_eq!(env.count_calls("aws codebuild"), 0);
  assert_eq!(env.count_calls("cdk deploy"), 0);
}

#[test]
fn destroy_keeps_going_after_stack_failure() {
  let env = TestEnv::new().failing_on("destroy");

  env
    .run("DESTROY")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("teardown incomplete"));

  assert_eq!(env.count_calls("aws ecr delete-repository"), 3);
}

#[test]
fn destroy_accepts_repo_name_too_long_for_a_staging_bucket() {
  let env = TestEnv::new();

  env
    .run_for("aws-lc-formal-verification-tools", "DESTROY")
    .assert()
    .success()
    .stdout(predicate::str::contains("Destroy complete"));

  assert_eq!(env.count_calls("cdk destroy aws-lc-formal-verification-tools-* --force"), 1);
}
