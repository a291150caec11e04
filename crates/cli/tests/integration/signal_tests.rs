//! Interrupt handling for a running DEPLOY.

use std::time::Duration;

use super::common::{TestEnv, send_signal};

#[test]
fn hangup_during_boot_wait_tears_down_once() {
  let env = TestEnv::new();
  let child = env.spawn_deploy("1h");

  // The scripts upload is the last call before the boot wait.
  env.wait_for_call("aws s3 cp");
  send_signal(&child, "HUP");
  let output = child.wait_with_output().unwrap();
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(1), "{stderr}");
  assert!(stderr.contains("received SIGHUP"), "{stderr}");
  assert!(stderr.contains("interrupted by signal"), "{stderr}");
  assert_eq!(env.count_calls("cdk destroy aws-lc-docker-image-build-*"), 1);
  assert_eq!(env.count_calls("aws ec2 describe-instances"), 0);
  assert_eq!(env.count_calls("aws ssm send-command"), 0);
}

#[test]
fn second_interrupt_during_teardown_waits_for_it() {
  let env = TestEnv::new().slow_on("destroy");
  let child = env.spawn_deploy("1h");

  env.wait_for_call("aws s3 cp");
  send_signal(&child, "TERM");
  env.wait_for_call("cdk destroy");
  // Give the follow-up signal listener a moment to register.
  std::thread::sleep(Duration::from_millis(200));
  send_signal(&child, "INT");
  let output = child.wait_with_output().unwrap();
  let stderr = String::from_utf8_lossy(&output.stderr);

  // Exits through the normal failure path rather than being killed.
  assert_eq!(output.status.code(), Some(1), "{stderr}");
  assert!(stderr.contains("teardown in progress"), "{stderr}");
  assert_eq!(env.count_calls("cdk destroy"), 1);
}
