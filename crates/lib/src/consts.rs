use std::time::Duration;

/// Registry watch budget: attempts per artifact family.
pub const REGISTRY_POLL_ATTEMPTS: u32 = 30;
pub const REGISTRY_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Management-agent readiness budget for the Windows build instance.
pub const READINESS_POLL_ATTEMPTS: u32 = 60;
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed wait before the first readiness probe while the instance boots.
pub const INSTANCE_BOOT_WAIT: Duration = Duration::from_secs(600);

/// Agent ping status reported once the instance accepts remote commands.
pub const PING_STATUS_ONLINE: &str = "Online";

/// Key prefix under the staging bucket for remote command output.
pub const COMMAND_OUTPUT_PREFIX: &str = "runcommand";

/// Object key of the packaged Windows build scripts.
pub const SCRIPTS_ARCHIVE_KEY: &str = "windows-build-scripts.zip";

pub const AWS_BIN_VAR: &str = "IMGBUILD_AWS_BIN";
pub const CDK_BIN_VAR: &str = "IMGBUILD_CDK_BIN";
pub const WINDOWS_SCRIPTS_DIR_VAR: &str = "IMGBUILD_WINDOWS_SCRIPTS_DIR";

pub const DEFAULT_WINDOWS_SCRIPTS_DIR: &str = "docker_images/windows";
