//! Artifact families: one registry repository plus the image tags a
//! successful build run must leave in it.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyKind {
  LinuxArm,
  LinuxX86,
  Windows,
}

impl FamilyKind {
  /// Watch order used by a deploy.
  pub const ALL: [FamilyKind; 3] = [FamilyKind::LinuxArm, FamilyKind::LinuxX86, FamilyKind::Windows];

  pub fn as_str(&self) -> &'static str {
    match self {
      FamilyKind::LinuxArm => "linux-arm",
      FamilyKind::LinuxX86 => "linux-x86",
      FamilyKind::Windows => "windows",
    }
  }

  /// Environment variable the infra description reads the repository name from.
  pub fn repository_var(&self) -> &'static str {
    match self {
      FamilyKind::LinuxArm => "ECR_LINUX_AARCH_REPO_NAME",
      FamilyKind::LinuxX86 => "ECR_LINUX_X86_REPO_NAME",
      FamilyKind::Windows => "ECR_WINDOWS_REPO_NAME",
    }
  }

  /// Repository name used when no override is configured.
  pub fn default_repository(&self, project: &str) -> String {
    let suffix = match self {
      FamilyKind::LinuxArm => "linux-aarch",
      FamilyKind::LinuxX86 => "linux-x86",
      FamilyKind::Windows => "windows",
    };
    format!("{project}-docker-images-{suffix}")
  }

  pub fn default_tags(&self) -> &'static [&'static str] {
    match self {
      FamilyKind::LinuxArm => LINUX_ARM_TAGS,
      FamilyKind::LinuxX86 => LINUX_X86_TAGS,
      FamilyKind::Windows => WINDOWS_TAGS,
    }
  }
}

impl fmt::Display for FamilyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

const LINUX_ARM_TAGS: &[&str] = &[
  "ubuntu-18.04_gcc-7x",
  "ubuntu-20.04_gcc-7x",
  "ubuntu-20.04_gcc-8x",
  "ubuntu-20.04_clang-7x",
  "ubuntu-20.04_clang-8x",
  "ubuntu-20.04_clang-9x",
  "ubuntu-20.04_clang-10x",
  "amazonlinux-2_gcc-7x",
];

const LINUX_X86_TAGS: &[&str] = &[
  "ubuntu-16.04_gcc-5x",
  "ubuntu-18.04_gcc-7x",
  "ubuntu-18.04_clang-6x",
  "ubuntu-20.04_clang-7x",
  "ubuntu-20.04_clang-8x",
  "ubuntu-20.04_clang-9x",
  "ubuntu-20.04_clang-10x",
  "ubuntu-20.04_gcc-7x",
  "ubuntu-20.04_gcc-8x",
  "centos-7_gcc-4x",
  "amazonlinux-2_gcc-7x",
];

const WINDOWS_TAGS: &[&str] = &["vs2015", "vs2017"];

/// A registry repository and the ordered tags expected in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactFamily {
  pub kind: FamilyKind,
  pub repository: String,
  pub tags: Vec<String>,
}

impl ArtifactFamily {
  pub fn new(kind: FamilyKind, repository: impl Into<String>, tags: Vec<String>) -> Self {
    Self {
      kind,
      repository: repository.into(),
      tags,
    }
  }

  /// Family with its default tag set.
  pub fn with_default_tags(kind: FamilyKind, repository: impl Into<String>) -> Self {
    let tags = kind.default_tags().iter().map(|t| t.to_string()).collect();
    Self::new(kind, repository, tags)
  }
}
