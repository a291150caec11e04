//! Build triggers.
//!
//! Both triggers are fire-and-forget: they return once the remote side has
//! accepted the work, never after it completes. Completion is observed later
//! through the artifact registry.

pub mod linux;
pub mod windows;

pub use linux::LinuxBuildTrigger;
pub use windows::WindowsBuildTrigger;
