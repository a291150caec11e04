mod run;

pub use run::{RunArgs, cmd_run};
