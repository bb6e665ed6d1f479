//! Pipeline worker that runs Eric Zimmerman's RECmd over extracted triage
//! archives (KAPE-style collections) and reports the resulting CSV.

pub mod archive;
pub mod cli;
pub mod config;
pub mod constants;
pub mod files;
pub mod hostname;
pub mod logging;
pub mod process;
pub mod progress;
pub mod recmd;
pub mod result;
pub mod task;
