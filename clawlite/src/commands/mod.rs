//! CLI command implementations.
//!
//!   run     — prepare workspace, write snapshots, run one worker turn
//!   prepare — prepare workspace only, print resolved paths

pub mod prepare;
pub mod run;

use anyhow::{Context, Result};
use std::io::Read;

/// Input argument, or stdin when it is "-".
pub fn read_input_arg(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut s = String::new();
    std::io::stdin()
        .read_to_string(&mut s)
        .context("Failed to read worker input from stdin")?;
    Ok(s)
}
