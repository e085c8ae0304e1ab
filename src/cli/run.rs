//! Run command: agent mode.
//!
//! Reads sensor values from the command line or, when none are given, from
//! stdin. Values may be separated by whitespace, commas or semicolons.
//! Prints the actuators space-separated with three decimals.

use super::{CliError, Loaded, SetArg};
use cgpevo::cgp::RunOptions;
use std::io::{self, Read};
use std::path::PathBuf;

/// Split and parse sensor text.
fn parse_sensors(text: &str) -> Result<Vec<f32>, CliError> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| CliError::new(format!("invalid sensor value: {token:?}")))
        })
        .collect()
}

fn format_actuators(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, holds no individual, or
/// the number of sensor values does not match the function.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(
    file: PathBuf,
    sensors: Vec<String>,
    steps: usize,
    set: SetArg,
) -> Result<(), CliError> {
    let (mut function, set) = Loaded::read(&file)?
        .champion(set)
        .ok_or_else(|| CliError::new(format!("{} holds no individuals", file.display())))?;

    let text = if sensors.is_empty() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        sensors.join(" ")
    };
    let values = parse_sensors(&text)?;

    let expected = function.main().layout().sensors;
    if values.len() != expected {
        return Err(CliError::new(format!(
            "expected {expected} sensor values, got {}",
            values.len()
        )));
    }

    let mut outputs = Vec::new();
    for _ in 0..steps.max(1) {
        outputs = function.run(&values, &set, RunOptions::default()).to_vec();
    }
    println!("{}", format_actuators(&outputs));
    Ok(())
}
