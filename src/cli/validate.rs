//! Validate command implementation.

use super::{CliError, Loaded, SetArg};
use cgpevo::{Function, InstructionSet};
use std::path::PathBuf;

fn print_check(name: &str, ok: bool) {
    let status = if ok { "OK" } else { "FAILED" };
    println!("  {name:.<40} {status}");
}

fn check(label: &str, function: &Function, set: &InstructionSet) -> bool {
    match function.validate(set) {
        Ok(()) => true,
        Err(e) => {
            print_check(label, false);
            println!("    {e}");
            false
        }
    }
}

/// Execute the validate command.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or any function in it is
/// structurally invalid.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(file: PathBuf, set: SetArg) -> Result<(), CliError> {
    println!("Validating: {}", file.display());
    println!();

    let loaded = Loaded::read(&file)?;
    print_check("Load", true);

    let mut checked = 0_usize;
    let mut failed = 0_usize;
    if let Loaded::Function(function) = &loaded {
        checked += 1;
        if !check("function", function, &set.build()) {
            failed += 1;
        }
    }
    for (p, population) in loaded.populations().into_iter().enumerate() {
        for (i, individual) in population.individuals().iter().enumerate() {
            checked += 1;
            let label = format!("population {p} individual {i}");
            if !check(&label, &individual.function, population.set()) {
                failed += 1;
            }
        }
    }

    print_check(&format!("{checked} functions"), failed == 0);
    println!();
    if failed > 0 {
        return Err(CliError::new(format!("{failed} of {checked} functions invalid")));
    }
    println!("Validation successful!");
    Ok(())
}
