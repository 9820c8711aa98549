//! Validate command

use anyhow::{bail, Context, Result};
use satchel_bag::Bag;

use crate::cli::ValidateArgs;
use crate::output;

pub fn run(args: ValidateArgs) -> Result<()> {
    let bag = Bag::open(args.path.as_std_path())
        .with_context(|| format!("Failed to open bag at {}", args.path))?;
    let result = bag.validate(args.strict)?;

    if result.is_valid {
        output::success(&format!("{} is a valid bag", args.path));
        return Ok(());
    }

    for problem in result.error_message.lines() {
        output::error(problem);
    }
    bail!("{} is not a valid bag", args.path)
}
