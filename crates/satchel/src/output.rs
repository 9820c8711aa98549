//! Terminal output

use console::style;
use satchel_ledger::BagStatus;

pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Written to stderr so `--json` output stays parseable
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", style("→").cyan(), msg);
}

pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Indented `label: value` line
pub fn kv(label: &str, value: &str) {
    println!("  {:<18} {}", style(format!("{}:", label)).dim(), value);
}

/// Status name colored by where it leaves the bag
pub fn status(status: BagStatus) -> String {
    let name = status.as_str();
    match status {
        BagStatus::Deposited | BagStatus::Verified => style(name).green().to_string(),
        BagStatus::Failed | BagStatus::VerifyFailed => style(name).red().bold().to_string(),
        BagStatus::DepositSkipped => style(name).yellow().to_string(),
        _ => style(name).dim().to_string(),
    }
}
