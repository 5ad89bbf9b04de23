use crate::quota::UsageLedger;
use anyhow::Result;
use std::path::Path;

/// Reports the counter, optionally resetting it first.
pub fn usage_report(ledger: &UsageLedger, usage_file: &Path, reset: bool) -> Result<String> {
    if reset {
        ledger.reset()?;
        return Ok(format!(
            "Usage counter {} was reset. Remaining: {}/{}.",
            usage_file.display(),
            ledger.remaining()?,
            ledger.max()
        ));
    }

    Ok(format!(
        "Remaining requests: {}/{} ({}).",
        ledger.remaining()?,
        ledger.max(),
        usage_file.display()
    ))
}
