//! JSON output formatter

use codeguard_core::AuditReport;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

pub fn output_report(report: &AuditReport) -> Result<()> {
    println!("{}", report.to_json_pretty().into_diagnostic()?);
    Ok(())
}

pub fn output_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}
