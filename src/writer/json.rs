//! JSON export for renderers living outside this crate.

use std::io::Write;

use anyhow::Result;

use crate::model::Item;

pub fn to_string(items: &[Item]) -> Result<String> {
    Ok(serde_json::to_string_pretty(items)?)
}

pub fn emit<W: Write>(items: &[Item], out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, items)?;
    writeln!(out)?;
    Ok(())
}
