//! Line-oriented export: one item per line, `<kind> <args...>`.
//!
//! Strings are double-quoted, numbers printed as-is and an absent board gap
//! as `None`. Meant for diffing and inspection, never read back.

use std::io::{self, Write};

use crate::model::Item;

pub fn serialize(item: &Item) -> String {
    let args: Vec<String> = match item {
        Item::Board { width, height, gap } => vec![
            width.to_string(),
            height.to_string(),
            gap.map_or_else(|| "None".to_string(), |g| g.to_string()),
        ],
        Item::Pin { x, y, dout, din } | Item::Pinq { x, y, dout, din } => {
            [x, y, dout, din].iter().map(|v| v.to_string()).collect()
        }
        Item::Wire {
            x1,
            y1,
            x2,
            y2,
            width,
        } => [x1, y1, x2, y2, width].iter().map(|v| v.to_string()).collect(),
        Item::Text { text, x, y, height } => vec![
            format!("\"{text}\""),
            x.to_string(),
            y.to_string(),
            height.to_string(),
        ],
    };
    format!("{} {}", item.kind(), args.join(" "))
}

pub fn emit<W: Write>(items: &[Item], out: &mut W) -> io::Result<()> {
    for item in items {
        writeln!(out, "{}", serialize(item))?;
    }
    Ok(())
}
