//! Interactive model picker

use anyhow::{Context, Result};
use qa_serve::ModelVariant;
use std::io::{BufRead, Write};

/// Numbered menu of `compatible`, defaulting to `recommended`.
///
/// Accepts a menu number or a model id. Empty input or end of input picks
/// the default; anything else asks again.
pub fn prompt_for_variant<'a, R, W>(
    compatible: &[&'a ModelVariant],
    recommended: &ModelVariant,
    input: &mut R,
    output: &mut W,
) -> Result<&'a ModelVariant>
where
    R: BufRead,
    W: Write,
{
    let default_index = compatible
        .iter()
        .position(|v| v.id == recommended.id)
        .unwrap_or(compatible.len().saturating_sub(1));
    let default = *compatible
        .get(default_index)
        .context("No compatible models to choose from")?;

    writeln!(output, "Models that fit on this GPU:")?;
    for (idx, variant) in compatible.iter().enumerate() {
        let marker = if idx == default_index {
            "  (recommended)"
        } else {
            ""
        };
        writeln!(
            output,
            "  [{}] {:<36} {:>7}  {}{}",
            idx + 1,
            variant.display_label,
            variant.approx_download,
            variant.quality_note,
            marker
        )?;
    }

    loop {
        write!(output, "Select a model [{}]: ", default_index + 1)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(default);
        }

        let answer = line.trim();
        if answer.is_empty() {
            return Ok(default);
        }

        if let Ok(number) = answer.parse::<usize>() {
            if (1..=compatible.len()).contains(&number) {
                return Ok(compatible[number - 1]);
            }
        } else if let Some(variant) = compatible.iter().find(|v| v.id == answer) {
            return Ok(*variant);
        }

        writeln!(
            output,
            "Invalid choice '{}'. Enter a number from 1 to {}.",
            answer,
            compatible.len()
        )?;
    }
}
