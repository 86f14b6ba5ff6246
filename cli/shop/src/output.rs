//! Rendering of command results as text or JSON.

use std::fmt::Display;
use std::io::{self, Write};

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One `Display` line per item.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: Format,
}

impl Output {
    pub fn new(format: Format) -> Self {
        Output { format }
    }

    pub fn item<T: Display + Serialize>(&self, item: &T) -> Result<()> {
        render_item(self.format, &mut io::stdout().lock(), item)
    }

    pub fn list<T: Display + Serialize>(&self, items: &[T]) -> Result<()> {
        render_list(self.format, &mut io::stdout().lock(), items)
    }
}

fn render_item<W: Write, T: Display + Serialize>(format: Format, out: &mut W, item: &T) -> Result<()> {
    match format {
        Format::Text => writeln!(out, "{item}")?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, item)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn render_list<W: Write, T: Display + Serialize>(
    format: Format,
    out: &mut W,
    items: &[T],
) -> Result<()> {
    match format {
        Format::Text => {
            for item in items {
                writeln!(out, "{item}")?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, items)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
