//! Markdown tables in "pipe" layout.

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};

/// One table column. Columns shorter than the longest one are padded with empty cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub cells: Vec<String>,
    pub numeric: bool,
}

impl Column {
    pub fn text(header: &str, cells: Vec<String>) -> Self {
        Self { header: header.to_string(), cells, numeric: false }
    }

    pub fn numbers<T: ToString>(header: &str, values: &[T]) -> Self {
        Self {
            header: header.to_string(),
            cells: values.iter().map(|v| v.to_string()).collect(),
            numeric: true,
        }
    }

    /// Floats with 6 significant digits, see [`general_format`].
    pub fn floats(header: &str, values: &[f64]) -> Self {
        Self {
            header: header.to_string(),
            cells: values.iter().map(|v| general_format(*v)).collect(),
            numeric: true,
        }
    }
}

/// Formats like printf's `%g`: 6 significant digits, no trailing zeros, scientific
/// notation below 1e-4 and from 1e6 on.
pub fn general_format(value: f64) -> String {
    if value == 0. || !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };
    if exponent < -4 || exponent >= 6 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Renders the columns as a Markdown pipe table. Numeric columns are right aligned.
pub fn pipe_table(columns: &[Column]) -> String {
    let rows = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0);

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.header.clone()));
    for row in 0..rows {
        builder.push_record(columns.iter().map(|c| c.cells.get(row).cloned().unwrap_or_default()));
    }

    let mut table = builder.build();
    table.with(Style::markdown());
    for (index, column) in columns.iter().enumerate() {
        if column.numeric {
            table.modify(Columns::single(index), Alignment::right());
        }
    }
    table.to_string()
}
