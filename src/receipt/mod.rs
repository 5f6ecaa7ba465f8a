//! Order summary

use std::{fmt::Write, io};

use rusty_money::{Money, iso::Currency};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    discounts::percent_points,
    exchange::{ExchangeError, ExchangeRates},
    items::OrderLineItem,
    pricing::OrderTotals,
};

/// Errors that can occur when writing an order summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A line item could not be shown in the order currency.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Write the line items and totals of an order.
///
/// Line item prices are converted into the currency of `totals`.
///
/// # Errors
///
/// Returns an error if an item cannot be converted or the output cannot be written.
pub fn write_order_summary(
    mut out: impl io::Write,
    items: &[OrderLineItem],
    totals: &OrderTotals,
    rates: &ExchangeRates,
) -> Result<(), SummaryError> {
    let mut builder = Builder::default();

    builder.push_record(["", "Course", "Duration", "Price", "Was", "Saving"]);

    for (idx, item) in items.iter().enumerate() {
        let price = item.display_price(rates, totals.currency)?;
        let was = item.display_original_price(rates, totals.currency)?;

        let (was, saving) = match was {
            Some(was) => (
                format!("{was}"),
                format!("{}%", percent_points(&item.savings_percent()).round_dp(0)),
            ),
            None => (String::new(), String::new()),
        };

        builder.push_record([
            format!("#{}", idx + 1),
            item.title().to_string(),
            item.duration_label().to_string(),
            format!("{price}"),
            was,
            saving,
        ]);
    }

    write_items_table(&mut out, builder)?;
    write_totals(&mut out, totals)
}

fn write_items_table(out: &mut impl io::Write, builder: Builder) -> Result<(), SummaryError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(3..6), Alignment::right());
    table.modify(Columns::new(4..5), color_dark_grey());

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| SummaryError::IO)
}

fn write_totals(out: &mut impl io::Write, totals: &OrderTotals) -> Result<(), SummaryError> {
    let discount_label = match &totals.coupon {
        Some(coupon) => format!(" Discount ({}):", coupon.code),
        None => " Discount:".to_string(),
    };

    let mut lines: Vec<(String, String)> = vec![
        (" Subtotal:".to_string(), format!("{}  ", totals.subtotal)),
        (discount_label, format!("-{}  ", totals.discount)),
    ];

    if !is_zero(&totals.tax) {
        lines.push((" Tax:".to_string(), format!("{}  ", totals.tax)));
    }

    lines.push((
        " \x1b[1mTotal:\x1b[0m".to_string(),
        format!("\x1b[1m{}  \x1b[0m", totals.total),
    ));

    let label_width = lines
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or_default();

    let value_width = lines
        .iter()
        .map(|(_, value)| visible_width(value))
        .max()
        .unwrap_or_default();

    for (label, value) in &lines {
        write_summary_line(out, label, value, label_width, value_width)?;
    }

    writeln!(out).map_err(|_err| SummaryError::IO)
}

fn is_zero(money: &Money<'_, Currency>) -> bool {
    money.to_minor_units() == 0
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// Writes a summary line with a right-aligned label and a fixed-width value column.
fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), SummaryError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| SummaryError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}
