//! Table extraction for statements laid out in columns.
//!
//! Two extractors are tried in order and the first one that yields rows
//! wins: pipe/tab delimited tables, then tables aligned with runs of spaces.
//! Both produce plain cell grids; header detection and row interpretation
//! are shared.

use async_trait::async_trait;
use common::{CandidateTransaction, ImportMethod, TransactionKind};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::{
    ImportStrategy, StatementDocument, StrategyOutcome, kind_from_description, statement_candidate,
};
use crate::parsing::{parse_date, parse_signed_amount};

/// Rows of cells.
pub type Table = Vec<Vec<String>>;

/// Finds tables in statement text.
pub trait TableExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract_tables(&self, text: &str) -> Vec<Table>;
}

/// Consecutive lines whose cells are separated by `|` or tabs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedTableExtractor;

impl DelimitedTableExtractor {
    fn split_row(line: &str) -> Vec<String> {
        let trimmed = line.trim();
        let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
        trimmed
            .split(['|', '\t'])
            .map(|cell| cell.trim().to_string())
            .collect()
    }

    /// Markdown-style separator rows such as `|---|---|`.
    fn is_rule(line: &str) -> bool {
        line.chars().all(|c| matches!(c, '|' | '-' | '+' | ':' | '=' | ' ' | '\t'))
    }
}

impl TableExtractor for DelimitedTableExtractor {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn extract_tables(&self, text: &str) -> Vec<Table> {
        let mut tables = Vec::new();
        let mut current: Table = Vec::new();

        for line in text.lines() {
            let delimited = line.contains('|') || line.contains('\t');
            if delimited && Self::is_rule(line) {
                continue;
            }
            if delimited {
                current.push(Self::split_row(line));
            } else if !current.is_empty() {
                tables.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            tables.push(current);
        }
        tables
    }
}

/// One cell of a whitespace-aligned line with its character span.
#[derive(Debug, Clone, PartialEq)]
struct Cell {
    start: usize,
    end: usize,
    text: String,
}

/// Consecutive lines that split into at least `min_columns` cells on runs of
/// two or more spaces. Cells are assigned to the column of the block's first
/// line they overlap most, so blank debit/credit cells keep later cells in
/// the right column.
#[derive(Debug, Clone, Copy)]
pub struct AlignedTableExtractor {
    pub min_columns: usize,
}

impl Default for AlignedTableExtractor {
    fn default() -> Self {
        Self { min_columns: 3 }
    }
}

impl AlignedTableExtractor {
    fn split_cells(line: &str) -> Vec<Cell> {
        let chars: Vec<char> = line.chars().collect();
        let mut cells = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            if chars[i].is_whitespace() {
                i += 1;
                continue;
            }
            let start = i;
            let mut end = i;
            while end < chars.len() {
                if chars[end].is_whitespace() {
                    let mut run = end;
                    while run < chars.len() && chars[run].is_whitespace() {
                        run += 1;
                    }
                    if run - end >= 2 || run == chars.len() {
                        break;
                    }
                    end = run;
                } else {
                    end += 1;
                }
            }
            cells.push(Cell {
                start,
                end,
                text: chars[start..end].iter().collect(),
            });
            i = end;
        }
        cells
    }

    /// Lays `cells` out under the columns described by `layout`.
    fn align(layout: &[Cell], cells: Vec<Cell>) -> Vec<String> {
        let mut row = vec![String::new(); layout.len()];
        for cell in cells {
            let column = (0..layout.len())
                .max_by_key(|&i| {
                    let span_start = layout[i].start;
                    let span_end = layout.get(i + 1).map_or(usize::MAX, |next| next.start);
                    let overlap = cell.end.min(span_end).saturating_sub(cell.start.max(span_start));
                    // Prefer overlap, then the nearest column start.
                    (overlap, usize::MAX - span_start.abs_diff(cell.start))
                })
                .unwrap_or(0);
            if row[column].is_empty() {
                row[column] = cell.text;
            } else {
                row[column] = format!("{} {}", row[column], cell.text);
            }
        }
        row
    }
}

impl TableExtractor for AlignedTableExtractor {
    fn name(&self) -> &'static str {
        "aligned"
    }

    fn extract_tables(&self, text: &str) -> Vec<Table> {
        let mut tables = Vec::new();
        let mut layout: Option<Vec<Cell>> = None;
        let mut current: Table = Vec::new();

        for line in text.lines() {
            let cells = Self::split_cells(line);
            let texts: Vec<String> = cells.iter().map(|c| c.text.clone()).collect();
            let wide = cells.len() >= self.min_columns;

            if wide && HeaderMap::from_row(&texts).is_transaction_header() {
                // A header row always starts a new table and defines its columns.
                flush(&mut current, &mut tables);
                current.push(texts);
                layout = Some(cells);
            } else if let Some(columns) = layout.as_ref().filter(|_| cells.len() >= 2) {
                current.push(Self::align(columns, cells));
            } else if wide {
                flush(&mut current, &mut tables);
                current.push(texts);
                layout = Some(cells);
            } else {
                flush(&mut current, &mut tables);
                layout = None;
            }
        }
        flush(&mut current, &mut tables);
        tables
    }
}

fn flush(current: &mut Table, tables: &mut Vec<Table>) {
    if current.len() >= 2 {
        tables.push(std::mem::take(current));
    }
    current.clear();
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderMap {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub balance: Option<usize>,
}

const DATE_HEADERS: &[&str] = &["transaction date", "posting date", "txn date", "value date", "date"];
const DESCRIPTION_HEADERS: &[&str] = &[
    "transaction details",
    "description",
    "particulars",
    "narration",
    "details",
    "remarks",
];
const DEBIT_HEADERS: &[&str] = &["debit amount", "withdrawal", "debit", "dr"];
const CREDIT_HEADERS: &[&str] = &["credit amount", "deposit", "credit", "cr"];
const AMOUNT_HEADERS: &[&str] = &["transaction amount", "txn amount", "amount"];
const BALANCE_HEADERS: &[&str] = &["balance"];

fn header_matches(header: &str, name: &str) -> bool {
    // Short abbreviations like "dr" must be whole words, or "address" would
    // count as a debit column.
    if name.len() <= 3 {
        header
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == name)
    } else {
        header.contains(name)
    }
}

impl HeaderMap {
    /// Maps header cells to fields. Each column is claimed at most once,
    /// so "Debit Amount" is a debit column rather than a generic amount.
    pub fn from_row(row: &[String]) -> Self {
        let headers: Vec<String> = row.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut claimed = vec![false; headers.len()];
        let mut find = |names: &[&str]| -> Option<usize> {
            let index = names.iter().find_map(|name| {
                headers
                    .iter()
                    .enumerate()
                    .find(|(i, header)| !claimed[*i] && header_matches(header, name))
                    .map(|(i, _)| i)
            })?;
            claimed[index] = true;
            Some(index)
        };

        let date = find(DATE_HEADERS);
        let description = find(DESCRIPTION_HEADERS);
        let debit = find(DEBIT_HEADERS);
        let credit = find(CREDIT_HEADERS);
        let amount = find(AMOUNT_HEADERS);
        let balance = find(BALANCE_HEADERS);
        Self {
            date,
            description,
            amount,
            debit,
            credit,
            balance,
        }
    }

    /// A usable header names a date column and some money column.
    pub fn is_transaction_header(&self) -> bool {
        self.date.is_some() && (self.amount.is_some() || self.debit.is_some() || self.credit.is_some())
    }

    fn cell<'a>(row: &'a [String], index: Option<usize>) -> &'a str {
        index.and_then(|i| row.get(i)).map_or("", |cell| cell.as_str())
    }

    fn positive(row: &[String], index: Option<usize>) -> Option<Decimal> {
        parse_signed_amount(Self::cell(row, index))
            .map(|value| value.abs())
            .filter(|value| !value.is_zero())
    }

    /// Interprets one data row. Rows without a parsable date or a positive
    /// amount are skipped.
    pub fn read_row(&self, row: &[String]) -> Option<CandidateTransaction> {
        let occurred_on = parse_date(Self::cell(row, self.date))?;
        let description = Self::cell(row, self.description);

        let (amount, kind) = if self.debit.is_some() || self.credit.is_some() {
            if let Some(debit) = Self::positive(row, self.debit) {
                (debit, TransactionKind::Expense)
            } else if let Some(credit) = Self::positive(row, self.credit) {
                (credit, TransactionKind::Income)
            } else {
                return None;
            }
        } else {
            let signed = parse_signed_amount(Self::cell(row, self.amount))?;
            let kind = if signed.is_sign_negative() {
                TransactionKind::Expense
            } else {
                kind_from_description(description)
            };
            (signed.abs(), kind)
        };

        if amount.is_zero() {
            return None;
        }
        Some(statement_candidate(occurred_on, amount, kind, description))
    }
}

/// Reads transactions out of every table with a recognizable header in its
/// first three rows.
pub fn rows_from_tables(tables: &[Table]) -> Vec<CandidateTransaction> {
    let mut rows = Vec::new();
    for table in tables.iter().filter(|t| t.len() >= 2) {
        let header = table
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, row)| (i, HeaderMap::from_row(row)))
            .find(|(_, map)| map.is_transaction_header());

        let Some((header_index, map)) = header else {
            trace!("table without a transaction header skipped");
            continue;
        };
        rows.extend(table.iter().skip(header_index + 1).filter_map(|row| map.read_row(row)));
    }
    rows
}

pub struct TableStrategy {
    extractors: Vec<Box<dyn TableExtractor>>,
}

impl TableStrategy {
    pub fn new(extractors: Vec<Box<dyn TableExtractor>>) -> Self {
        Self { extractors }
    }
}

impl Default for TableStrategy {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DelimitedTableExtractor),
            Box::new(AlignedTableExtractor::default()),
        ])
    }
}

#[async_trait]
impl ImportStrategy for TableStrategy {
    fn method(&self) -> ImportMethod {
        ImportMethod::Table
    }

    async fn extract(&self, document: &StatementDocument) -> StrategyOutcome {
        if document.text.trim().is_empty() {
            return StrategyOutcome::Declined("no text layer".to_string());
        }

        for extractor in &self.extractors {
            let tables = extractor.extract_tables(&document.text);
            let rows = rows_from_tables(&tables);
            debug!(
                "{} extractor found {} tables and {} rows",
                extractor.name(),
                tables.len(),
                rows.len()
            );
            if !rows.is_empty() {
                return StrategyOutcome::Extracted(rows);
            }
        }
        StrategyOutcome::Declined("no transaction tables found".to_string())
    }
}
