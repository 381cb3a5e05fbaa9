//! Process identity synthesis.
//!
//! One protocol runs many times, so a process is keyed per row by the first
//! rule that discriminates:
//! 1. a non-empty assay-name cell, verbatim;
//! 2. `anchor:protocol:parameters` when parameter cells are filled;
//! 3. `anchor/protocol`;
//! 4. `protocol-row` when neither neighbour is filled.
//!
//! The anchor is the nearest filled node cell on one side of the protocol
//! group: the side that yields fewer distinct nodes for that protocol in that
//! group over the whole table, ties going to the preceding side. Empty node
//! cells and protocol columns are looked past. Date and performer are
//! appended as `:date` and `:performer`.

use super::columns::{FieldKind, Layout};
use crate::formats::Table;
use crate::primitives::{
    ANCHOR_SEPARATOR, KEY_SEPARATOR, PARAMETER_JOINER, ROW_SEPARATOR, UNKNOWN_PROTOCOL,
};
use std::collections::{BTreeMap, BTreeSet};

/// Key of a process inside one table.
///
/// Processes with equal keys are the same node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessKey {
    pub protocol: String,
    /// Protocol groups between the anchor's node column and this one; keeps
    /// chained runs of one protocol apart.
    pub offset: usize,
    pub key: String,
}

/// Key generator for one table.
#[derive(Debug)]
pub struct KeyGen<'a> {
    layout: &'a Layout,
    table: &'a Table,
    /// Per protocol group and protocol: anchor on the following node.
    prefer_output: BTreeMap<(usize, &'a str), bool>,
}

impl<'a> KeyGen<'a> {
    /// Cross-tabulate every protocol group against its neighbours over
    /// `rows`.
    #[must_use]
    pub fn new(layout: &'a Layout, table: &'a Table, rows: &[usize]) -> Self {
        type Sides<'t> = (BTreeSet<&'t str>, BTreeSet<&'t str>);
        let mut seen: BTreeMap<(usize, &'a str), Sides<'a>> = BTreeMap::new();
        for (g, group) in layout.groups.iter().enumerate() {
            if !group.is_protocol() {
                continue;
            }
            for &r in rows {
                let protocol = protocol_cell(layout, table, g, r);
                if protocol.is_empty() {
                    continue;
                }
                let (before, after) = seen.entry((g, protocol)).or_default();
                before.extend(filled_before(layout, table, g, r));
                after.extend(filled_after(layout, table, g, r));
            }
        }
        let prefer_output = seen
            .into_iter()
            .map(|(at, (before, after))| (at, after.len() < before.len()))
            .collect();
        Self {
            layout,
            table,
            prefer_output,
        }
    }

    /// Key of the process that protocol group `group` describes in `row`.
    #[must_use]
    pub fn key(&self, group: usize, row: usize) -> ProcessKey {
        let protocol_name = protocol_cell(self.layout, self.table, group, row);
        let protocol = protocol_name.to_string();
        let fields = &self.layout.groups[group].fields;
        let cell = |column: usize| self.table.cell(row, column);

        let assay_name = fields.iter().find_map(|f| match f.kind {
            FieldKind::AssayName(label) if label.names_process() => {
                Some(cell(f.column)).filter(|c| !c.is_empty())
            }
            _ => None,
        });

        let before = filled_before(self.layout, self.table, group, row);
        let after = filled_after(self.layout, self.table, group, row);
        let prefer_output = self
            .prefer_output
            .get(&(group, protocol_name))
            .copied()
            .unwrap_or(false);
        let (first, second) = if prefer_output {
            (after, before)
        } else {
            (before, after)
        };

        let parameters: Vec<String> = fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::ParameterValue(_)))
            .map(|f| {
                (f.column..f.column + f.shape.width())
                    .map(cell)
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        let mut key = match (assay_name, first.or(second)) {
            (Some(name), _) => name.to_string(),
            (None, Some(anchor)) if parameters.iter().any(|p| !p.is_empty()) => format!(
                "{anchor}{KEY_SEPARATOR}{protocol}{KEY_SEPARATOR}{}",
                parameters.join(PARAMETER_JOINER)
            ),
            (None, Some(anchor)) => format!("{anchor}{ANCHOR_SEPARATOR}{protocol}"),
            (None, None) => format!("{protocol}{ROW_SEPARATOR}{row}"),
        };
        for field in fields {
            if matches!(field.kind, FieldKind::Date | FieldKind::Performer) {
                let value = cell(field.column);
                if !value.is_empty() {
                    key.push_str(KEY_SEPARATOR);
                    key.push_str(value);
                }
            }
        }

        let offset = (self.layout.node_before(group).map_or(0, |b| b + 1)..group)
            .filter(|&g| self.layout.groups[g].is_protocol())
            .count();
        ProcessKey {
            protocol,
            offset,
            key,
        }
    }
}

/// Nearest filled node cell before group `group` in `row`.
fn filled_before<'t>(
    layout: &Layout,
    table: &'t Table,
    group: usize,
    row: usize,
) -> Option<&'t str> {
    (0..group)
        .rev()
        .filter(|&g| !layout.groups[g].is_protocol())
        .map(|g| primary_cell(layout, table, g, row))
        .find(|c| !c.is_empty())
}

/// Nearest filled node cell after group `group` in `row`.
fn filled_after<'t>(
    layout: &Layout,
    table: &'t Table,
    group: usize,
    row: usize,
) -> Option<&'t str> {
    (group + 1..layout.groups.len())
        .filter(|&g| !layout.groups[g].is_protocol())
        .map(|g| primary_cell(layout, table, g, row))
        .find(|c| !c.is_empty())
}

/// Protocol name of group `group` in `row`; `unknown` for synthetic groups.
#[must_use]
pub fn protocol_cell<'t>(layout: &Layout, table: &'t Table, group: usize, row: usize) -> &'t str {
    match layout.groups[group].primary {
        Some(column) => table.cell(row, column).trim(),
        None => UNKNOWN_PROTOCOL,
    }
}

/// Primary cell of group `group` in `row`.
#[must_use]
pub fn primary_cell<'t>(layout: &Layout, table: &'t Table, group: usize, row: usize) -> &'t str {
    layout.groups[group]
        .primary
        .map_or("", |column| table.cell(row, column).trim())
}

// =============================================================================
// TESTS
// =============================================================================
