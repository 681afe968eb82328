//! Fill a template table from a `{headers, records}` value.

use serde_json::Value;
use stamp_dom::{NodeId, NodeKind, Tree, names};

use super::{CommitContext, Directive, Invocation, Processor, Recording};
use crate::error::StampError;
use crate::paragraph;

const DIRECTIVES: &[Directive] = &[Directive::new("resolveTable", 1)];

/// `resolveTable(table)` where `table` is
/// `{"headers": ["Name", ...], "records": [["Homer", ...], ...]}`.
///
/// The first cell of the first row is the template for header cells and the
/// first cell of the second row the template for data cells; rows are rebuilt
/// from them and the column grid resized. A `null` table removes the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableResolverProcessor;

impl Processor for TableResolverProcessor {
    fn name(&self) -> &str {
        "table-resolver"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(Tables::default())
    }
}

#[derive(Debug)]
enum TableInstruction {
    Remove(NodeId),
    Fill {
        table: NodeId,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    },
}

#[derive(Debug, Default)]
struct Tables(Vec<TableInstruction>);

impl Recording for Tables {
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let table = invocation.enclosing(tree, NodeKind::Table)?;
        let value = invocation.arg(0);
        if value.is_null() {
            self.0.push(TableInstruction::Remove(table));
            return Ok(vec![table]);
        }

        let type_error = |found: &Value| {
            StampError::unresolved(
                invocation.expression,
                stamp_expr::ExprError::Type {
                    operation: "resolve a table from",
                    found: stamp_expr::type_name(found),
                },
            )
        };
        let texts = |value: Option<&Value>| -> Result<Vec<String>, StampError> {
            match value {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => Ok(items.iter().map(stamp_expr::display).collect()),
                Some(other) => Err(type_error(other)),
            }
        };

        if !value.is_object() {
            return Err(type_error(value));
        }
        let headers = texts(value.get("headers"))?;
        let records = match value.get("records") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows
                .iter()
                .map(|row| texts(Some(row)))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(type_error(other)),
        };

        if rows(tree, table).len() < 2 {
            return Err(StampError::structural(
                "resolveTable() needs a header row and a data row to copy",
            )
            .with_expression(invocation.expression));
        }
        self.0.push(TableInstruction::Fill {
            table,
            headers,
            records,
        });
        Ok(vec![table])
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        let tree = ctx.tree_mut();
        for instruction in self.0 {
            match instruction {
                TableInstruction::Remove(table) => tree.detach(table),
                TableInstruction::Fill {
                    table,
                    headers,
                    records,
                } => fill(tree, table, &headers, &records),
            }
        }
        Ok(())
    }
}

fn rows(tree: &Tree, table: NodeId) -> Vec<NodeId> {
    tree.children(table)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::TableRow)
        .collect()
}

fn fill(tree: &mut Tree, table: NodeId, headers: &[String], records: &[Vec<String>]) {
    let template_rows = rows(tree, table);
    let &[header_template, data_template, ..] = template_rows.as_slice() else {
        return;
    };
    let columns = records
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        tree.detach(table);
        return;
    }

    let Some(index) = tree.index_in_parent(header_template) else {
        return;
    };
    let mut built = Vec::with_capacity(records.len() + 1);
    if !headers.is_empty() {
        built.push(build_row(tree, header_template, headers));
    }
    for record in records {
        built.push(build_row(tree, data_template, record));
    }

    tree.remove_children(table, &template_rows);
    for (offset, row) in built.into_iter().enumerate() {
        tree.insert_child(table, index + offset, row);
    }
    resize_grid(tree, table, columns);
}

/// Copy `template` with one cell per value, each cloned from its first cell.
fn build_row(tree: &mut Tree, template: NodeId, values: &[String]) -> NodeId {
    let row = tree.deep_copy(template);
    let cells: Vec<NodeId> = tree
        .children(row)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::TableCell)
        .collect();
    let Some(&cell_template) = cells.first() else {
        return row;
    };
    tree.remove_children(row, &cells);
    for value in values {
        let cell = tree.deep_copy(cell_template);
        set_cell_text(tree, cell, value);
        tree.append_child(row, cell);
    }
    row
}

/// Keep the cell's first paragraph (and its formatting) holding `text`.
fn set_cell_text(tree: &mut Tree, cell: NodeId, text: &str) {
    let paragraphs: Vec<NodeId> = tree
        .children(cell)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::Paragraph)
        .collect();
    if let Some((&first, rest)) = paragraphs.split_first() {
        tree.remove_children(cell, rest);
        paragraph::set_text(tree, first, text);
    } else {
        let p = tree.create(names::PARAGRAPH);
        tree.append_child(cell, p);
        paragraph::set_text(tree, p, text);
    }
}

fn resize_grid(tree: &mut Tree, table: NodeId, columns: usize) {
    let Some(grid) = tree.child_of_kind(table, NodeKind::TableGrid) else {
        return;
    };
    let existing = tree.children(grid).to_vec();
    let Some(&first) = existing.first() else {
        return;
    };
    let template = tree.deep_copy(first);
    tree.remove_children(grid, &existing);
    for _ in 0..columns {
        let column = tree.deep_copy(template);
        tree.append_child(grid, column);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stamp_dom::parse_str;

    use super::*;
    use crate::testing::{document, document_xml, para, stamp};

    const TABLE: &str = r#"<w:tbl><w:tblPr/><w:tblGrid><w:gridCol w:w="100"/><w:gridCol w:w="200"/></w:tblGrid><w:tr><w:tc><w:tcPr/><w:p><w:r><w:rPr><w:b/></w:rPr><w:t>H</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>D</w:t></w:r></w:p><w:p/></w:tc></w:tr></w:tbl>"#;

    fn cell_texts(tree: &Tree, table: NodeId) -> Vec<Vec<String>> {
        rows(tree, table)
            .into_iter()
            .map(|row| {
                tree.children(row)
                    .iter()
                    .filter(|&&c| tree.kind(c) == NodeKind::TableCell)
                    .map(|&c| tree.text_content(c))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_fill() {
        let mut tree = parse_str(TABLE).unwrap();
        let table = tree.root();
        fill(
            &mut tree,
            table,
            &["Name".to_owned(), "Role".to_owned(), "Age".to_owned()],
            &[
                vec!["Homer".to_owned(), "Father".to_owned(), "39".to_owned()],
                vec!["Bart".to_owned(), "Son".to_owned(), "10".to_owned()],
            ],
        );

        assert_eq!(
            cell_texts(&tree, table),
            vec![
                vec!["Name", "Role", "Age"],
                vec!["Homer", "Father", "39"],
                vec!["Bart", "Son", "10"],
            ]
        );
        let grid = tree.child_of_kind(table, NodeKind::TableGrid).unwrap();
        assert_eq!(tree.children(grid).len(), 3);
        assert!(
            tree.children(grid)
                .iter()
                .all(|&c| tree.attr(c, "w:w") == Some("100"))
        );
        let header_cell = tree.children(rows(&tree, table)[0])[0];
        assert!(tree.to_xml(header_cell).contains("<w:b/>"));
        let data_cell = tree.children(rows(&tree, table)[1])[0];
        assert_eq!(
            tree.descendants_of_kind(data_cell, NodeKind::Paragraph).len(),
            1
        );
    }

    #[test]
    fn test_fill_without_content_removes_table() {
        let mut tree = parse_str(&format!("<w:body>{TABLE}</w:body>")).unwrap();
        let table = tree.children(tree.root())[0];
        fill(&mut tree, table, &[], &[]);
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_resolve_table_from_comment() {
        let table = format!(
            r#"<w:tbl><w:tr><w:tc><w:p><w:commentRangeStart w:id="4"/><w:r><w:t>H</w:t></w:r><w:commentRangeEnd w:id="4"/><w:r><w:commentReference w:id="4"/></w:r></w:p></w:tc></w:tr><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>"#,
            para("D")
        );
        let mut package = document(&table, &[("4", "resolveTable(cast)")]);
        stamp(
            &mut package,
            &json!({"cast": {"headers": ["Name", "Age"], "records": [["Homer", 39], ["Bart", null]]}}),
        )
        .unwrap();

        let tree = package.document();
        let table = tree.descendants_of_kind(tree.root(), NodeKind::Table)[0];
        assert_eq!(
            cell_texts(tree, table),
            vec![vec!["Name", "Age"], vec!["Homer", "39"], vec!["Bart", ""]]
        );
        assert!(!document_xml(&package).contains("comment"));
    }

    #[test]
    fn test_null_table_is_removed() {
        let table = format!(
            "<w:tbl><w:tr><w:tc>{}</w:tc></w:tr><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>",
            para("#{resolveTable(t)}"),
            para("D")
        );
        let mut package = document(&format!("{table}{}", para("after")), &[]);
        stamp(&mut package, &json!({"t": null})).unwrap();
        assert_eq!(crate::testing::body_texts(&package), vec!["after"]);
    }

    #[test]
    fn test_single_row_table_is_structural() {
        let table = format!("<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>", para("#{resolveTable(t)}"));
        let mut package = document(&table, &[]);
        let err = stamp(&mut package, &json!({"t": {"headers": ["a"], "records": []}})).unwrap_err();
        assert_eq!(err.kind, crate::StampErrorKind::Structural);
    }
}
