//! Repeat a table row once per list item.

use stamp_dom::{NodeId, NodeKind, Tree};

use super::{CommitContext, Directive, Invocation, Processor, Recording, Repetition};
use crate::error::StampError;

const DIRECTIVES: &[Directive] = &[Directive::new("repeatTableRow", 1)];

/// `repeatTableRow(list)`: the enclosing row is replaced by one copy per item,
/// each stamped with the item as context.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatTableRowProcessor;

impl Processor for RepeatTableRowProcessor {
    fn name(&self) -> &str {
        "repeat-table-row"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(RowRepetitions::default())
    }
}

#[derive(Debug, Default)]
struct RowRepetitions(Vec<Repetition>);

impl Recording for RowRepetitions {
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let items = invocation.list_arg(0)?;
        let row = invocation.enclosing(tree, NodeKind::TableRow)?;
        let table = tree
            .parent(row)
            .filter(|&t| tree.kind(t) == NodeKind::Table)
            .ok_or_else(|| {
                StampError::structural("table row is not inside a table")
                    .with_expression(invocation.expression)
            })?;
        tracing::debug!(count = items.len(), "Recorded table row repeat");
        self.0.push(Repetition {
            parent: table,
            elements: vec![row],
            items,
        });
        Ok(vec![row])
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        for repetition in &self.0 {
            repetition.apply_in_place(ctx)?;
        }
        Ok(())
    }
}
