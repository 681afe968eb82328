//! Conditional display of paragraphs, table rows and tables.

use serde_json::Value;
use stamp_dom::{NodeId, NodeKind, Tree};

use super::{CommitContext, Directive, Invocation, Processor, Recording};
use crate::error::StampError;

const DIRECTIVES: &[Directive] = &[
    Directive::new("displayParagraphIf", 1),
    Directive::new("displayParagraphIfPresent", 1),
    Directive::new("displayParagraphIfAbsent", 1),
    Directive::new("displayTableRowIf", 1),
    Directive::new("displayTableRowIfPresent", 1),
    Directive::new("displayTableRowIfAbsent", 1),
    Directive::new("displayTableIf", 1),
    Directive::new("displayTableIfPresent", 1),
    Directive::new("displayTableIfAbsent", 1),
];

#[derive(Debug, Clone, Copy)]
enum Condition {
    Truthy,
    Present,
    Absent,
}

impl Condition {
    fn holds(self, value: &Value) -> bool {
        match self {
            Self::Truthy => stamp_expr::truthy(value),
            Self::Present => !value.is_null(),
            Self::Absent => value.is_null(),
        }
    }
}

/// Split `displayTableRowIfPresent` into the target kind and the condition.
fn parse(name: &str) -> Option<(NodeKind, Condition)> {
    let rest = name.strip_prefix("display")?;
    let (kind, rest) = if let Some(rest) = rest.strip_prefix("Paragraph") {
        (NodeKind::Paragraph, rest)
    } else if let Some(rest) = rest.strip_prefix("TableRow") {
        (NodeKind::TableRow, rest)
    } else {
        (NodeKind::Table, rest.strip_prefix("Table")?)
    };
    let condition = match rest {
        "If" => Condition::Truthy,
        "IfPresent" => Condition::Present,
        "IfAbsent" => Condition::Absent,
        _ => return None,
    };
    Some((kind, condition))
}

/// Removes the enclosing paragraph, row or table when its condition fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayIfProcessor;

impl Processor for DisplayIfProcessor {
    fn name(&self) -> &str {
        "display-if"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(HiddenNodes::default())
    }
}

/// Nodes whose condition failed.
#[derive(Debug, Default)]
struct HiddenNodes(Vec<NodeId>);

impl Recording for HiddenNodes {
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let Some((kind, condition)) = parse(invocation.directive.name) else {
            return Ok(Vec::new());
        };
        let target = invocation.enclosing(tree, kind)?;
        if condition.holds(invocation.arg(0)) {
            return Ok(Vec::new());
        }
        self.0.push(target);
        Ok(vec![target])
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        let tree = ctx.tree_mut();
        for node in self.0 {
            tree.detach(node);
        }
        Ok(())
    }
}
