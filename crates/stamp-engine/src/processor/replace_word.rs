//! Replace the words a comment spans with a value.

use stamp_dom::{NodeId, NodeKind, Tree};

use super::{CommitContext, Directive, Invocation, Processor, Recording};
use crate::error::StampError;
use crate::paragraph::set_run_text;

const DIRECTIVES: &[Directive] = &[Directive::new("replaceWordWith", 1)];

/// `replaceWordWith(value)`: the runs between the comment's anchors collapse
/// into one run holding the value, keeping the first run's formatting.
///
/// Both anchors must sit in the same paragraph (or other run container).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceWordProcessor;

impl Processor for ReplaceWordProcessor {
    fn name(&self) -> &str {
        "replace-word"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(Replacements::default())
    }
}

#[derive(Debug, Default)]
struct Replacements(Vec<(Vec<NodeId>, String)>);

impl Recording for Replacements {
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let comment = invocation.comment()?;
        let span = tree
            .parent(comment.start)
            .filter(|&p| tree.parent(comment.end) == Some(p))
            .zip(tree.index_in_parent(comment.start))
            .zip(tree.index_in_parent(comment.end));
        let Some(((parent, first), last)) = span else {
            return Err(StampError::structural(format!(
                "comment {} must start and end in the same paragraph",
                comment.id
            ))
            .with_expression(invocation.expression));
        };

        let runs: Vec<NodeId> = tree.children(parent)[first..=last]
            .iter()
            .copied()
            .filter(|&n| tree.kind(n) == NodeKind::Run)
            .collect();
        if runs.is_empty() {
            tracing::warn!(id = %comment.id, "Comment spans no words to replace");
        }
        self.0.push((runs, stamp_expr::display(invocation.arg(0))));
        Ok(Vec::new())
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        let tree = ctx.tree_mut();
        for (runs, text) in self.0 {
            let live: Vec<NodeId> = runs.into_iter().filter(|&r| tree.is_attached(r)).collect();
            let Some((&first, rest)) = live.split_first() else {
                continue;
            };
            set_run_text(tree, first, &text);
            for &run in rest {
                tree.detach(run);
            }
        }
        Ok(())
    }
}
