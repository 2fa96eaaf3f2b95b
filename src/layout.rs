use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Hard caps on the workspace arrangement. Horizontal depth 2 allows at most
/// four columns, vertical depth 1 at most two rows; together with the global
/// pane cap they keep single-level contraction on delete sufficient.
pub const MAX_PANES: usize = 8;
pub const MAX_HORIZONTAL_DEPTH: usize = 2;
pub const MAX_VERTICAL_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Children side by side (columns)
    Horizontal,
    /// Children stacked (rows)
    Vertical,
}

/// What a leaf pane hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PaneKind {
    #[default]
    Agent,
    Grove,
    FilePicker,
    Shell,
    Custom,
}

impl PaneKind {
    pub fn label(&self) -> &'static str {
        match self {
            PaneKind::Agent => "Agent",
            PaneKind::Grove => "Grove",
            PaneKind::FilePicker => "Files",
            PaneKind::Shell => "Shell",
            PaneKind::Custom => "Custom",
        }
    }

    pub fn next(&self) -> PaneKind {
        match self {
            PaneKind::Agent => PaneKind::Grove,
            PaneKind::Grove => PaneKind::FilePicker,
            PaneKind::FilePicker => PaneKind::Shell,
            PaneKind::Shell => PaneKind::Custom,
            PaneKind::Custom => PaneKind::Agent,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("pane limit reached ({MAX_PANES} panes)")]
    PaneLimit,
    #[error("split depth limit reached")]
    DepthLimit,
    #[error("no pane at that position")]
    NoSuchPane,
    #[error("cannot close the last pane")]
    LastPane,
}

/// Recursive split/pane description of a workspace arrangement.
/// Every split has exactly two children; panes are addressed by their
/// in-order ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayoutNode {
    Split {
        direction: SplitDirection,
        children: Box<[LayoutNode; 2]>,
    },
    Pane {
        kind: PaneKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_command: Option<String>,
    },
}

impl Default for LayoutNode {
    fn default() -> Self {
        LayoutNode::Pane {
            kind: PaneKind::default(),
            custom_command: None,
        }
    }
}

impl LayoutNode {
    pub fn pane(kind: PaneKind) -> Self {
        LayoutNode::Pane {
            kind,
            custom_command: None,
        }
    }

    pub fn pane_count(&self) -> usize {
        match self {
            LayoutNode::Pane { .. } => 1,
            LayoutNode::Split { children, .. } => {
                children[0].pane_count() + children[1].pane_count()
            }
        }
    }

    /// The panes in order, left to right / top to bottom
    pub fn panes(&self) -> Vec<&LayoutNode> {
        let mut out = Vec::new();
        self.collect_panes(&mut out);
        out
    }

    fn collect_panes<'a>(&'a self, out: &mut Vec<&'a LayoutNode>) {
        match self {
            LayoutNode::Pane { .. } => out.push(self),
            LayoutNode::Split { children, .. } => {
                children[0].collect_panes(out);
                children[1].collect_panes(out);
            }
        }
    }

    pub fn pane_at_mut(&mut self, ordinal: usize) -> Option<&mut LayoutNode> {
        let mut remaining = ordinal;
        self.pane_at_mut_inner(&mut remaining)
    }

    fn pane_at_mut_inner(&mut self, remaining: &mut usize) -> Option<&mut LayoutNode> {
        match self {
            LayoutNode::Pane { .. } => {
                if *remaining == 0 {
                    Some(self)
                } else {
                    *remaining -= 1;
                    None
                }
            }
            LayoutNode::Split { children, .. } => {
                let [first, second] = children.as_mut();
                if let Some(found) = first.pane_at_mut_inner(remaining) {
                    return Some(found);
                }
                second.pane_at_mut_inner(remaining)
            }
        }
    }

    /// Replace the addressed pane with a split whose first child is the
    /// original pane and second a fresh default pane
    pub fn split_pane(
        &mut self,
        ordinal: usize,
        direction: SplitDirection,
    ) -> Result<(), LayoutError> {
        if self.pane_count() >= MAX_PANES {
            return Err(LayoutError::PaneLimit);
        }
        let mut remaining = ordinal;
        match self.split_inner(&mut remaining, direction, 0, 0) {
            Ok(true) => Ok(()),
            Ok(false) => Err(LayoutError::NoSuchPane),
            Err(e) => Err(e),
        }
    }

    fn split_inner(
        &mut self,
        remaining: &mut usize,
        direction: SplitDirection,
        h_depth: usize,
        v_depth: usize,
    ) -> Result<bool, LayoutError> {
        match self {
            LayoutNode::Pane { .. } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(false);
                }
                let within_cap = match direction {
                    SplitDirection::Horizontal => h_depth < MAX_HORIZONTAL_DEPTH,
                    SplitDirection::Vertical => v_depth < MAX_VERTICAL_DEPTH,
                };
                if !within_cap {
                    return Err(LayoutError::DepthLimit);
                }
                let original = std::mem::take(self);
                *self = LayoutNode::Split {
                    direction,
                    children: Box::new([original, LayoutNode::default()]),
                };
                Ok(true)
            }
            LayoutNode::Split {
                direction: here,
                children,
            } => {
                let (h, v) = match here {
                    SplitDirection::Horizontal => (h_depth + 1, v_depth),
                    SplitDirection::Vertical => (h_depth, v_depth + 1),
                };
                let [first, second] = children.as_mut();
                if first.split_inner(remaining, direction, h, v)? {
                    return Ok(true);
                }
                second.split_inner(remaining, direction, h, v)
            }
        }
    }

    /// Remove the addressed pane; its parent split collapses into the
    /// surviving sibling. Single-level contraction is enough because the
    /// depth caps keep every parent a direct split.
    pub fn delete_pane(&mut self, ordinal: usize) -> Result<(), LayoutError> {
        if matches!(self, LayoutNode::Pane { .. }) {
            return if ordinal == 0 {
                Err(LayoutError::LastPane)
            } else {
                Err(LayoutError::NoSuchPane)
            };
        }
        let mut remaining = ordinal;
        if self.delete_inner(&mut remaining)? {
            Ok(())
        } else {
            Err(LayoutError::NoSuchPane)
        }
    }

    fn delete_inner(&mut self, remaining: &mut usize) -> Result<bool, LayoutError> {
        let LayoutNode::Split { children, .. } = self else {
            return Ok(false);
        };

        for side in 0..2 {
            if matches!(children[side], LayoutNode::Pane { .. }) {
                if *remaining == 0 {
                    let survivor = std::mem::take(&mut children[1 - side]);
                    *self = survivor;
                    return Ok(true);
                }
                *remaining -= 1;
            } else if children[side].delete_inner(remaining)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// A named, persistable workspace arrangement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomLayoutConfig {
    pub id: Uuid,
    pub name: String,
    pub root: LayoutNode,
}

impl CustomLayoutConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            root: LayoutNode::pane(PaneKind::Agent),
        }
    }
}
