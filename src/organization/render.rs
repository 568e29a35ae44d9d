//! Organization chart renderers
//!
//! Both views walk the forest the same way; they only differ in what each
//! node turns into.

use serde::Serialize;

use super::hierarchy::ForestNode;

/// Shown when there is nothing to draw
pub const EMPTY_STATE_MESSAGE: &str = "아직 조직도가 설정되지 않았습니다.";

/// Turns one forest node (with its already rendered children) into output
pub trait NodeRenderer {
    type Output;

    fn render(&self, node: &ForestNode, depth: usize, children: Vec<Self::Output>) -> Self::Output;
}

/// Render every tree of the forest, roots at depth 0.
pub fn render_forest<R: NodeRenderer>(renderer: &R, forest: &[ForestNode]) -> Vec<R::Output> {
    forest
        .iter()
        .map(|node| render_node(renderer, node, 0))
        .collect()
}

fn render_node<R: NodeRenderer>(renderer: &R, node: &ForestNode, depth: usize) -> R::Output {
    let children = node
        .children
        .iter()
        .map(|child| render_node(renderer, child, depth + 1))
        .collect();
    renderer.render(node, depth, children)
}

/// Read-only chart card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartCard {
    pub id: i64,
    pub position: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Top-level cards get the highlighted frame
    #[serde(rename = "isRoot")]
    pub is_root: bool,
    /// Vertical line down to the children row
    pub connector: bool,
    /// Horizontal line across siblings, only with two or more children
    #[serde(rename = "branchLine")]
    pub branch_line: bool,
    pub children: Vec<ChartCard>,
}

pub struct ChartRenderer;

impl NodeRenderer for ChartRenderer {
    type Output = ChartCard;

    fn render(&self, node: &ForestNode, depth: usize, children: Vec<ChartCard>) -> ChartCard {
        let entry = &node.entry;
        ChartCard {
            id: entry.id,
            position: entry.position.clone(),
            name: entry.member.name.clone(),
            department: entry.member.department.clone().filter(|d| !d.is_empty()),
            title: entry.member.title.clone().filter(|t| !t.is_empty()),
            is_root: depth == 0,
            connector: !children.is_empty(),
            branch_line: children.len() > 1,
            children,
        }
    }
}

/// Management row with a delete action
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManageRow {
    pub id: i64,
    pub position: String,
    /// "name (department)"
    pub occupant: String,
    pub depth: usize,
    pub indent: bool,
    #[serde(rename = "deleteAction")]
    pub delete_action: String,
    pub children: Vec<ManageRow>,
}

pub struct ManageRenderer {
    /// Prefix of the delete endpoint, the entry id is appended as `?id=`
    pub delete_endpoint: String,
}

impl Default for ManageRenderer {
    fn default() -> Self {
        Self {
            delete_endpoint: "/api/organization/delete".to_string(),
        }
    }
}

impl NodeRenderer for ManageRenderer {
    type Output = ManageRow;

    fn render(&self, node: &ForestNode, depth: usize, children: Vec<ManageRow>) -> ManageRow {
        let entry = &node.entry;
        ManageRow {
            id: entry.id,
            position: entry.position.clone(),
            occupant: occupant_label(&entry.member.name, entry.member.department.as_deref()),
            depth,
            indent: depth > 0,
            delete_action: format!("{}?id={}", self.delete_endpoint, entry.id),
            children,
        }
    }
}

fn occupant_label(name: &str, department: Option<&str>) -> String {
    match department {
        Some(dept) if !dept.is_empty() => format!("{} ({})", name, dept),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::hierarchy::{build_forest, entry};

    fn sample_forest() -> Vec<ForestNode> {
        let entries = vec![
            entry(1, None, 0),
            entry(2, Some(1), 1),
            entry(3, Some(1), 0),
            entry(4, Some(3), 0),
        ];
        build_forest(&entries).unwrap()
    }

    #[test]
    fn chart_marks_roots_and_connectors() {
        let cards = render_forest(&ChartRenderer, &sample_forest());

        assert_eq!(cards.len(), 1);
        let root = &cards[0];
        assert!(root.is_root);
        assert!(root.connector);
        assert!(root.branch_line);
        assert_eq!(root.department.as_deref(), Some("전력관리처"));

        let first = &root.children[0];
        assert_eq!(first.id, 3);
        assert!(!first.is_root);
        assert!(first.connector);
        assert!(!first.branch_line);
        assert!(!root.children[1].connector);
    }

    #[test]
    fn manage_rows_carry_depth_and_delete_action() {
        let rows = render_forest(&ManageRenderer::default(), &sample_forest());

        let root = &rows[0];
        assert_eq!(root.depth, 0);
        assert!(!root.indent);
        assert_eq!(root.delete_action, "/api/organization/delete?id=1");
        assert_eq!(root.occupant, "member-1 (전력관리처)");

        let grandchild = &root.children[0].children[0];
        assert_eq!(grandchild.id, 4);
        assert_eq!(grandchild.depth, 2);
        assert!(grandchild.indent);
    }

    #[test]
    fn both_variants_share_traversal_order() {
        let forest = sample_forest();
        let chart = render_forest(&ChartRenderer, &forest);
        let manage = render_forest(&ManageRenderer::default(), &forest);

        fn chart_ids(cards: &[ChartCard], out: &mut Vec<i64>) {
            for card in cards {
                out.push(card.id);
                chart_ids(&card.children, out);
            }
        }
        fn manage_ids(rows: &[ManageRow], out: &mut Vec<i64>) {
            for row in rows {
                out.push(row.id);
                manage_ids(&row.children, out);
            }
        }

        let (mut a, mut b) = (Vec::new(), Vec::new());
        chart_ids(&chart, &mut a);
        manage_ids(&manage, &mut b);
        assert_eq!(a, vec![1, 3, 4, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn occupant_label_omits_missing_department() {
        assert_eq!(occupant_label("홍길동", None), "홍길동");
        assert_eq!(occupant_label("홍길동", Some("")), "홍길동");
        assert_eq!(occupant_label("홍길동", Some("기획부")), "홍길동 (기획부)");
    }
}
