use catalog::Cell;
use serde::Serialize;

/// Something the UI may offer for a cell. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CellAction {
    Search { mechanism: String },
    Subdivide,
    Undivide,
}

/// One search per enabled mechanism, then subdivide iff `depth < max_depth` and
/// undivide iff `depth > 0`. Retired (subdivided) cells offer nothing: their
/// leaves carry the actions.
pub fn available_actions(cell: &Cell, mechanisms: &[String], max_depth: u8) -> Vec<CellAction> {
    if !cell.is_leaf() {
        return Vec::new();
    }
    let mut actions: Vec<CellAction> = mechanisms
        .iter()
        .map(|m| CellAction::Search {
            mechanism: m.clone(),
        })
        .collect();
    if cell.depth < max_depth {
        actions.push(CellAction::Subdivide);
    }
    if cell.depth > 0 {
        actions.push(CellAction::Undivide);
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::{CellAction, available_actions};
    use crate::config::MAX_DEPTH;
    use catalog::Cell;
    use foundation::LatLngBounds;
    use pretty_assertions::assert_eq;

    fn cell_at(depth: u8) -> Cell {
        let b = LatLngBounds::from_edges(43.0, -80.0, 43.1, -79.9);
        let parent = (depth > 0).then(|| "p".to_string());
        Cell::new("c", "g", b, depth, parent, 0)
    }

    fn mechanisms() -> Vec<String> {
        vec!["places".to_string(), "nearby".to_string()]
    }

    #[test]
    fn root_cell_has_no_undivide() {
        let actions = available_actions(&cell_at(0), &mechanisms(), MAX_DEPTH);
        assert_eq!(
            actions,
            vec![
                CellAction::Search {
                    mechanism: "places".to_string()
                },
                CellAction::Search {
                    mechanism: "nearby".to_string()
                },
                CellAction::Subdivide,
            ]
        );
    }

    #[test]
    fn max_depth_cell_has_no_subdivide() {
        let actions = available_actions(&cell_at(MAX_DEPTH), &mechanisms(), MAX_DEPTH);
        assert!(!actions.contains(&CellAction::Subdivide));
        assert!(actions.contains(&CellAction::Undivide));
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn middle_depths_offer_both() {
        for depth in 1..MAX_DEPTH {
            let actions = available_actions(&cell_at(depth), &mechanisms(), MAX_DEPTH);
            assert!(actions.contains(&CellAction::Subdivide));
            assert!(actions.contains(&CellAction::Undivide));
        }
    }

    #[test]
    fn retired_cells_offer_nothing() {
        let mut cell = cell_at(1);
        cell.subdivided = true;
        assert!(available_actions(&cell, &mechanisms(), MAX_DEPTH).is_empty());
    }

    #[test]
    fn action_json_is_tagged() {
        let v = serde_json::to_value(CellAction::Search {
            mechanism: "places".to_string(),
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "search", "mechanism": "places" }));
        let v = serde_json::to_value(CellAction::Subdivide).unwrap();
        assert_eq!(v, serde_json::json!({ "kind": "subdivide" }));
    }
}
