use serde::Serialize;

use super::{normalize_key, Row, Table};

/// One parcel boundary vertex, relabeled and formatted for the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledPoint {
    pub pt: String,
    pub x: String,
    pub y: String,
}

/// One row of the two-column coordinate layout. The right half is blank
/// when the point count is odd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitRow {
    pub pt1: String,
    pub x1: String,
    pub y1: String,
    pub pt2: String,
    pub x2: String,
    pub y2: String,
}

fn vertex_index(row: &Row) -> f64 {
    row.number(&["vertex_index"])
}

/// Select the coordinate rows belonging to `key`, order them, and relabel
/// them `P1..Pn` with two-decimal coordinates.
///
/// `ordered` sorts ascending by `vertex_index` (missing index counts as 0)
/// and is used on the individual path; the collective path keeps table
/// order as-is. An empty key matches nothing.
pub fn join_points(key: &str, table: &Table, ordered: bool) -> Vec<LabeledPoint> {
    if key.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<&Row> = table
        .rows
        .iter()
        .filter(|row| normalize_key(row.field("nicad")) == key)
        .collect();

    if ordered {
        matches.sort_by(|a, b| vertex_index(a).total_cmp(&vertex_index(b)));
    }

    matches
        .iter()
        .enumerate()
        .map(|(i, row)| LabeledPoint {
            pt: format!("P{}", i + 1),
            x: format!("{:.2}", row.number(&["X", "x", "x_centroid"])),
            y: format!("{:.2}", row.number(&["Y", "y", "y_centroid"])),
        })
        .collect()
}

/// Split a point sequence at its ceiling midpoint and zip the halves into
/// page-friendly left/right rows.
pub fn split_layout(points: &[LabeledPoint]) -> Vec<SplitRow> {
    if points.is_empty() {
        return Vec::new();
    }

    let mid = points.len().div_ceil(2);
    let (left, right) = points.split_at(mid);

    left.iter()
        .enumerate()
        .map(|(i, l)| {
            let r = right.get(i);
            SplitRow {
                pt1: l.pt.clone(),
                x1: l.x.clone(),
                y1: l.y.clone(),
                pt2: r.map(|p| p.pt.clone()).unwrap_or_default(),
                x2: r.map(|p| p.x.clone()).unwrap_or_default(),
                y2: r.map(|p| p.y.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord_row(nicad: &str, vertex: &str, x: &str, y: &str) -> Row {
        Row::from_pairs(&[("nicad", nicad), ("vertex_index", vertex), ("X", x), ("Y", y)])
    }

    fn table(rows: Vec<Row>) -> Table {
        Table {
            headers: vec![],
            rows,
        }
    }

    #[test]
    fn ordered_join_sorts_by_vertex_index() {
        let t = table(vec![
            coord_row("12", "2", "20", "21"),
            coord_row("12.0", "", "5", "6"), // missing index sorts as 0
            coord_row("12", "1", "10", "11"),
            coord_row("99", "0", "1", "1"),
        ]);
        let pts = join_points("12", &t, true);
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[0].x, "5.00");
        assert_eq!(pts[1].x, "10.00");
        assert_eq!(pts[2].x, "20.00");
        assert_eq!(
            pts.iter().map(|p| p.pt.as_str()).collect::<Vec<_>>(),
            ["P1", "P2", "P3"]
        );
    }

    #[test]
    fn unordered_join_keeps_table_order() {
        let t = table(vec![
            coord_row("7", "5", "1", "1"),
            coord_row("7", "1", "2", "2"),
        ]);
        let pts = join_points("7", &t, false);
        assert_eq!(pts[0].x, "1.00");
        assert_eq!(pts[1].x, "2.00");
    }

    #[test]
    fn coordinate_resolution_prefers_uppercase() {
        let row = Row::from_pairs(&[
            ("nicad", "1"),
            ("X", "100.5"),
            ("x_centroid", "999"),
            ("y_centroid", "-3.456"),
        ]);
        let pts = join_points("1", &table(vec![row]), true);
        assert_eq!(pts[0].x, "100.50");
        assert_eq!(pts[0].y, "-3.46");
    }

    #[test]
    fn empty_key_matches_nothing() {
        let t = table(vec![Row::from_pairs(&[("X", "1"), ("Y", "2")])]);
        assert!(join_points("", &t, true).is_empty());
    }

    fn point(n: usize) -> LabeledPoint {
        LabeledPoint {
            pt: format!("P{n}"),
            x: format!("{n}.00"),
            y: format!("{n}.00"),
        }
    }

    #[test]
    fn split_layout_pads_odd_sequences() {
        let pts: Vec<_> = (1..=3).map(point).collect();
        let rows = split_layout(&pts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pt1, "P1");
        assert_eq!(rows[0].pt2, "P3");
        assert_eq!(rows[1].pt1, "P2");
        assert_eq!(rows[1].pt2, "");
        assert_eq!(rows[1].x2, "");
    }

    #[test]
    fn split_layout_even_and_empty() {
        let pts: Vec<_> = (1..=4).map(point).collect();
        let rows = split_layout(&pts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pt1, "P2");
        assert_eq!(rows[1].pt2, "P4");

        assert!(split_layout(&[]).is_empty());
    }
}
