// ---------------------------------------------------------------------------
// Line-identification layout for the annotated spectrum plot
// ---------------------------------------------------------------------------

const MAX_PASSES: usize = 500;

/// Where to draw one line identification.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMarker {
    /// Pixel position of the line (where the connector starts).
    pub x: f64,
    /// Horizontal position of the label after de-overlapping.
    pub label_x: f64,
    pub label: String,
}

/// Vertical placement shared by all markers, derived from the trace maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerHeights {
    /// Bottom of the connector, just above the trace.
    pub tip: f64,
    /// Where the connector leaves the line position.
    pub bend: f64,
    /// Where the connector reaches the label position.
    pub shoulder: f64,
    /// Baseline of the labels.
    pub label: f64,
}

impl MarkerHeights {
    pub fn above(max: f64) -> Self {
        let max = max.max(0.0);
        Self {
            tip: 1.01 * max,
            bend: 1.04 * max,
            shoulder: 1.07 * max,
            label: 1.1 * max,
        }
    }
}

/// Pair positions with labels and spread the labels so that neighbours are
/// at least `min_spacing` apart. Output is sorted by position.
pub fn layout_markers(positions: &[f64], labels: &[String], min_spacing: f64) -> Vec<LineMarker> {
    let mut markers: Vec<LineMarker> = positions
        .iter()
        .zip(labels)
        .filter(|(x, _)| x.is_finite())
        .map(|(&x, label)| LineMarker {
            x,
            label_x: x,
            label: label.clone(),
        })
        .collect();
    markers.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut label_x: Vec<f64> = markers.iter().map(|m| m.x).collect();
    spread(&mut label_x, min_spacing);
    for (m, lx) in markers.iter_mut().zip(label_x) {
        m.label_x = lx;
    }
    markers
}

/// Push sorted values apart pairwise until every gap is at least `spacing`.
fn spread(xs: &mut [f64], spacing: f64) {
    if spacing <= 0.0 || xs.len() < 2 {
        return;
    }
    for _ in 0..MAX_PASSES {
        let mut moved = false;
        for i in 1..xs.len() {
            let gap = xs[i] - xs[i - 1];
            if gap < spacing - 1e-9 {
                let push = (spacing - gap) / 2.0;
                xs[i - 1] -= push;
                xs[i] += push;
                moved = true;
            }
        }
        if !moved {
            return;
        }
    }
    // fall back to an even comb around the cluster centre
    let centre = xs.iter().sum::<f64>() / xs.len() as f64;
    let half = (xs.len() - 1) as f64 / 2.0;
    for (i, x) in xs.iter_mut().enumerate() {
        *x = centre + (i as f64 - half) * spacing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("L{i}")).collect()
    }

    #[test]
    fn separated_lines_stay_put() {
        let m = layout_markers(&[300.0, 100.0, 200.0], &labels(3), 20.0);
        let xs: Vec<f64> = m.iter().map(|m| m.label_x).collect();
        assert_eq!(xs, vec![100.0, 200.0, 300.0]);
        // sorting keeps labels attached to their lines
        assert_eq!(m[0].label, "L1");
    }

    #[test]
    fn crowded_labels_are_spread_in_order() {
        let m = layout_markers(&[100.0, 102.0, 104.0, 105.0, 400.0], &labels(5), 15.0);
        for pair in m.windows(2) {
            assert!(pair[1].label_x - pair[0].label_x >= 15.0 - 1e-6);
        }
        assert_eq!(m[4].label_x, 400.0);
        for marker in &m {
            assert!(marker.x == 100.0 || marker.x >= 102.0);
        }
    }

    #[test]
    fn heights_sit_above_the_trace() {
        let h = MarkerHeights::above(1000.0);
        assert!(h.tip > 1000.0 && h.bend > h.tip);
        assert!(h.shoulder > h.bend && h.label > h.shoulder);
    }
}
