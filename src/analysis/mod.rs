//! Geometric Analysis Engine
//!
//! Converts the detection masks produced by an external segmentation model
//! into usability statistics: global void rate, per-component report rows,
//! and the usable/scrap verdict. Pure computation — no state, no I/O.
//!
//! # Architecture
//!
//! - **[`analyze`]**: flat mask list → [`AnalysisResult`] (global statistics)
//! - **[`match_defects_to_components`]**: bbox-center ownership assignment
//! - **[`build_component_reports`]**: per-component [`ComponentReport`] rows
//!
//! Degenerate input (zero detections, zero-area components) always resolves
//! to defined zero values, never an error.
//!
//! # Example
//!
//! ```
//! use revisar::analysis::{analyze, BBox, DetectionMask, MaskClass};
//!
//! let masks = vec![
//!     DetectionMask::new(MaskClass::Component, 0.9, 10_000, BBox::new(0.0, 0.0, 100.0, 100.0)),
//!     DetectionMask::new(MaskClass::Defect, 0.8, 1_500, BBox::new(10.0, 10.0, 20.0, 20.0)),
//! ];
//! let result = analyze(&masks, 5.0);
//! assert_eq!(result.void_rate_percent, 15.0);
//! assert!(!result.is_usable);
//! ```


use serde::{Deserialize, Serialize};

/// Class of a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskClass {
    /// The manufactured part (chip) region
    Component,
    /// A void/defect region within or near a component
    Defect,
}

/// Axis-aligned bounding box with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    /// Create a bounding box. Coordinates are normalized so that
    /// `x1 <= x2` and `y1 <= y2` regardless of argument order.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Center point of the box.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Whether the point lies inside the box. Bounds are inclusive.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }
}

/// One detected region, as produced by the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMask {
    /// Region class
    pub class: MaskClass,
    /// Detector confidence in `[0, 1]`
    pub confidence: f64,
    /// Mask area in pixels
    pub area_pixels: u64,
    /// Bounding box of the mask
    pub bbox: BBox,
}

impl DetectionMask {
    #[must_use]
    pub fn new(class: MaskClass, confidence: f64, area_pixels: u64, bbox: BBox) -> Self {
        Self { class, confidence, area_pixels, bbox }
    }
}

/// Aggregate statistics and verdict for one analysis call.
///
/// Invariant: `is_usable == (num_components > 0 && void_rate_percent < threshold)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Total component area in pixels
    pub chip_area: u64,
    /// Total defect area in pixels
    pub holes_area: u64,
    /// `holes_area / chip_area * 100`, or 0 when `chip_area == 0`
    pub void_rate_percent: f64,
    /// Number of detected components
    pub num_components: usize,
    /// Number of detected defects
    pub num_defects: usize,
    /// Mean confidence across all masks (0 if none)
    pub average_confidence: f64,
    /// Usability verdict
    pub is_usable: bool,
    /// Void-rate threshold the verdict was compared against, in percent
    pub threshold: f64,
}

/// Per-component report row.
///
/// Note the unit asymmetry with [`AnalysisResult`]: `void_percent` and
/// `max_void_percent` are fractions of the component area, not multiplied
/// by 100. Downstream report formatting depends on this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    /// 1-based index, stable within one analysis call
    pub component_index: usize,
    /// Component area in pixels
    pub area: u64,
    /// Sum of matched defect areas divided by the component area
    pub void_percent: f64,
    /// Largest matched defect area divided by the component area
    pub max_void_percent: f64,
    /// Number of defects attributed to this component
    pub matched_defect_count: usize,
}

/// Statistics over a batch of analysis results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub num_images: usize,
    pub avg_void_rate: f64,
    pub min_void_rate: f64,
    pub max_void_rate: f64,
}

/// Compute global statistics and the usability verdict for a detection set.
///
/// `threshold` is the maximum acceptable void rate in percent. An image with
/// no detected components is never usable; an image with zero detections
/// yields the all-zero result.
#[must_use]
pub fn analyze(masks: &[DetectionMask], threshold: f64) -> AnalysisResult {
    let mut chip_area: u64 = 0;
    let mut holes_area: u64 = 0;
    let mut num_components = 0usize;
    let mut num_defects = 0usize;

    for mask in masks {
        match mask.class {
            MaskClass::Component => {
                chip_area += mask.area_pixels;
                num_components += 1;
            }
            MaskClass::Defect => {
                holes_area += mask.area_pixels;
                num_defects += 1;
            }
        }
    }

    let void_rate_percent = if chip_area > 0 {
        holes_area as f64 / chip_area as f64 * 100.0
    } else {
        0.0
    };

    let average_confidence = if masks.is_empty() {
        0.0
    } else {
        masks.iter().map(|m| m.confidence).sum::<f64>() / masks.len() as f64
    };

    let is_usable = num_components > 0 && void_rate_percent < threshold;

    AnalysisResult {
        chip_area,
        holes_area,
        void_rate_percent,
        num_components,
        num_defects,
        average_confidence,
        is_usable,
        threshold,
    }
}

/// Assign each defect to its owning component.
///
/// Returns one vec of defect indices per component, in component input
/// order. A defect is owned by the **first** component whose bounding box
/// contains the defect's bbox center (inclusive bounds); it matches at most
/// one component. When a defect matches nothing and exactly one component
/// exists, it is attributed to that sole component — containment can fail on
/// small scenes where mask and box are misaligned. With multiple components,
/// unmatched defects are orphaned and appear in no component's list.
#[must_use]
pub fn match_defects_to_components(
    components: &[DetectionMask],
    defects: &[DetectionMask],
) -> Vec<Vec<usize>> {
    let mut matching: Vec<Vec<usize>> = vec![Vec::new(); components.len()];

    for (defect_idx, defect) in defects.iter().enumerate() {
        let (cx, cy) = defect.bbox.center();
        let owner = components.iter().position(|c| c.bbox.contains(cx, cy));

        match owner {
            Some(component_idx) => matching[component_idx].push(defect_idx),
            // Sole-component fallback
            None if components.len() == 1 => matching[0].push(defect_idx),
            None => {}
        }
    }

    matching
}

/// Build per-component report rows from a matching produced by
/// [`match_defects_to_components`].
///
/// A zero-area component yields zero void fractions rather than a division
/// fault.
#[must_use]
pub fn build_component_reports(
    components: &[DetectionMask],
    defects: &[DetectionMask],
    matching: &[Vec<usize>],
) -> Vec<ComponentReport> {
    components
        .iter()
        .enumerate()
        .map(|(i, component)| {
            let matched = matching.get(i).map(Vec::as_slice).unwrap_or(&[]);
            let area = component.area_pixels;

            let total_defect_area: u64 =
                matched.iter().map(|&d| defects[d].area_pixels).sum();
            let max_defect_area: u64 =
                matched.iter().map(|&d| defects[d].area_pixels).max().unwrap_or(0);

            let (void_percent, max_void_percent) = if area > 0 {
                (
                    total_defect_area as f64 / area as f64,
                    max_defect_area as f64 / area as f64,
                )
            } else {
                (0.0, 0.0)
            };

            ComponentReport {
                component_index: i + 1,
                area,
                void_percent,
                max_void_percent,
                matched_defect_count: matched.len(),
            }
        })
        .collect()
}

/// Full analysis of one detection set: global statistics plus per-component
/// report rows.
#[must_use]
pub fn analyze_with_reports(
    masks: &[DetectionMask],
    threshold: f64,
) -> (AnalysisResult, Vec<ComponentReport>) {
    let result = analyze(masks, threshold);

    let components: Vec<DetectionMask> =
        masks.iter().filter(|m| m.class == MaskClass::Component).cloned().collect();
    let defects: Vec<DetectionMask> =
        masks.iter().filter(|m| m.class == MaskClass::Defect).cloned().collect();

    let matching = match_defects_to_components(&components, &defects);
    let reports = build_component_reports(&components, &defects, &matching);

    (result, reports)
}

/// Aggregate void-rate statistics over a batch of results.
#[must_use]
pub fn summarize(results: &[AnalysisResult]) -> AnalysisSummary {
    if results.is_empty() {
        return AnalysisSummary {
            num_images: 0,
            avg_void_rate: 0.0,
            min_void_rate: 0.0,
            max_void_rate: 0.0,
        };
    }

    let rates: Vec<f64> = results.iter().map(|r| r.void_rate_percent).collect();
    let sum: f64 = rates.iter().sum();

    AnalysisSummary {
        num_images: results.len(),
        avg_void_rate: sum / rates.len() as f64,
        min_void_rate: rates.iter().copied().fold(f64::INFINITY, f64::min),
        max_void_rate: rates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}
