//! Surface kinds and the per-kind pixel masks produced by extraction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Color, Dimensions, GrayImage, MarkupError};

/// A detectable region of a photograph.
///
/// The declaration order is the enumeration order used everywhere a
/// list of kinds is produced, most notably the output order of
/// [`extract_surfaces`](crate::mask::extract_surfaces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Interior or exterior wall.
    Wall,
    /// Floor.
    Floor,
    /// Ceiling.
    Ceiling,
    /// Building facade.
    Facade,
    /// Door.
    Door,
    /// Window.
    Window,
}

impl SurfaceKind {
    /// Every kind, in enumeration order.
    pub const ALL: [Self; 6] = [
        Self::Wall,
        Self::Floor,
        Self::Ceiling,
        Self::Facade,
        Self::Door,
        Self::Window,
    ];

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Wall => "Wall",
            Self::Floor => "Floor",
            Self::Ceiling => "Ceiling",
            Self::Facade => "Facade",
            Self::Door => "Door",
            Self::Window => "Window",
        }
    }

    /// Color used when listing detected surfaces to the user.
    #[must_use]
    pub const fn preview_color(self) -> Color {
        match self {
            Self::Wall => Color::opaque(69, 133, 242),
            Self::Floor => Color::opaque(242, 153, 51),
            Self::Ceiling => Color::opaque(115, 217, 166),
            Self::Facade => Color::opaque(153, 102, 204),
            Self::Door => Color::opaque(217, 89, 89),
            Self::Window => Color::opaque(140, 89, 230),
        }
    }

    /// ADE20K class ids this kind represents.
    #[must_use]
    pub const fn ade20k_classes(self) -> &'static [u32] {
        match self {
            Self::Wall => &[0],
            Self::Floor => &[3],
            Self::Ceiling => &[5],
            Self::Facade => &[1, 25, 49],
            Self::Door => &[14],
            Self::Window => &[8],
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Mapping from surface kind to the class ids it covers.
///
/// A kind may span several dataset classes. Kinds missing from the map
/// are never extracted. Iteration follows [`SurfaceKind`] enumeration
/// order regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceClassMap(BTreeMap<SurfaceKind, Vec<u32>>);

impl SurfaceClassMap {
    /// An empty map; nothing will be extracted until kinds are added.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// The ADE20K mapping for every kind.
    #[must_use]
    pub fn ade20k() -> Self {
        Self(
            SurfaceKind::ALL
                .iter()
                .map(|&kind| (kind, kind.ade20k_classes().to_vec()))
                .collect(),
        )
    }

    /// Add or replace the class ids for `kind`.
    #[must_use]
    pub fn with(mut self, kind: SurfaceKind, classes: impl Into<Vec<u32>>) -> Self {
        self.0.insert(kind, classes.into());
        self
    }

    /// Class ids for `kind`, if mapped.
    #[must_use]
    pub fn classes(&self, kind: SurfaceKind) -> Option<&[u32]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    /// Iterate mapped kinds in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceKind, &[u32])> {
        self.0.iter().map(|(&kind, ids)| (kind, ids.as_slice()))
    }

    /// Returns `true` if no kinds are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SurfaceClassMap {
    fn default() -> Self {
        Self::ade20k()
    }
}

/// The pixels of one surface kind on the class grid they were found in.
///
/// Indices are flat (`y * width + x`), strictly increasing, and always
/// inside the grid. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMask {
    kind: SurfaceKind,
    indices: Vec<usize>,
    dimensions: Dimensions,
    coverage: f64,
}

impl SurfaceMask {
    /// Build a mask from arbitrary flat indices.
    ///
    /// Indices are sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidMask`] if any index lies outside a
    /// `dimensions` grid.
    pub fn new(
        kind: SurfaceKind,
        mut indices: Vec<usize>,
        dimensions: Dimensions,
    ) -> Result<Self, MarkupError> {
        indices.sort_unstable();
        indices.dedup();
        let total = dimensions.pixel_count();
        if let Some(&last) = indices.last()
            && last >= total
        {
            return Err(MarkupError::InvalidMask(format!(
                "index {last} outside {}x{} grid",
                dimensions.width, dimensions.height,
            )));
        }
        Ok(Self::from_sorted(kind, indices, dimensions))
    }

    /// Build from indices already known to be sorted, unique, and in range.
    pub(crate) fn from_sorted(kind: SurfaceKind, indices: Vec<usize>, dimensions: Dimensions) -> Self {
        let coverage = coverage_fraction(indices.len(), dimensions.pixel_count());
        Self {
            kind,
            indices,
            dimensions,
            coverage,
        }
    }

    /// The surface kind.
    #[must_use]
    pub const fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Flat pixel indices, ascending.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Size of the grid the indices refer to.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Fraction of the grid covered, in `0.0..=1.0`.
    #[must_use]
    pub const fn coverage(&self) -> f64 {
        self.coverage
    }

    /// Coverage as a percentage, in `0.0..=100.0`.
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        self.coverage * 100.0
    }

    /// Number of pixels in the mask.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the mask has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns `true` if the flat index belongs to the mask.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Rasterize as a binary stencil at the mask's own resolution:
    /// 255 inside, 0 outside.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        let mut buf = vec![0u8; self.dimensions.pixel_count()];
        for &i in &self.indices {
            buf[i] = 255;
        }
        GrayImage::from_raw(self.dimensions.width, self.dimensions.height, buf)
            .unwrap_or_else(|| GrayImage::new(self.dimensions.width, self.dimensions.height))
    }
}

#[allow(clippy::cast_precision_loss)]
fn coverage_fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_order_matches_all() {
        let mut sorted = SurfaceKind::ALL;
        sorted.sort();
        assert_eq!(sorted, SurfaceKind::ALL);
    }

    #[test]
    fn facade_spans_several_classes() {
        assert_eq!(SurfaceKind::Facade.ade20k_classes(), &[1, 25, 49]);
    }

    #[test]
    fn preview_colors_are_opaque_and_distinct() {
        let colors: Vec<Color> = SurfaceKind::ALL.iter().map(|k| k.preview_color()).collect();
        for (i, c) in colors.iter().enumerate() {
            assert_eq!(c.a, 255);
            assert_ne!(*c, Color::NEUTRAL);
            assert!(!colors[i + 1..].contains(c), "{c:?} reused");
        }
    }

    #[test]
    fn display_uses_display_name() {
        assert_eq!(SurfaceKind::Ceiling.to_string(), "Ceiling");
    }

    #[test]
    fn class_map_iterates_in_enumeration_order() {
        let map = SurfaceClassMap::empty()
            .with(SurfaceKind::Window, [8])
            .with(SurfaceKind::Wall, [0]);
        let kinds: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![SurfaceKind::Wall, SurfaceKind::Window]);
    }

    #[test]
    fn default_class_map_is_ade20k() {
        let map = SurfaceClassMap::default();
        assert_eq!(map.classes(SurfaceKind::Floor), Some(&[3][..]));
        assert_eq!(map.iter().count(), SurfaceKind::ALL.len());
    }

    #[test]
    fn class_map_serde_round_trip() {
        let map = SurfaceClassMap::empty().with(SurfaceKind::Door, [14, 15]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"door":[14,15]}"#);
        let back: SurfaceClassMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
    }

    #[test]
    fn mask_new_sorts_and_dedups() {
        let mask =
            SurfaceMask::new(SurfaceKind::Wall, vec![5, 1, 5, 3], Dimensions::new(4, 2)).unwrap();
        assert_eq!(mask.indices(), &[1, 3, 5]);
        assert!((mask.coverage() - 3.0 / 8.0).abs() < f64::EPSILON);
        assert!((mask.coverage_percent() - 37.5).abs() < 1e-9);
        assert!(mask.contains(3));
        assert!(!mask.contains(2));
    }

    #[test]
    fn mask_new_rejects_out_of_range_index() {
        let result = SurfaceMask::new(SurfaceKind::Wall, vec![0, 8], Dimensions::new(4, 2));
        assert!(matches!(result, Err(MarkupError::InvalidMask(_))));
    }

    #[test]
    fn empty_grid_has_zero_coverage() {
        let mask = SurfaceMask::new(SurfaceKind::Wall, vec![], Dimensions::new(0, 0)).unwrap();
        assert!(mask.is_empty());
        assert!(mask.coverage().abs() < f64::EPSILON);
    }

    #[test]
    fn to_gray_marks_indices() {
        let mask = SurfaceMask::new(SurfaceKind::Floor, vec![0, 3], Dimensions::new(2, 2)).unwrap();
        let gray = mask.to_gray();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
        assert_eq!(gray.get_pixel(0, 1).0[0], 0);
        assert_eq!(gray.get_pixel(1, 1).0[0], 255);
    }
}
