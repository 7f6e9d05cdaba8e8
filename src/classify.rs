//! Range-based reclassification of NDVI into fire-fuel scores.
//!
//! Higher NDVI means healthier vegetation that is less likely to burn, so
//! the densest vegetation gets score 1 and dry or bare ground the extreme
//! scores. The score is ordinal, not monotonic in NDVI.

use std::fmt;

use rayon::prelude::*;

use crate::error::{Result, StageError};
use crate::model::Grid;

/// One `[min, max)` range mapped to a score. When `max_inclusive` is set the
/// range is `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemapEntry {
    pub min: f64,
    pub max: f64,
    pub score: u8,
    pub max_inclusive: bool,
}

impl RemapEntry {
    pub fn new(min: f64, max: f64, score: u8) -> Self {
        RemapEntry {
            min,
            max,
            score,
            max_inclusive: false,
        }
    }

    pub fn inclusive(min: f64, max: f64, score: u8) -> Self {
        RemapEntry {
            max_inclusive: true,
            ..RemapEntry::new(min, max, score)
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min
            && (value < self.max || (self.max_inclusive && value == self.max))
    }

    fn overlaps(&self, other: &RemapEntry) -> bool {
        self.min < other.max && other.min < self.max
    }
}

/// Ordered reclassification table. The first entry containing a value wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapRange {
    entries: Vec<RemapEntry>,
}

impl RemapRange {
    pub fn new(entries: Vec<RemapEntry>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if !(entry.min < entry.max) {
                return Err(StageError::InvalidParameter {
                    name: "remap",
                    value: format!("[{}, {}]", entry.min, entry.max),
                    reason: "range minimum must be below its maximum".to_string(),
                });
            }
            if let Some(other) = entries[..i].iter().find(|e| e.overlaps(entry)) {
                return Err(StageError::InvalidParameter {
                    name: "remap",
                    value: format!("[{}, {}]", entry.min, entry.max),
                    reason: format!("overlaps [{}, {}]", other.min, other.max),
                });
            }
        }
        Ok(RemapRange { entries })
    }

    /// The wildfire suitability table for NDVI.
    pub fn fire_fuel() -> Self {
        RemapRange {
            entries: vec![
                RemapEntry::new(-1.0, 0.15, 0),
                RemapEntry::inclusive(0.6, 1.0, 1),
                RemapEntry::new(0.5, 0.6, 2),
                RemapEntry::new(0.4, 0.5, 3),
                RemapEntry::new(0.2, 0.4, 4),
                RemapEntry::new(0.15, 0.2, 5),
            ],
        }
    }

    pub fn entries(&self) -> &[RemapEntry] {
        &self.entries
    }

    /// Score for a single NDVI value, `None` outside every range.
    pub fn score(&self, value: f64) -> Option<u8> {
        if value.is_nan() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.contains(value))
            .map(|e| e.score)
    }

    pub fn reclassify(&self, ndvi: &Grid<f64>) -> Grid<u8> {
        let cells: Vec<Option<u8>> = ndvi
            .cells
            .par_iter()
            .map(|cell| cell.and_then(|v| self.score(v)))
            .collect();
        ndvi.with_cells(cells)
    }
}

impl Default for RemapRange {
    fn default() -> Self {
        RemapRange::fire_fuel()
    }
}

impl fmt::Display for RemapRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| {
                let close = if e.max_inclusive { ']' } else { ')' };
                format!("[{}, {}{}:{}", e.min, e.max, close, e.score)
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Cell counts per score plus no-data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSummary {
    pub counts: [usize; 256],
    pub nodata: usize,
}

impl ScoreSummary {
    pub fn from_grid(grid: &Grid<u8>) -> Self {
        let mut summary = ScoreSummary {
            counts: [0; 256],
            nodata: 0,
        };
        for cell in &grid.cells {
            match cell {
                Some(score) => summary.counts[*score as usize] += 1,
                None => summary.nodata += 1,
            }
        }
        summary
    }

    pub fn count(&self, score: u8) -> usize {
        self.counts[score as usize]
    }

    pub fn scored(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (score, count) in self.counts.iter().enumerate().filter(|(_, c)| **c > 0) {
            write!(f, "{}={} ", score, count)?;
        }
        write!(f, "nodata={}", self.nodata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Georef;

    const NDVI_DOMAIN: (f64, f64) = (-1.0, 1.0);
    const SCORE_COUNT: usize = 6;

    #[test]
    fn test_boundaries_follow_half_open_ranges() {
        let table = RemapRange::fire_fuel();
        assert_eq!(table.score(-1.0), Some(0));
        assert_eq!(table.score(0.0), Some(0));
        assert_eq!(table.score(0.15), Some(5));
        assert_eq!(table.score(0.2), Some(4));
        assert_eq!(table.score(0.4), Some(3));
        assert_eq!(table.score(0.5), Some(2));
        assert_eq!(table.score(0.6), Some(1));
        assert_eq!(table.score(1.0), Some(1));
    }

    #[test]
    fn test_values_inside_ranges() {
        let table = RemapRange::fire_fuel();
        assert_eq!(table.score(0.4 / 0.6), Some(1));
        assert_eq!(table.score(0.55), Some(2));
        assert_eq!(table.score(0.45), Some(3));
        assert_eq!(table.score(0.3), Some(4));
        assert_eq!(table.score(0.17), Some(5));
        assert_eq!(table.score(-0.4), Some(0));
    }

    #[test]
    fn test_float_result_just_below_boundary() {
        // (0.3 - 0.2) / (0.3 + 0.2) evaluates to 0.19999999999999996 in f64
        let ndvi = (0.3f64 - 0.2) / (0.3 + 0.2);
        assert!(ndvi < 0.2);
        assert_eq!(RemapRange::fire_fuel().score(ndvi), Some(5));
    }

    #[test]
    fn test_outside_domain_is_unscored() {
        let table = RemapRange::fire_fuel();
        assert_eq!(table.score(-1.0001), None);
        assert_eq!(table.score(1.0001), None);
        assert_eq!(table.score(f64::NAN), None);
    }

    #[test]
    fn test_table_is_exhaustive_over_domain() {
        let table = RemapRange::fire_fuel();
        let steps = 20_000;
        for i in 0..=steps {
            let v = NDVI_DOMAIN.0 + (NDVI_DOMAIN.1 - NDVI_DOMAIN.0) * i as f64 / steps as f64;
            let v = v.min(NDVI_DOMAIN.1);
            let matching = table.entries().iter().filter(|e| e.contains(v)).count();
            assert_eq!(matching, 1, "ndvi {v} matched {matching} ranges");
            assert!((table.score(v).unwrap() as usize) < SCORE_COUNT);
        }
    }

    #[test]
    fn test_rejects_overlapping_table() {
        let result = RemapRange::new(vec![
            RemapEntry::new(0.0, 0.5, 1),
            RemapEntry::new(0.4, 1.0, 2),
        ]);
        assert!(matches!(result, Err(StageError::InvalidParameter { .. })));
    }

    #[test]
    fn test_rejects_empty_range() {
        let result = RemapRange::new(vec![RemapEntry::new(0.5, 0.5, 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reclassify_grid_and_summary() {
        let ndvi = Grid::new(
            2,
            3,
            Georef::default(),
            vec![Some(0.7), Some(0.15), None, Some(-0.3), Some(0.25), Some(1.5)],
        )
        .unwrap();

        let scores = RemapRange::fire_fuel().reclassify(&ndvi);
        assert_eq!(
            scores.cells,
            vec![Some(1), Some(5), None, Some(0), Some(4), None]
        );
        assert_eq!(scores.georef, ndvi.georef);

        let summary = ScoreSummary::from_grid(&scores);
        assert_eq!(summary.count(1), 1);
        assert_eq!(summary.count(4), 1);
        assert_eq!(summary.count(2), 0);
        assert_eq!(summary.nodata, 2);
        assert_eq!(summary.scored(), 4);
        assert_eq!(summary.to_string(), "0=1 1=1 4=1 5=1 nodata=2");
    }

    #[test]
    fn test_display_table() {
        let text = RemapRange::fire_fuel().to_string();
        assert!(text.starts_with("[-1, 0.15):0 [0.6, 1]:1"));
    }
}
