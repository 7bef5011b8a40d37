//! Resolution levels.
//!
//! Level 0 is the full-resolution table; every further level is an overview
//! table decimated by an integer factor. Levels are kept in a flat list
//! ordered by factor.

use serde::Serialize;

use crate::config::DatasetConfig;
use crate::geo::AffineTransform;
use crate::index::TableRef;

/// One resolution level of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionLevel {
    pub index: usize,
    /// Decimation factor relative to level 0
    pub factor: u32,
    pub table: TableRef,
    pub width: u32,
    pub height: u32,
    pub transform: AffineTransform,
}

impl ResolutionLevel {
    pub fn downsample(&self) -> f64 {
        self.factor as f64
    }
}

/// All levels of a dataset, level 0 first.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSet {
    levels: Vec<ResolutionLevel>,
}

impl LevelSet {
    /// Build the level list from a validated configuration.
    ///
    /// Level sizes are `floor(size / factor)`.
    pub fn from_config(config: &DatasetConfig) -> Self {
        let transform = config.transform();
        let mut overviews: Vec<_> = config.overviews.iter().collect();
        overviews.sort_by_key(|o| o.factor);

        let full = ResolutionLevel {
            index: 0,
            factor: 1,
            table: config.table.clone(),
            width: config.width,
            height: config.height,
            transform,
        };

        let levels = std::iter::once(full)
            .chain(overviews.into_iter().enumerate().map(|(i, o)| ResolutionLevel {
                index: i + 1,
                factor: o.factor,
                table: o.table.clone(),
                width: config.width / o.factor,
                height: config.height / o.factor,
                transform: transform.scaled(o.factor as f64),
            }))
            .collect();

        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResolutionLevel> {
        self.levels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolutionLevel> {
        self.levels.iter()
    }

    /// The coarsest level whose factor does not exceed `downsample`.
    ///
    /// Falls back to level 0 when no overview qualifies.
    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.levels
            .iter()
            .filter(|level| level.downsample() <= downsample)
            .max_by_key(|level| level.factor)
            .map(|level| level.index)
            .unwrap_or(0)
    }
}
