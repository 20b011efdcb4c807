//! Processor topology resolution and guard-cell trim planning.
//!
//! Tiles are placed on a 2D processor grid of shape `(nxpe, nype)` with
//! row-major rank `r = pe_yind * nxpe + pe_xind`. Guard cells between
//! adjacent tiles duplicate neighbour data and are always trimmed; guard
//! cells on the global domain boundary are kept only on request.

use bout_file::TileMeta;

use crate::error::{CollectError, CollectResult};

/// The 2D processor grid a set of tiles was decomposed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub nxpe: usize,
    pub nype: usize,
}

/// A tile's position in the processor grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePosition {
    pub xind: usize,
    pub yind: usize,
}

/// Cells to drop from each end of a tile's spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPlan {
    pub x_lower: usize,
    pub x_upper: usize,
    pub y_lower: usize,
    pub y_upper: usize,
}

impl Topology {
    /// Derive the topology for one set of tiles and validate it.
    ///
    /// Every tile must agree on the grid shape, the tile count must equal
    /// `nxpe * nype`, and every position must occur exactly once.
    pub fn resolve(tiles: &[TileMeta]) -> CollectResult<(Self, Vec<TilePosition>)> {
        let first = tiles
            .first()
            .ok_or_else(|| CollectError::input("empty dump set"))?;
        let topology = Topology {
            nxpe: first.nxpe,
            nype: first.nype,
        };

        for tile in tiles {
            if tile.nxpe != topology.nxpe || tile.nype != topology.nype {
                return Err(CollectError::metadata(format!(
                    "{}: processor grid ({}, {}) disagrees with ({}, {})",
                    tile.path.display(),
                    tile.nxpe,
                    tile.nype,
                    topology.nxpe,
                    topology.nype
                )));
            }
        }

        let expected = topology.nxpe * topology.nype;
        if tiles.len() != expected {
            return Err(CollectError::input(format!(
                "processor grid ({}, {}) needs {expected} tiles, found {}",
                topology.nxpe,
                topology.nype,
                tiles.len()
            )));
        }

        let positions: Vec<TilePosition> = tiles
            .iter()
            .map(|tile| topology.position(tile))
            .collect::<CollectResult<_>>()?;

        let mut seen = vec![false; expected];
        for (tile, pos) in tiles.iter().zip(&positions) {
            let rank = topology.rank(*pos);
            if seen[rank] {
                return Err(CollectError::input(format!(
                    "ambiguous processor indices: position ({}, {}) appears twice (second at {})",
                    pos.xind,
                    pos.yind,
                    tile.path.display()
                )));
            }
            seen[rank] = true;
        }

        Ok((topology, positions))
    }

    /// A tile's position, from explicit indices or from its filename rank.
    pub fn position(&self, tile: &TileMeta) -> CollectResult<TilePosition> {
        let pos = match (tile.pe_xind, tile.pe_yind) {
            (Some(xind), Some(yind)) => TilePosition { xind, yind },
            (None, None) => TilePosition {
                xind: tile.index % self.nxpe,
                yind: tile.index / self.nxpe,
            },
            _ => {
                return Err(CollectError::metadata(format!(
                    "{}: PE_XIND and PE_YIND must be stored together",
                    tile.path.display()
                )))
            }
        };
        if pos.xind >= self.nxpe || pos.yind >= self.nype {
            return Err(CollectError::input(format!(
                "{}: position ({}, {}) outside processor grid ({}, {})",
                tile.path.display(),
                pos.xind,
                pos.yind,
                self.nxpe,
                self.nype
            )));
        }
        Ok(pos)
    }

    /// Row-major rank of a position.
    pub fn rank(&self, pos: TilePosition) -> usize {
        pos.yind * self.nxpe + pos.xind
    }

    /// Guard cells to trim for the tile at `pos`.
    ///
    /// Interior-facing guards are always trimmed. Boundary-facing guards
    /// are trimmed unless the caller keeps them. With `nxpe == 1` (resp.
    /// `nype == 1`) a tile is both first and last on that axis, so only
    /// the boundary rule ever applies to it.
    pub fn trim_plan(
        &self,
        pos: TilePosition,
        mxg: usize,
        myg: usize,
        keep_xboundaries: bool,
        keep_yboundaries: bool,
    ) -> TrimPlan {
        let keep_lower_x = pos.xind == 0 && keep_xboundaries;
        let keep_upper_x = pos.xind == self.nxpe - 1 && keep_xboundaries;
        let keep_lower_y = pos.yind == 0 && keep_yboundaries;
        let keep_upper_y = pos.yind == self.nype - 1 && keep_yboundaries;
        TrimPlan {
            x_lower: if keep_lower_x { 0 } else { mxg },
            x_upper: if keep_upper_x { 0 } else { mxg },
            y_lower: if keep_lower_y { 0 } else { myg },
            y_upper: if keep_upper_y { 0 } else { myg },
        }
    }
}
