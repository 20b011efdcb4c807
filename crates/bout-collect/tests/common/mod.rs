//! Synthetic dump-file generation for integration tests.
//!
//! A known global array (boundary cells included) is split into tiles the
//! way BOUT++ does it: each tile carries its interior plus `mxg`/`myg`
//! guard cells overlapping its neighbours, so reconstruction with guards
//! trimmed must reproduce the original array exactly.

use ndarray::{ArrayD, IxDyn};
use std::path::Path;

/// Opt-in test logging: `RUST_LOG=debug cargo test -- --nocapture`.
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Shape of one synthetic run (one dump set).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub nxpe: usize,
    pub nype: usize,
    pub mxg: usize,
    pub myg: usize,
    /// Global interior extents (boundary cells not included).
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub nt: usize,
    /// Global index of this set's first time point (restart continuation).
    pub t0: usize,
}

impl RunConfig {
    pub fn new(nxpe: usize, nype: usize) -> Self {
        Self {
            nxpe,
            nype,
            mxg: 2,
            myg: 1,
            nx: 8,
            ny: 6,
            nz: 3,
            nt: 4,
            t0: 0,
        }
    }

    /// Interior cells per tile along x.
    pub fn ix(&self) -> usize {
        assert_eq!(self.nx % self.nxpe, 0, "test grids divide evenly");
        self.nx / self.nxpe
    }

    /// Interior cells per tile along y.
    pub fn iy(&self) -> usize {
        assert_eq!(self.ny % self.nype, 0, "test grids divide evenly");
        self.ny / self.nype
    }
}

/// Value of `n` at one point of the extended global array.
///
/// `gx`/`gy` index the extended array (boundary cells included).
pub fn n_value(t: usize, gx: usize, gy: usize, gz: usize) -> f64 {
    1e6 * t as f64 + 1e4 * gx as f64 + 1e2 * gy as f64 + gz as f64
}

/// Value of `phi` (no z dependence).
pub fn phi_value(t: usize, gx: usize, gy: usize) -> f64 {
    0.5 + 1e6 * t as f64 + 1e4 * gx as f64 + 1e2 * gy as f64
}

/// Value of the time-independent metric field `g11`.
pub fn g11_value(gx: usize, gy: usize) -> f64 {
    2.0 * gx as f64 + 0.01 * gy as f64
}

/// Simulation time of global time index `t`.
pub fn time_value(t: usize) -> f64 {
    0.1 * t as f64
}

/// Write one tile file.
pub fn write_tile(path: &Path, cfg: &RunConfig, xind: usize, yind: usize) {
    write_tile_with(path, cfg, xind, yind, &[]);
}

/// Write one tile file with scalar overrides (for conflict tests).
pub fn write_tile_with(
    path: &Path,
    cfg: &RunConfig,
    xind: usize,
    yind: usize,
    scalar_overrides: &[(&str, f64)],
) {
    let (ix, iy) = (cfg.ix(), cfg.iy());
    let local_x = ix + 2 * cfg.mxg;
    let local_y = iy + 2 * cfg.myg;

    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("t", cfg.nt).unwrap();
    file.add_dimension("x", local_x).unwrap();
    file.add_dimension("y", local_y).unwrap();
    file.add_dimension("z", cfg.nz).unwrap();

    let n = ArrayD::from_shape_fn(IxDyn(&[cfg.nt, local_x, local_y, cfg.nz]), |idx| {
        n_value(
            cfg.t0 + idx[0],
            xind * ix + idx[1],
            yind * iy + idx[2],
            idx[3],
        )
    });
    let mut n_var = file.add_variable::<f64>("n", &["t", "x", "y", "z"]).unwrap();
    n_var.put_values(&n.into_raw_vec(), ..).unwrap();

    let phi = ArrayD::from_shape_fn(IxDyn(&[cfg.nt, local_x, local_y]), |idx| {
        phi_value(cfg.t0 + idx[0], xind * ix + idx[1], yind * iy + idx[2])
    });
    let mut phi_var = file.add_variable::<f64>("phi", &["t", "x", "y"]).unwrap();
    phi_var.put_values(&phi.into_raw_vec(), ..).unwrap();

    let g11 = ArrayD::from_shape_fn(IxDyn(&[local_x, local_y]), |idx| {
        g11_value(xind * ix + idx[0], yind * iy + idx[1])
    });
    let mut g11_var = file.add_variable::<f64>("g11", &["x", "y"]).unwrap();
    g11_var.put_values(&g11.into_raw_vec(), ..).unwrap();

    let t_array: Vec<f64> = (0..cfg.nt).map(|t| time_value(cfg.t0 + t)).collect();
    let mut t_var = file.add_variable::<f64>("t_array", &["t"]).unwrap();
    t_var.put_values(&t_array, ..).unwrap();

    let mut scalars = vec![
        ("NXPE", cfg.nxpe as f64),
        ("NYPE", cfg.nype as f64),
        ("MXG", cfg.mxg as f64),
        ("MYG", cfg.myg as f64),
        ("PE_XIND", xind as f64),
        ("PE_YIND", yind as f64),
        ("BOUT_VERSION", 4.3),
    ];
    for &(key, value) in scalar_overrides {
        match scalars.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => scalars.push((key, value)),
        }
    }
    for (key, value) in scalars {
        let mut var = file.add_variable::<f64>(key, &[]).unwrap();
        var.put_values(&[value], ..).unwrap();
    }
}

/// Write a full dump set into `dir`.
pub fn write_run(dir: &Path, cfg: &RunConfig) {
    for yind in 0..cfg.nype {
        for xind in 0..cfg.nxpe {
            let index = yind * cfg.nxpe + xind;
            write_tile(&dir.join(format!("BOUT.dmp.{index}.nc")), cfg, xind, yind);
        }
    }
}

/// The reconstruction `n` should assemble to.
#[allow(dead_code)]
pub fn expected_n(cfg: &RunConfig, keep_x: bool, keep_y: bool) -> ArrayD<f64> {
    let gx0 = if keep_x { 0 } else { cfg.mxg };
    let gy0 = if keep_y { 0 } else { cfg.myg };
    let x_len = cfg.nx + if keep_x { 2 * cfg.mxg } else { 0 };
    let y_len = cfg.ny + if keep_y { 2 * cfg.myg } else { 0 };
    ArrayD::from_shape_fn(IxDyn(&[cfg.nt, x_len, y_len, cfg.nz]), |idx| {
        n_value(cfg.t0 + idx[0], gx0 + idx[1], gy0 + idx[2], idx[3])
    })
}

/// The reconstruction `phi` should assemble to.
#[allow(dead_code)]
pub fn expected_phi(cfg: &RunConfig, keep_x: bool, keep_y: bool) -> ArrayD<f64> {
    let gx0 = if keep_x { 0 } else { cfg.mxg };
    let gy0 = if keep_y { 0 } else { cfg.myg };
    let x_len = cfg.nx + if keep_x { 2 * cfg.mxg } else { 0 };
    let y_len = cfg.ny + if keep_y { 2 * cfg.myg } else { 0 };
    ArrayD::from_shape_fn(IxDyn(&[cfg.nt, x_len, y_len]), |idx| {
        phi_value(cfg.t0 + idx[0], gx0 + idx[1], gy0 + idx[2])
    })
}

/// The reconstruction `g11` should assemble to.
#[allow(dead_code)]
pub fn expected_g11(cfg: &RunConfig, keep_x: bool, keep_y: bool) -> ArrayD<f64> {
    let gx0 = if keep_x { 0 } else { cfg.mxg };
    let gy0 = if keep_y { 0 } else { cfg.myg };
    let x_len = cfg.nx + if keep_x { 2 * cfg.mxg } else { 0 };
    let y_len = cfg.ny + if keep_y { 2 * cfg.myg } else { 0 };
    ArrayD::from_shape_fn(IxDyn(&[x_len, y_len]), |idx| {
        g11_value(gx0 + idx[0], gy0 + idx[1])
    })
}
