//! End-to-end reconstruction tests over synthetic dump sets.

mod common;

use bout_collect::{open_boutdataset, CollectError, OpenOptions};
use common::RunConfig;

#[test]
fn single_tile_run_is_reconstructed_verbatim() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = RunConfig::new(1, 1);
    cfg.mxg = 0;
    cfg.myg = 0;
    common::write_run(dir.path(), &cfg);

    let ds = open_boutdataset(dir.path().to_str().unwrap()).unwrap();

    assert_eq!(ds.dim_len("t"), Some(cfg.nt));
    assert_eq!(ds.dim_len("x"), Some(cfg.nx));
    assert_eq!(ds.dim_len("y"), Some(cfg.ny));
    assert_eq!(ds.dim_len("z"), Some(cfg.nz));

    assert_eq!(ds.materialize("n").unwrap(), common::expected_n(&cfg, false, false));
    assert_eq!(ds.materialize("phi").unwrap(), common::expected_phi(&cfg, false, false));
    assert_eq!(ds.materialize("g11").unwrap(), common::expected_g11(&cfg, false, false));

    assert_eq!(ds.metadata().get_int("NXPE"), Some(1));
    // Position scalars vary per tile and never reach the merged record.
    assert!(ds.metadata().get("PE_XIND").is_none());
}

#[test]
fn guard_cells_are_trimmed_to_the_original_global_array() {
    for (nxpe, nype) in [(2, 1), (1, 2), (2, 2), (4, 3)] {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = RunConfig::new(nxpe, nype);
        cfg.nx = 8;
        cfg.ny = 6;
        common::write_run(dir.path(), &cfg);

        let ds = open_boutdataset(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(ds.dim_len("x"), Some(cfg.nx), "topology ({nxpe}, {nype})");
        assert_eq!(ds.dim_len("y"), Some(cfg.ny), "topology ({nxpe}, {nype})");
        assert_eq!(
            ds.materialize("n").unwrap(),
            common::expected_n(&cfg, false, false),
            "topology ({nxpe}, {nype})"
        );
        assert_eq!(
            ds.materialize("phi").unwrap(),
            common::expected_phi(&cfg, false, false),
            "topology ({nxpe}, {nype})"
        );
        assert_eq!(
            ds.materialize("g11").unwrap(),
            common::expected_g11(&cfg, false, false),
            "topology ({nxpe}, {nype})"
        );
    }
}

#[test]
fn boundary_guards_are_kept_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 2);
    common::write_run(dir.path(), &cfg);

    let ds = OpenOptions::new(dir.path().to_str().unwrap())
        .keep_xboundaries(true)
        .keep_yboundaries(true)
        .open()
        .unwrap();

    assert_eq!(ds.dim_len("x"), Some(cfg.nx + 2 * cfg.mxg));
    assert_eq!(ds.dim_len("y"), Some(cfg.ny + 2 * cfg.myg));
    assert_eq!(ds.materialize("n").unwrap(), common::expected_n(&cfg, true, true));

    // Mixed: keep only x boundaries.
    let ds = OpenOptions::new(dir.path().to_str().unwrap())
        .keep_xboundaries(true)
        .open()
        .unwrap();
    assert_eq!(ds.materialize("n").unwrap(), common::expected_n(&cfg, true, false));
}

#[test]
fn time_slab_materialization_matches_full_read() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 1);
    common::write_run(dir.path(), &cfg);

    let ds = open_boutdataset(dir.path().to_str().unwrap()).unwrap();
    let full = ds.materialize("n").unwrap();
    let slab = ds.materialize_trange("n", 1..3).unwrap();
    assert_eq!(slab.shape()[0], 2);

    let expected = full.slice_axis(ndarray::Axis(0), ndarray::Slice::from(1..3)).to_owned();
    assert_eq!(slab, expected.into_dyn());
}

#[test]
fn open_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 2);
    common::write_run(dir.path(), &cfg);

    let a = open_boutdataset(dir.path().to_str().unwrap()).unwrap();
    let b = open_boutdataset(dir.path().to_str().unwrap()).unwrap();

    assert_eq!(a.sizes(), b.sizes());
    assert_eq!(a.variable_names(), b.variable_names());
    for name in a.variable_names() {
        assert_eq!(a.materialize(name).unwrap(), b.materialize(name).unwrap());
    }
    assert_eq!(a.metadata(), b.metadata());
}

#[test]
fn conflicting_guard_width_fails_with_metadata_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 1);
    // Both tiles claim the same layout but disagree on MXG.
    common::write_tile_with(&dir.path().join("BOUT.dmp.0.nc"), &cfg, 0, 0, &[]);
    common::write_tile_with(&dir.path().join("BOUT.dmp.1.nc"), &cfg, 1, 0, &[("MXG", 1.0)]);

    let err = open_boutdataset(dir.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, CollectError::Metadata(_)), "got {err:?}");
}

#[test]
fn incomplete_tile_set_fails_with_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 2);
    common::write_run(dir.path(), &cfg);
    std::fs::remove_file(dir.path().join("BOUT.dmp.3.nc")).unwrap();

    let err = open_boutdataset(dir.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, CollectError::Input(_)), "got {err:?}");
}

#[test]
fn no_matching_files_fails_with_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_boutdataset(dir.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, CollectError::Input(_)));
}

#[test]
fn grid_file_fields_are_merged_and_incompatible_ones_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 1);
    common::write_run(dir.path(), &cfg);

    // Grid file matching the trimmed dataset extents, plus one variable
    // on a foreign grid that must be dropped with a warning.
    let gridpath = dir.path().join("grid.nc");
    {
        let mut file = netcdf::create(&gridpath).unwrap();
        file.add_dimension("x", cfg.nx).unwrap();
        file.add_dimension("y", cfg.ny).unwrap();
        file.add_dimension("xcoarse", cfg.nx / 2).unwrap();

        let rxy: Vec<f64> = (0..cfg.nx * cfg.ny).map(|i| 100.0 + i as f64).collect();
        let mut rxy_var = file.add_variable::<f64>("Rxy", &["x", "y"]).unwrap();
        rxy_var.put_values(&rxy, ..).unwrap();

        let coarse: Vec<f64> = (0..cfg.nx / 2 * cfg.ny).map(|i| i as f64).collect();
        let mut bad = file.add_variable::<f64>("Rcoarse", &["xcoarse", "y"]).unwrap();
        bad.put_values(&coarse, ..).unwrap();
    }

    let ds = OpenOptions::new(dir.path().to_str().unwrap())
        .grid_file(&gridpath)
        .open()
        .unwrap();

    let rxy = ds.materialize("Rxy").unwrap();
    assert_eq!(rxy.shape(), &[cfg.nx, cfg.ny]);
    assert_eq!(rxy[[0, 0]], 100.0);
    // The foreign-grid variable is dropped, and its dimension with it.
    assert!(ds.field("Rcoarse").is_none());
    assert_eq!(ds.grid_file().unwrap(), &gridpath);
}

#[test]
fn options_file_is_attached_to_dataset_and_variables() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(1, 1);
    common::write_run(dir.path(), &cfg);

    let inp = dir.path().join("BOUT.inp");
    std::fs::write(&inp, "nout = 4\n[mesh]\nnx = 8\n").unwrap();

    let ds = OpenOptions::new(dir.path().to_str().unwrap())
        .input_file(&inp)
        .open()
        .unwrap();

    let options = ds.options().expect("options attached");
    assert_eq!(options.get("global", "nout"), Some("4"));
    assert_eq!(options.get("mesh", "nx"), Some("8"));
    // Attached to every variable too, so it survives selection.
    let field = ds.field("n").unwrap();
    assert_eq!(field.options.as_deref(), Some(options));
}
