//! Save / re-open round-trip properties.

mod common;

use bout_collect::{open_boutdataset, OpenOptions, SaveOptions};
use common::RunConfig;

#[test]
fn save_then_open_preserves_values_and_metadata() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(2, 2);
    common::write_run(dir.path(), &cfg);

    let inp = dir.path().join("BOUT.inp");
    std::fs::write(&inp, "nout = 4\ntimestep = 0.1\n").unwrap();

    let ds = OpenOptions::new(dir.path().to_str().unwrap())
        .input_file(&inp)
        .chunks(2)
        .open()
        .unwrap();

    let out = dir.path().join("collected.nc");
    let written = ds.save(&out).unwrap();
    assert_eq!(written, vec![out.clone()]);

    let reopened = open_boutdataset(out.to_str().unwrap()).unwrap();

    assert_eq!(reopened.sizes(), ds.sizes());
    assert_eq!(reopened.variable_names(), ds.variable_names());
    for name in ds.variable_names() {
        assert_eq!(
            reopened.materialize(name).unwrap(),
            ds.materialize(name).unwrap(),
            "variable {name}"
        );
    }

    // The saved file is a single unpartitioned tile; everything else in
    // the metadata record survives the trip.
    assert_eq!(reopened.metadata().get_int("NXPE"), Some(1));
    assert_eq!(reopened.metadata().get_int("MXG"), Some(0));
    assert_eq!(
        reopened.metadata().get("BOUT_VERSION"),
        ds.metadata().get("BOUT_VERSION")
    );

    // Options survive via the attribute form.
    assert_eq!(reopened.options(), ds.options());
}

#[test]
fn split_save_writes_one_file_per_evolving_variable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(1, 1);
    common::write_run(dir.path(), &cfg);

    let ds = open_boutdataset(dir.path().to_str().unwrap()).unwrap();

    let out = dir.path().join("boutdata.nc");
    let mut written = ds
        .save_with(&out, &SaveOptions::default().split_by_time_dependence(true))
        .unwrap();
    written.sort();

    let expected: Vec<_> = ["n", "phi", "t_array"]
        .iter()
        .map(|v| dir.path().join(format!("boutdata_{v}.nc")))
        .collect();
    assert_eq!(written, expected);

    // Each split file carries its evolving variable plus every
    // time-independent variable.
    for (path, var) in written.iter().zip(["n", "phi", "t_array"]) {
        let part = open_boutdataset(path.to_str().unwrap()).unwrap();
        assert!(part.field(var).is_some(), "{var} in {path:?}");
        assert!(part.field("g11").is_some(), "g11 replicated into {path:?}");
        assert_eq!(
            part.materialize(var).unwrap(),
            ds.materialize(var).unwrap()
        );
        assert_eq!(
            part.materialize("g11").unwrap(),
            ds.materialize("g11").unwrap()
        );
    }
}

#[test]
fn selected_variable_save_rejects_unknown_names() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = RunConfig::new(1, 1);
    common::write_run(dir.path(), &cfg);

    let ds = open_boutdataset(dir.path().to_str().unwrap()).unwrap();
    let out = dir.path().join("subset.nc");

    let err = ds
        .save_with(&out, &SaveOptions::default().variables(&["n", "absent"]))
        .unwrap_err();
    assert!(matches!(err, bout_collect::CollectError::Input(_)));

    // A valid subset writes only the requested variables.
    let written = ds
        .save_with(&out, &SaveOptions::default().variables(&["n", "t_array"]))
        .unwrap();
    let subset = open_boutdataset(written[0].to_str().unwrap()).unwrap();
    assert!(subset.field("n").is_some());
    assert!(subset.field("t_array").is_some());
    assert!(subset.field("phi").is_none());
}
