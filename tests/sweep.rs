//! Runs whole sweeps against the mock engine.

use evo_sweep::aggregate::{Cell, Summary};
use evo_sweep::config::SweepConfig;
use evo_sweep::engine::Engine;
use evo_sweep::error::{Error, ExitCause};
use evo_sweep::script::Sharding;
use evo_sweep::spec::{GridAxes, MutationAxis, SizeAxis, SweepKind, SweepSpec, Variant};
use evo_sweep::sweep::Sweep;
use std::path::{Path, PathBuf};
use std::process::Command;

const MOCK_ENGINE: &str = env!("CARGO_BIN_EXE_mock_engine");

fn mock_engine(args: &[&str]) -> Engine {
    Engine::new(MOCK_ENGINE).args(args.iter().copied())
}

fn write_table(dir: &Path, entries: &[(&str, f64)]) -> PathBuf {
    let path = dir.join("table.json");
    let table: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
        .collect();
    std::fs::write(&path, serde_json::to_vec(&table).unwrap()).unwrap();
    path
}

#[test]
fn series_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let kind = SweepKind::series(vec![
        Variant::new("unadjusted", SweepSpec::new("hello-world-unadjusted", 2, 3).with_optmem(true)),
        Variant::new("adjusted", SweepSpec::new("hello-world", 2, 3).with_optmem(true)),
    ]);
    let engine = mock_engine(&["--base=-10", "--per-generation", "20", "--per-run", "10", "--echo"]);
    let outcome = Sweep::new("hello-world", kind, engine).output(root.path()).run().unwrap();
    assert!(outcome.is_complete(), "{outcome:?}");
    assert!(outcome.dir.starts_with(root.path()));
    assert!(outcome.dir.join("adjusted-1-3.json").exists());
    let Summary::Series(summary) = outcome.summary else {
        panic!("expected a time-series summary");
    };
    assert_eq!(summary.generations, [1, 2, 3]);
    for name in ["unadjusted", "adjusted"] {
        let series = summary.variant(name).unwrap();
        assert_eq!(series.means(), [Some(15.0), Some(35.0), Some(55.0)]);
        assert!(series.cells.iter().all(|cell| cell.trials == 2));
    }
}

#[test]
fn engine_crash_degrades_summary() {
    let root = tempfile::tempdir().unwrap();
    let kind = SweepKind::series(vec![Variant::new("baseline", SweepSpec::new("print1", 3, 2))]);
    // goal, then five commands per trial: trial 2 never starts.
    let engine = mock_engine(&["--per-generation", "10", "--per-run", "1", "--fail-after", "11"]);
    let outcome = Sweep::new("crash", kind, engine).output(root.path()).run().unwrap();
    assert!(!outcome.is_complete());
    assert_eq!(outcome.engine_failures.len(), 1);
    match &outcome.engine_failures[0].error {
        Error::EngineExit { cause, .. } => assert_eq!(*cause, ExitCause::Code(3)),
        other => panic!("expected EngineExit, got {other:?}"),
    }
    let Summary::Series(summary) = &outcome.summary else {
        panic!("expected a time-series summary");
    };
    assert_eq!(summary.failures.len(), 2);
    assert!(summary.failures.iter().all(|failure| failure.coordinate.trial() == 2));
    assert_eq!(
        summary.series[0].cells,
        [
            Cell {
                mean: Some(10.5),
                trials: 2
            },
            Cell {
                mean: Some(20.5),
                trials: 2
            },
        ]
    );
}

#[test]
fn grid_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let table = write_table(
        root.path(),
        &[
            ("trial-0-size500-mut25.json", 5.0),
            ("trial-1-size500-mut25.json", 15.0),
            ("trial-0-size1000-mut25.json", 20.0),
            ("trial-1-size1000-mut25.json", 20.0),
            ("trial-0-size500-mut40.json", 0.0),
            ("trial-1-size500-mut40.json", 60.0),
            ("trial-0-size1000-mut40.json", 39.0),
            ("trial-1-size1000-mut40.json", 41.0),
        ],
    );
    let kind = SweepKind::grid(
        SweepSpec::new("print1", 2, 50).with_optmem(true),
        GridAxes {
            mutation: MutationAxis {
                start: 10.0,
                step: 15.0,
                count: 2,
            },
            size: SizeAxis { step: 500, count: 2 },
        },
    );
    let engine = mock_engine(&["--table", table.to_str().unwrap()]);
    let outcome = Sweep::new("size-mut", kind, engine)
        .output(root.path())
        .sharding(Sharding::PerTrial)
        .jobs(3)
        .run()
        .unwrap();
    assert!(outcome.is_complete(), "{outcome:?}");
    let Summary::Grid(summary) = outcome.summary else {
        panic!("expected a grid summary");
    };
    assert_eq!(summary.mutation_rates, [25.0, 40.0]);
    assert_eq!(summary.population_sizes, [500, 1000]);
    assert_eq!(summary.means(), [[Some(10.0), Some(20.0)], [Some(30.0), Some(40.0)]]);
}

#[test]
fn missing_exports_are_reported() {
    let root = tempfile::tempdir().unwrap();
    let table = write_table(root.path(), &[("trial-0.json", 100.0), ("trial-2.json", 300.0)]);
    let kind = SweepKind::distribution(SweepSpec::new("print1", 4, 20));
    let engine = mock_engine(&["--table", table.to_str().unwrap()]);
    let outcome = Sweep::new("hist", kind, engine).output(root.path()).run().unwrap();
    assert!(outcome.engine_failures.is_empty());
    assert!(!outcome.is_complete());
    let Summary::Distribution(summary) = outcome.summary else {
        panic!("expected a distribution summary");
    };
    assert_eq!(summary.values(), [100.0, 300.0]);
    assert_eq!(
        summary.overall,
        Cell {
            mean: Some(200.0),
            trials: 2
        }
    );
    let missing: Vec<u64> = summary.failures.iter().map(|failure| failure.coordinate.trial()).collect();
    assert_eq!(missing, [1, 3]);
}

#[test]
fn sharded_distribution() {
    let root = tempfile::tempdir().unwrap();
    let kind = SweepKind::distribution(SweepSpec::new("print1", 6, 20).with_population_size(500));
    let engine = mock_engine(&["--base", "1", "--per-generation", "2"]);
    let outcome = Sweep::new("hist", kind, engine)
        .output(root.path())
        .sharding(Sharding::PerTrial)
        .jobs(3)
        .run()
        .unwrap();
    assert!(outcome.is_complete(), "{outcome:?}");
    let Summary::Distribution(summary) = outcome.summary else {
        panic!("expected a distribution summary");
    };
    assert_eq!(summary.values(), [41.0; 6]);
    let stats: serde_json::Value =
        serde_json::from_slice(&std::fs::read(outcome.dir.join("trial-5.json")).unwrap()).unwrap();
    assert_eq!(stats["population_size"], 500);
    assert_eq!(stats["generation"], 20);
}

#[test]
fn repeated_sweeps_get_separate_directories() {
    let root = tempfile::tempdir().unwrap();
    let sweep = Sweep::new(
        "hist",
        SweepKind::distribution(SweepSpec::new("print1", 1, 5)),
        mock_engine(&[]),
    )
    .output(root.path());
    let first = sweep.run().unwrap();
    let second = sweep.run().unwrap();
    assert_ne!(first.dir, second.dir);
    assert!(first.dir.join("trial-0.json").exists());
    assert!(second.dir.join("trial-0.json").exists());
}

fn write_config(dir: &Path, engine_args: &[&str]) -> PathBuf {
    let config = serde_json::json!({
        "name": "median-fitness",
        "description": ["Final median fitness ", "of independent runs"],
        "engine": MOCK_ENGINE,
        "engine_args": engine_args,
        "output": "out",
        "timeout": 60,
        "sweep": {
            "type": "Distribution",
            "goal": "print1",
            "optmem": true,
            "trials": 3,
            "generations": 20
        }
    });
    let path = dir.join("sweep.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn config_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let path = write_config(root.path(), &["--per-generation", "3"]);
    let config = SweepConfig::load(&path).unwrap();
    let outcome = config.sweep().run().unwrap();
    assert!(outcome.is_complete(), "{outcome:?}");
    assert!(outcome.dir.starts_with(root.path().join("out")));
    let Summary::Distribution(summary) = outcome.summary else {
        panic!("expected a distribution summary");
    };
    assert_eq!(summary.values(), [60.0; 3]);
}

#[test]
fn command_line() {
    let root = tempfile::tempdir().unwrap();
    let evo_sweep = env!("CARGO_BIN_EXE_evo_sweep");

    let path = write_config(root.path(), &[]);
    let output = Command::new(evo_sweep).arg("run").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["summary"]["type"], "Distribution");
    assert_eq!(outcome["summary"]["overall"]["mean"], 20.0);
    assert_eq!(outcome["summary"]["overall"]["trials"], 3);

    // Rerun the aggregation alone on the same directory.
    let dir = outcome["dir"].as_str().unwrap();
    let output = Command::new(evo_sweep)
        .args(["aggregate", path.to_str().unwrap(), "--dir", dir])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary, outcome["summary"]);

    let output = Command::new(evo_sweep)
        .args(["script", path.to_str().unwrap(), "--dir", "data"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let script = String::from_utf8(output.stdout).unwrap();
    assert!(script.starts_with("optmem true\ngoal print1\nnew\nnext 20\nexport-stats data/trial-0.json\n"));
    assert!(script.ends_with("exit\n"));

    let path = write_config(root.path(), &["--fail-after", "5"]);
    let output = Command::new(evo_sweep).arg("run").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "{output:?}");
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["engine_failures"].as_array().unwrap().len(), 1);
    assert_eq!(outcome["summary"]["overall"]["trials"], 1);

    let output = Command::new(evo_sweep)
        .arg("run")
        .arg(root.path().join("missing.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}
