//! Every bundled data file must load.

use std::path::Path;
use treegp::target::Environment;
use treegp::{Config, Pairs, Trail};
use walkdir::WalkDir;

fn data_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))
}

#[test]
fn bundled_data_loads() {
    let mut seen = 0;
    for entry in WalkDir::new(data_dir()) {
        let entry = entry.unwrap();
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("dat") => {
                let pairs = Pairs::load(path).unwrap();
                assert!(!pairs.is_empty(), "{}", path.display());
            }
            Some("map") => {
                let trail = Trail::load(path, 100).unwrap();
                assert!(trail.max() > 0.0, "{}", path.display());
            }
            Some("toml") => {
                let config = Config::load(path).unwrap();
                config.function_set().unwrap();
            }
            _ => continue,
        }
        seen += 1;
    }
    assert!(seen >= 4);
}

#[test]
fn missing_files_are_io_errors() {
    let missing = data_dir().join("missing.dat");
    assert!(matches!(Pairs::load(&missing), Err(treegp::Error::Io(_))));
    assert!(matches!(Trail::load(&missing, 10), Err(treegp::Error::Io(_))));
    assert!(matches!(Config::load(&missing), Err(treegp::Error::Io(_))));
}
