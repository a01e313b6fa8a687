//! Incremental updates: change hooks, recheck vs rebuild, multi-crate order,
//! cancellation and determinism.

use std::path::Path;
use std::sync::Arc;

use defmap::base::load_directory;
use defmap::hir::{ModPath, build_def_map};
use defmap::syntax::CfgOptions;
use defmap::{
    CrateGraph, CrateId, DefMapConfig, DefMapError, DefMapState, Edition, Name, ProjectResolutionState,
    SourceDatabase, Vfs,
};
use rstest::rstest;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

/// `a` at the bottom, `b` depending on `a`, `c` standalone.
fn three_crates(vfs: &Vfs) -> (CrateGraph, CrateId, CrateId, CrateId) {
    vfs.set_file_text("/a/lib.rs", "pub mod m { pub struct A; }");
    vfs.set_file_text("/b/lib.rs", "pub use a::m::A;");
    vfs.set_file_text("/c/lib.rs", "pub struct C;");
    let file = |path: &str| vfs.file_id(Path::new(path)).unwrap();

    let mut graph = CrateGraph::new();
    let a = graph.add_crate("a", Edition::Edition2021, file("/a/lib.rs"), CfgOptions::new());
    let b = graph.add_crate("b", Edition::Edition2021, file("/b/lib.rs"), CfgOptions::new());
    let c = graph.add_crate("c", Edition::Edition2021, file("/c/lib.rs"), CfgOptions::new());
    graph.add_dependency(b, "a", a).unwrap();
    (graph, a, b, c)
}

fn state(parallel: bool) -> ProjectResolutionState {
    ProjectResolutionState::new(DefMapConfig::default().with_parallel(parallel))
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
fn test_first_update_builds_everything_in_order(#[case] parallel: bool) {
    let vfs = Vfs::new();
    let (graph, a, b, c) = three_crates(&vfs);
    let state = state(parallel);

    let report = state.force_rebuild_all(&graph, &vfs, &CancellationToken::new()).unwrap();
    assert_eq!(report.rebuilt.len(), 3);
    let position = |krate| report.rebuilt.iter().position(|&k| k == krate).unwrap();
    assert!(position(a) < position(b));
    assert!(report.rebuilt.contains(&c));

    for krate in [a, b, c] {
        assert_eq!(state.holder_state(krate), DefMapState::Fresh);
    }
    let b_map = state.def_map(b).unwrap();
    assert_eq!(b_map.root().get("A").types.unwrap().path.krate, a);
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
fn test_change_in_dependency_rebuilds_dependents_only(#[case] parallel: bool) {
    let vfs = Vfs::new();
    let (graph, a, b, c) = three_crates(&vfs);
    let state = state(parallel);
    let cancel = CancellationToken::new();
    state.force_rebuild_all(&graph, &vfs, &cancel).unwrap();

    let change = vfs.set_file_text("/a/lib.rs", "pub mod m { pub struct A; pub struct A2; }");
    state.on_vfs_change(&change);
    assert_eq!(state.holder_state(a), DefMapState::NeedsRecheck);

    let report = state.update_all(&graph, &vfs, &cancel).unwrap();
    assert_eq!(report.rebuilt, vec![a, b]);
    assert_eq!(state.holder_state(c), DefMapState::Fresh);
    assert!(state.def_map(a).unwrap().root().get("m").types.is_some());
}

#[test]
fn test_same_text_does_not_rebuild() {
    let vfs = Vfs::new();
    let (graph, a, _, _) = three_crates(&vfs);
    let state = state(false);
    let cancel = CancellationToken::new();
    state.force_rebuild_all(&graph, &vfs, &cancel).unwrap();
    let before = state.def_map(a).unwrap();

    // Identical text keeps the stamp; flag the file anyway
    vfs.set_file_text("/a/lib.rs", "pub mod m { pub struct A; }");
    state.on_file_changed(vfs.file_id(Path::new("/a/lib.rs")).unwrap());

    let report = state.update_all(&graph, &vfs, &cancel).unwrap();
    assert!(report.is_empty());
    assert!(Arc::ptr_eq(&before, &state.def_map(a).unwrap()));
}

#[test]
fn test_crate_graph_change_rechecks_metadata() {
    let vfs = Vfs::new();
    let (mut graph, a, b, _) = three_crates(&vfs);
    let state = state(false);
    let cancel = CancellationToken::new();
    state.force_rebuild_all(&graph, &vfs, &cancel).unwrap();

    state.on_crate_graph_changed();
    assert_eq!(state.holder_state(a), DefMapState::NeedsRecheck);
    let report = state.update_all(&graph, &vfs, &cancel).unwrap();
    assert!(report.is_empty());

    let d_file = vfs.set_file_text("/d/lib.rs", "pub struct D;").file_id();
    let d = graph.add_crate("d", Edition::Edition2021, d_file, CfgOptions::new());
    graph.add_dependency(b, "d", d).unwrap();
    state.on_crate_graph_changed();

    let report = state.update_all(&graph, &vfs, &cancel).unwrap();
    assert_eq!(report.rebuilt, vec![d, b]);
    assert!(state.def_map(b).unwrap().extern_prelude_entry("d").is_some());
}

#[test]
fn test_missed_file_heals_on_add() {
    let vfs = Vfs::new();
    let root = vfs.set_file_text("/src/lib.rs", "mod later; pub use later::Thing;").file_id();
    let mut graph = CrateGraph::new();
    let krate = graph.add_crate("main", Edition::Edition2021, root, CfgOptions::new());
    let state = state(false);
    let cancel = CancellationToken::new();

    let def_map = state.get_or_update(krate, &graph, &vfs, &cancel).unwrap().unwrap();
    assert!(def_map.is_missed_file(Path::new("/src/later.rs")));
    assert!(def_map.get_mod_data(&ModPath::new(krate, [Name::new("later")])).is_none());

    let change = vfs.set_file_text("/src/later.rs", "pub struct Thing;");
    state.on_vfs_change(&change);
    assert_eq!(state.holder_state(krate), DefMapState::NeedsRebuild);

    let def_map = state.get_or_update(krate, &graph, &vfs, &cancel).unwrap().unwrap();
    assert!(def_map.get_mod_data(&ModPath::new(krate, [Name::new("later")])).is_some());
    assert!(def_map.root().get("Thing").types.is_some());
    assert!(def_map.missed_files().is_empty());
}

#[test]
fn test_removed_file_rebuilds() {
    let vfs = Vfs::new();
    let root = vfs.set_file_text("/src/lib.rs", "mod gone;").file_id();
    vfs.set_file_text("/src/gone.rs", "pub fn f() {}");
    let mut graph = CrateGraph::new();
    let krate = graph.add_crate("main", Edition::Edition2021, root, CfgOptions::new());
    let state = state(false);
    let cancel = CancellationToken::new();
    state.get_or_update(krate, &graph, &vfs, &cancel).unwrap();

    let change = vfs.remove_file("/src/gone.rs").unwrap();
    state.on_vfs_change(&change);
    assert_eq!(state.holder_state(krate), DefMapState::NeedsRebuild);

    let def_map = state.get_or_update(krate, &graph, &vfs, &cancel).unwrap().unwrap();
    assert!(def_map.is_missed_file(Path::new("/src/gone.rs")));
}

#[test]
fn test_cancelled_update_publishes_nothing() {
    let vfs = Vfs::new();
    let (graph, a, b, c) = three_crates(&vfs);
    let state = state(false);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = state.update_all(&graph, &vfs, &cancel);
    assert!(matches!(result, Err(DefMapError::Cancelled)));
    for krate in [a, b, c] {
        assert!(state.def_map(krate).is_none());
        assert_eq!(state.holder_state(krate), DefMapState::NeedsRebuild);
    }

    let report = state.update_all(&graph, &vfs, &CancellationToken::new()).unwrap();
    assert_eq!(report.rebuilt.len(), 3);
}

#[test]
fn test_build_is_deterministic() {
    let vfs = Vfs::new();
    let root = vfs
        .set_file_text(
            "/src/lib.rs",
            "
mod a { pub use crate::b::*; pub struct A; }
mod b { pub use crate::a::*; pub struct B; }
mod c;
use a::*;
macro_rules! make { ($n:ident) => { pub struct $n; } }
make!(Made);
",
        )
        .file_id();
    vfs.set_file_text("/src/c.rs", "pub(crate) fn f() {}");
    let mut graph = CrateGraph::new();
    let krate = graph.add_crate("main", Edition::Edition2021, root, CfgOptions::new());

    let build = || {
        build_def_map(
            krate,
            &graph,
            &vfs,
            FxHashMap::default(),
            &defmap::hir::MacroRulesExpander,
            &DefMapConfig::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_load_directory_and_build() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(src.join("net")).unwrap();
    std::fs::write(src.join("lib.rs"), "pub mod net; pub use net::Socket;").unwrap();
    std::fs::write(src.join("net/mod.rs"), "mod socket; pub use self::socket::Socket;").unwrap();
    std::fs::write(src.join("net/socket.rs"), "pub struct Socket;").unwrap();

    let vfs = Vfs::new();
    let files = load_directory(&vfs, dir.path()).unwrap();
    assert_eq!(files.len(), 3);

    let root = vfs.file_id(&src.join("lib.rs")).unwrap();
    let mut graph = CrateGraph::new();
    let krate = graph.add_crate("net", Edition::Edition2021, root, CfgOptions::new());
    let state = state(false);
    let def_map = state.get_or_update(krate, &graph, &vfs, &CancellationToken::new()).unwrap().unwrap();

    assert!(def_map.root().get("Socket").types.is_some());
    assert_eq!(def_map.file_infos().len(), 3);
    assert!(def_map.diagnostics().is_empty());
}
