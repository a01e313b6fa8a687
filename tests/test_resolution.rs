//! Name resolution over whole crates: globs, editions, visibility, macros.

use std::path::Path;
use std::sync::Arc;

use defmap::hir::{LocalModuleId, ModPath, ResolveMode};
use defmap::syntax::CfgOptions;
use defmap::{CrateDefMap, CrateGraph, CrateId, Edition, Name, ProjectResolutionState, SourceDatabase, Vfs, Visibility};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

// ============================================================================
// FIXTURES
// ============================================================================

/// A project of crates given as `(name, edition, [(path, text)], [deps])`.
struct Fixture {
    vfs: Vfs,
    graph: CrateGraph,
    crates: Vec<CrateId>,
    state: ProjectResolutionState,
}

impl Fixture {
    fn new(crates: &[(&str, Edition, &[(&str, &str)], &[&str])]) -> Self {
        let vfs = Vfs::new();
        let mut graph = CrateGraph::new();
        let mut ids: Vec<(String, CrateId)> = Vec::new();
        for (name, edition, files, deps) in crates {
            for (path, text) in *files {
                vfs.set_file_text(path, *text);
            }
            let root = vfs.file_id(Path::new(files[0].0)).unwrap();
            let id = graph.add_crate(name, *edition, root, CfgOptions::new());
            for dep in *deps {
                let (_, dep_id) = ids.iter().find(|(n, _)| n == dep).unwrap();
                graph.add_dependency(id, dep, *dep_id).unwrap();
            }
            ids.push((name.to_string(), id));
        }
        Self {
            vfs,
            graph,
            crates: ids.into_iter().map(|(_, id)| id).collect(),
            state: ProjectResolutionState::default(),
        }
    }

    fn single(text: &str) -> Self {
        Self::new(&[("main", Edition::Edition2021, &[("/main/lib.rs", text)], &[])])
    }

    fn def_map(&self, krate: CrateId) -> Arc<CrateDefMap> {
        self.state.get_or_update(krate, &self.graph, &self.vfs, &CancellationToken::new()).unwrap().unwrap()
    }

    fn main(&self) -> Arc<CrateDefMap> {
        self.def_map(*self.crates.last().unwrap())
    }
}

fn path(text: &str) -> Vec<Name> {
    text.split("::").map(Name::new).collect()
}

fn module(def_map: &CrateDefMap, text: &str) -> LocalModuleId {
    let mod_path = ModPath::new(def_map.krate, text.split("::").filter(|s| !s.is_empty()).map(Name::new));
    def_map.get_mod_data(&mod_path).unwrap().id.local
}

fn resolved_path(def_map: &CrateDefMap, from: LocalModuleId, text: &str) -> Option<String> {
    let per_ns = def_map.resolve_path(from, &path(text));
    let item = per_ns.types.or(per_ns.values).or(per_ns.macros)?;
    Some(item.path.segments.iter().map(Name::as_str).collect::<Vec<_>>().join("::"))
}

// ============================================================================
// GLOBS
// ============================================================================

#[test]
fn test_glob_imports_are_transitive() {
    let fixture = Fixture::single(
        "
mod a { pub fn f() {} }
mod b { pub use crate::a::*; }
mod c { pub use crate::b::*; }
use c::f;
",
    );
    let def_map = fixture.main();
    let root = def_map.root().id.local;

    assert_eq!(resolved_path(&def_map, root, "c::f").as_deref(), Some("a::f"));
    assert!(def_map.root().get("f").values.is_some());
}

#[test]
fn test_mutual_glob_cycle_terminates() {
    let fixture = Fixture::single(
        "
pub mod a { pub use crate::b::*; pub fn fa() {} }
pub mod b { pub use crate::a::*; pub fn fb() {} }
",
    );
    let def_map = fixture.main();
    let root = def_map.root().id.local;

    assert_eq!(resolved_path(&def_map, root, "a::fb").as_deref(), Some("b::fb"));
    assert_eq!(resolved_path(&def_map, root, "b::fa").as_deref(), Some("a::fa"));
    assert!(def_map.diagnostics().is_empty());
}

#[test]
fn test_named_import_wins_over_glob() {
    let fixture = Fixture::single(
        "
mod a { pub fn x() {} }
mod b { pub fn x() {} }
use a::*;
use b::x;
",
    );
    let def_map = fixture.main();
    let root = def_map.root().id.local;
    assert_eq!(resolved_path(&def_map, root, "x").as_deref(), Some("b::x"));
}

#[test]
fn test_glob_from_enum_imports_variants() {
    let fixture = Fixture::single(
        "
enum E { A, B(u8), C { x: u8 } }
use E::*;
",
    );
    let def_map = fixture.main();
    let root = def_map.root();
    assert!(root.get("A").types.is_some());
    assert!(root.get("B").values.is_some());
    assert!(root.get("C").values.is_none());
}

// ============================================================================
// EDITIONS
// ============================================================================

#[rstest]
#[case::edition_2015(Edition::Edition2015, None, Some("foo::g"))]
#[case::edition_2018(Edition::Edition2018, Some("f"), None)]
#[case::edition_2021(Edition::Edition2021, Some("f"), None)]
fn test_import_path_start_depends_on_edition(
    #[case] edition: Edition,
    #[case] dependency_item: Option<&str>,
    #[case] local_item: Option<&str>,
) {
    let fixture = Fixture::new(&[
        ("foo", Edition::Edition2021, &[("/foo/lib.rs", "pub fn f() {}")], &[]),
        ("main", edition, &[("/main/lib.rs", "mod foo { pub fn g() {} } mod m {}")], &["foo"]),
    ]);
    let def_map = fixture.main();
    let m = module(&def_map, "m");

    let to_dependency = def_map.resolve_path_fp(m, &path("foo::f"), ResolveMode::Import, false);
    let found = to_dependency.resolved_def.values.map(|item| item.path.name().unwrap().to_string());
    assert_eq!(found.as_deref(), dependency_item);

    let to_local = def_map.resolve_path_fp(m, &path("foo::g"), ResolveMode::Import, false);
    let found = to_local
        .resolved_def
        .values
        .map(|item| item.path.segments.iter().map(Name::as_str).collect::<Vec<_>>().join("::"));
    assert_eq!(found.as_deref(), local_item);
}

#[test]
fn test_absolute_path_2015_prefers_crate_root() {
    let fixture = Fixture::new(&[
        ("foo", Edition::Edition2021, &[("/foo/lib.rs", "pub struct Dep;")], &[]),
        ("main", Edition::Edition2015, &[("/main/lib.rs", "pub mod foo { pub struct Local; }")], &["foo"]),
    ]);
    let def_map = fixture.main();
    let root = def_map.root().id.local;

    let mut absolute = vec![Name::new("")];
    absolute.extend(path("foo::Local"));
    let result = def_map.resolve_path_fp(root, &absolute, ResolveMode::Other, false);
    assert!(result.resolved_def.types.is_some());
    assert!(!result.visited_other_crate);
}

#[test]
fn test_extern_prelude_resolves_dependency() {
    let fixture = Fixture::new(&[
        ("dep", Edition::Edition2021, &[("/dep/lib.rs", "pub mod inner { pub struct S; }")], &[]),
        ("main", Edition::Edition2021, &[("/main/lib.rs", "use dep::inner::S;")], &["dep"]),
    ]);
    let def_map = fixture.main();
    let root = def_map.root().id.local;

    let result = def_map.resolve_path_fp(root, &path("dep::inner::S"), ResolveMode::Other, false);
    assert!(result.visited_other_crate);
    assert!(result.reached_fixed_point);
    assert_eq!(result.resolved_def.types.unwrap().path.krate, fixture.crates[0]);
    assert!(def_map.root().get("S").types.is_some());
}

// ============================================================================
// VISIBILITY
// ============================================================================

#[test]
fn test_restricted_visibility_filters_results() {
    let fixture = Fixture::single(
        "
pub mod outer {
    pub mod inner { pub(in crate::outer) fn secret() {} }
    pub mod sibling {}
}
pub mod other {}
",
    );
    let def_map = fixture.main();
    let sibling = module(&def_map, "outer::sibling");
    let other = module(&def_map, "other");
    let target = path("crate::outer::inner::secret");

    let from_sibling = def_map.resolve_path_fp(sibling, &target, ResolveMode::Other, false);
    assert!(from_sibling.resolved_def.values.is_some());

    let from_other = def_map.resolve_path_fp(other, &target, ResolveMode::Other, false);
    assert!(from_other.resolved_def.is_none());

    let with_invisible = def_map.resolve_path_fp(other, &target, ResolveMode::Other, true);
    assert!(with_invisible.resolved_def.values.is_some());
}

#[test]
fn test_super_and_self_paths() {
    let fixture = Fixture::single(
        "
pub struct Top;
pub mod a {
    pub struct InA;
    pub mod b { pub struct InB; }
}
",
    );
    let def_map = fixture.main();
    let b = module(&def_map, "a::b");

    assert_eq!(resolved_path(&def_map, b, "super::InA").as_deref(), Some("a::InA"));
    assert_eq!(resolved_path(&def_map, b, "super::super::Top").as_deref(), Some("Top"));
    assert_eq!(resolved_path(&def_map, b, "self::InB").as_deref(), Some("a::b::InB"));
    assert_eq!(resolved_path(&def_map, b, "self::super::InA").as_deref(), Some("a::InA"));
    assert_eq!(resolved_path(&def_map, b, "super::super::super::Top"), None);
}

#[test]
fn test_walk_stops_at_non_module() {
    let fixture = Fixture::single("pub struct S; pub fn f() {}");
    let def_map = fixture.main();
    let root = def_map.root().id.local;

    let result = def_map.resolve_path_fp(root, &path("S::x"), ResolveMode::Other, false);
    assert!(result.resolved_def.is_none());
    assert!(result.reached_fixed_point);

    let result = def_map.resolve_path_fp(root, &path("missing::x"), ResolveMode::Other, false);
    assert!(result.resolved_def.is_none());
    assert!(!result.reached_fixed_point);
}

// ============================================================================
// MACROS
// ============================================================================

#[test]
fn test_exported_macro_from_dependency() {
    let fixture = Fixture::new(&[
        (
            "dep",
            Edition::Edition2021,
            &[(
                "/dep/lib.rs",
                "
pub struct Helper;
#[macro_export]
macro_rules! alias { ($n:ident) => { pub use $crate::Helper as $n; } }
",
            )],
            &[],
        ),
        ("main", Edition::Edition2021, &[("/main/lib.rs", "use dep::alias; alias!(Local);")], &["dep"]),
    ]);
    let def_map = fixture.main();
    let local = def_map.root().get("Local").types.expect("macro-generated import");
    assert_eq!(local.path.krate, fixture.crates[0]);
    assert_eq!(local.path.name().map(Name::as_str), Some("Helper"));
}

#[test]
fn test_macro_use_extern_crate() {
    let fixture = Fixture::new(&[
        (
            "dep",
            Edition::Edition2015,
            &[("/dep/lib.rs", "#[macro_export] macro_rules! make { ($n:ident) => { pub struct $n; } }")],
            &[],
        ),
        (
            "main",
            Edition::Edition2015,
            &[("/main/lib.rs", "#[macro_use] extern crate dep; make!(Made);")],
            &["dep"],
        ),
    ]);
    let def_map = fixture.main();
    assert!(def_map.root().get("Made").types.is_some());
    assert!(def_map.root().get("dep").types.is_some());
}

#[test]
fn test_macro_use_module_exports_to_parent() {
    let fixture = Fixture::single(
        "
#[macro_use]
mod macros { macro_rules! make { ($n:ident) => { pub struct $n; } } }
make!(Made);
",
    );
    let def_map = fixture.main();
    assert!(def_map.root().get("Made").types.is_some());
}

// ============================================================================
// PRELUDES
// ============================================================================

#[test]
fn test_invisible_glob_binding_does_not_hide_extern_crate() {
    let fixture = Fixture::new(&[
        ("dep", Edition::Edition2021, &[("/dep/lib.rs", "pub fn target() {}")], &[]),
        (
            "main",
            Edition::Edition2021,
            &[("/main/lib.rs", "mod a { mod dep {} } use a::*; pub use dep::target;")],
            &["dep"],
        ),
    ]);
    let def_map = fixture.main();
    let root = def_map.root().id.local;
    let dep = fixture.crates[0];

    let glob_copy = def_map.root().get("dep").types.unwrap();
    assert_eq!(glob_copy.visibility, Visibility::Invisible);

    let resolved = def_map.resolve_path(root, &path("dep::target")).values.unwrap();
    assert_eq!(resolved.path.krate, dep);
    assert_eq!(def_map.root().get("target").values.unwrap().path.krate, dep);
    assert!(def_map.diagnostics().is_empty());
}

const STD: &str = "
pub mod prelude {
    pub mod v1 { pub struct Vec; pub struct Option; }
    pub mod rust_2021 { pub struct Vec; pub struct Option; }
}
";

#[rstest]
#[case::edition_module(Edition::Edition2021, "std", "prelude::rust_2021::Vec")]
#[case::v1_fallback(Edition::Edition2018, "std", "prelude::v1::Vec")]
#[case::core_fallback(Edition::Edition2021, "core", "prelude::rust_2021::Vec")]
fn test_std_prelude_module_choice(#[case] edition: Edition, #[case] std_name: &str, #[case] expected: &str) {
    let fixture = Fixture::new(&[
        (std_name, Edition::Edition2021, &[("/std/lib.rs", STD)], &[]),
        ("main", edition, &[("/main/lib.rs", "mod m {}")], &[std_name]),
    ]);
    let def_map = fixture.main();
    assert_eq!(def_map.prelude().map(|prelude| prelude.krate), Some(fixture.crates[0]));

    let m = module(&def_map, "m");
    let vec = def_map.resolve_path(m, &path("Vec")).types.unwrap();
    assert_eq!(vec.path.krate, fixture.crates[0]);
    assert_eq!(resolved_path(&def_map, m, "Vec").as_deref(), Some(expected));
}

#[test]
fn test_module_scope_then_extern_prelude_then_std_prelude() {
    let fixture = Fixture::new(&[
        ("std", Edition::Edition2021, &[("/std/lib.rs", STD)], &[]),
        ("Option", Edition::Edition2021, &[("/option/lib.rs", "pub struct Some;")], &[]),
        ("main", Edition::Edition2021, &[("/main/lib.rs", "pub struct Vec; mod m {}")], &["std", "Option"]),
    ]);
    let def_map = fixture.main();
    let root = def_map.root().id.local;
    let m = module(&def_map, "m");
    let (std, option, main) = (fixture.crates[0], fixture.crates[1], fixture.crates[2]);

    // local item shadows the prelude
    assert_eq!(def_map.resolve_path(root, &path("Vec")).types.unwrap().path.krate, main);
    // no local item in `m`
    assert_eq!(def_map.resolve_path(m, &path("Vec")).types.unwrap().path.krate, std);
    // extern prelude beats the std prelude
    let crate_root = def_map.resolve_path(m, &path("Option")).types.unwrap();
    assert_eq!(crate_root.path.krate, option);
    assert!(crate_root.path.is_crate_root());
}
