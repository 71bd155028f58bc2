//! End-to-end tests for the package manager facade.

use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use nupm_core::{
    Action,
    Cancellation,
    Error,
    ExecutionContext,
    PackageManager,
    PackagesConfigProject,
    ProjectContext,
    ProjectSystem,
    SolutionManager,
    UninstallationContext,
    UpdateTarget,
};
use nupm_package::{PackageBuilder, README_FILE_NAME};
use nupm_solve::{DependencyBehavior, ResolutionContext};
use nupm_source::{InMemorySource, SourceGateway};
use nupm_types::{
    DependencyGroup,
    FrameworkName,
    PackageDependency,
    PackageId,
    PackageIdentity,
    Version,
    VersionConstraints,
    VersionRange,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use testresult::TestResult;

fn id(value: &str) -> PackageId {
    PackageId::from_str(value).unwrap()
}

fn identity(value: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(id(value), Version::from_str(version).unwrap())
}

fn net45() -> FrameworkName {
    FrameworkName::from_str("net45").unwrap()
}

/// Builds a package with framework-agnostic content and flat dependencies.
fn package(name: &str, version: &str, dependencies: Vec<(&str, &str)>) -> Vec<u8> {
    let dependencies = dependencies
        .into_iter()
        .map(|(id_str, range)| {
            PackageDependency::new(id(id_str), VersionRange::from_str(range).unwrap())
        })
        .collect();
    PackageBuilder::new(identity(name, version))
        .dependency_group(DependencyGroup::new(None, dependencies))
        .file("lib/net45/library.dll", b"binary")
        .build()
        .unwrap()
}

struct Fixture {
    _dir: TempDir,
    manager: PackageManager,
    project: Arc<PackagesConfigProject>,
}

impl Fixture {
    fn new(project_name: &str, packages: Vec<Vec<u8>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = InMemorySource::new("feed");
        for bytes in packages {
            source.add(bytes).unwrap();
        }
        let gateway = SourceGateway::new(vec![Arc::new(source)]);

        let solution = Arc::new(SolutionManager::new(dir.path().join("packages")));
        let project = Arc::new(PackagesConfigProject::new(
            project_name,
            dir.path().join(project_name).join("packages.config"),
            net45(),
        ));
        std::fs::create_dir_all(dir.path().join(project_name)).unwrap();
        solution.add_project(project.clone());

        Fixture {
            _dir: dir,
            manager: PackageManager::new(gateway, solution),
            project,
        }
    }

    fn install(&self, name: &str, version: &str) -> Result<(), Error> {
        self.manager.install(
            &self.project,
            &identity(name, version),
            &ResolutionContext::default(),
            &ProjectContext::default(),
            &Cancellation::new(),
        )
    }

    fn installed(&self) -> Vec<String> {
        self.project
            .installed_identities()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

/// Renders a plan as `-id/version` and `+id/version` lines.
fn transitions(plan: &nupm_core::ActionPlan) -> Vec<String> {
    plan.actions()
        .iter()
        .map(|action| match action {
            Action::Uninstall(identity) => format!("-{identity}"),
            Action::Install(identity, _) => format!("+{identity}"),
        })
        .collect()
}

#[test]
fn install_writes_dependency_then_dependent() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery", "1.6.4", vec![]),
        package("jQuery.Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
    ]);

    fixture.install("jQuery.Validation", "1.13.1")?;
    assert_eq!(
        fixture.installed(),
        vec!["jQuery/1.4.4", "jQuery.Validation/1.13.1"],
    );

    // both identities are restored in the shared store
    let store = fixture.manager.solution().store();
    assert!(store.is_restored(&identity("jQuery", "1.4.4")));
    assert!(store.is_restored(&identity("jQuery.Validation", "1.13.1")));
    Ok(())
}

#[test]
fn uninstall_with_dependents_is_refused() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery.Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
    ]);
    fixture.install("jQuery.Validation", "1.13.1")?;

    let error = fixture
        .manager
        .preview_uninstall(&fixture.project, &id("jQuery"), &UninstallationContext::new())
        .expect_err("the dependent must block the uninstall");
    match error {
        Error::PackageHasDependents { identity, dependents } => {
            assert_eq!(identity.to_string(), "jQuery/1.4.4");
            assert_eq!(dependents, vec!["jQuery.Validation/1.13.1".to_string()]);
        }
        other => panic!("expected PackageHasDependents, got {other}"),
    }

    // the preview and the executing uninstall enforce the same guard
    let error = fixture.manager.uninstall(
        &fixture.project,
        &id("jQuery"),
        &UninstallationContext::new(),
        &ProjectContext::default(),
        &Cancellation::new(),
    );
    assert!(matches!(error, Err(Error::PackageHasDependents { .. })));
    Ok(())
}

#[test]
fn update_coerces_the_shared_dependency() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("a", "1.0.0", vec![]),
        package("a", "2.0.0", vec![]),
        package("a", "3.0.0", vec![]),
        package("b", "1.0.0", vec![("a", "[1.0.0]")]),
        package("b", "2.0.0", vec![("a", "[2.0.0]")]),
        package("b", "3.0.0", vec![("a", "[2.0.0]")]),
        package("c", "1.0.0", vec![]),
        package("c", "2.0.0", vec![]),
        package("c", "3.0.0", vec![]),
    ]);
    fixture.install("b", "1.0.0")?;
    fixture.install("c", "2.0.0")?;
    assert_eq!(fixture.installed(), vec!["a/1.0.0", "b/1.0.0", "c/2.0.0"]);

    let context = ResolutionContext::new(DependencyBehavior::Highest);
    let plan = fixture.manager.preview_update(
        &fixture.project,
        &UpdateTarget::Identities(vec![identity("b", "2.0.0"), identity("c", "3.0.0")]),
        &context,
        &Cancellation::new(),
    )?;

    let rendered = transitions(&plan);
    // uninstalls come first, dependents before their dependencies
    assert_eq!(
        rendered,
        vec![
            "-c/2.0.0", "-b/1.0.0", "-a/1.0.0",
            "+a/2.0.0", "+b/2.0.0", "+c/3.0.0",
        ],
    );

    fixture
        .manager
        .execute(&fixture.project, &plan, &ProjectContext::default(), &Cancellation::new())?;
    assert_eq!(fixture.installed(), vec!["a/2.0.0", "b/2.0.0", "c/3.0.0"]);
    Ok(())
}

#[test]
fn reinstall_pairs_every_package_at_its_version() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("Microsoft.Net.Http", "2.2.22", vec![("Microsoft.Bcl", "[1.1.9,)")]),
        package("Microsoft.Bcl", "1.1.9", vec![("Microsoft.Bcl.Build", "[1.0.14,)")]),
        package("Microsoft.Bcl.Build", "1.0.14", vec![]),
    ]);
    fixture.install("Microsoft.Net.Http", "2.2.22")?;

    let context =
        ResolutionContext::default().with_constraints(VersionConstraints::ALL);
    let plan = fixture.manager.preview_update(
        &fixture.project,
        &UpdateTarget::All,
        &context,
        &Cancellation::new(),
    )?;

    assert_eq!(
        transitions(&plan),
        vec![
            "-Microsoft.Net.Http/2.2.22",
            "-Microsoft.Bcl/1.1.9",
            "-Microsoft.Bcl.Build/1.0.14",
            "+Microsoft.Bcl.Build/1.0.14",
            "+Microsoft.Bcl/1.1.9",
            "+Microsoft.Net.Http/2.2.22",
        ],
    );
    Ok(())
}

#[test]
fn installing_the_installed_latest_is_refused() -> TestResult {
    let fixture = Fixture::new("TestProjectName", vec![
        package("Newtonsoft.Json", "13.0.3", vec![]),
    ]);
    fixture.install("Newtonsoft.Json", "13.0.3")?;

    let error = fixture
        .manager
        .preview_install_latest(
            &fixture.project,
            &id("Newtonsoft.Json"),
            &ResolutionContext::default(),
            &Cancellation::new(),
        )
        .expect_err("the latest version is already installed");
    match error {
        Error::PackageAlreadyInstalled { identity, project } => {
            assert_eq!(identity.to_string(), "Newtonsoft.Json/13.0.3");
            assert_eq!(project, "TestProjectName");
        }
        other => panic!("expected PackageAlreadyInstalled, got {other}"),
    }
    Ok(())
}

#[test]
fn id_only_install_never_downgrades() -> TestResult {
    // the installed 13.0.3 was delisted after the fact, so the latest the
    // policy admits is 12.0.1
    let dir = tempfile::tempdir()?;
    let source = InMemorySource::new("feed");
    source.add(package("Newtonsoft.Json", "12.0.1", vec![]))?;
    source.add_unlisted(package("Newtonsoft.Json", "13.0.3", vec![]))?;
    let gateway = SourceGateway::new(vec![Arc::new(source)]);

    let solution = Arc::new(SolutionManager::new(dir.path().join("packages")));
    let project = Arc::new(PackagesConfigProject::new(
        "App",
        dir.path().join("App/packages.config"),
        net45(),
    ));
    std::fs::create_dir_all(dir.path().join("App"))?;
    solution.add_project(project.clone());
    let manager = PackageManager::new(gateway, solution);

    // pinning the unlisted version installs fine
    manager.install(
        &project,
        &identity("Newtonsoft.Json", "13.0.3"),
        &ResolutionContext::default(),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;

    let error = manager
        .preview_install_latest(
            &project,
            &id("Newtonsoft.Json"),
            &ResolutionContext::default(),
            &Cancellation::new(),
        )
        .expect_err("the id-only install would downgrade");
    match error {
        Error::UnexpectedDowngrade { id: package_id, installed, latest } => {
            assert_eq!(package_id, id("Newtonsoft.Json"));
            assert_eq!(installed, Version::from_str("13.0.3")?);
            assert_eq!(latest, Version::from_str("12.0.1")?);
        }
        other => panic!("expected UnexpectedDowngrade, got {other}"),
    }
    Ok(())
}

#[test]
fn force_uninstall_leaves_a_gap_later_installs_ignore() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("a", "1.0.0", vec![]),
        package("b", "1.0.0", vec![("a", "[1.0.0]")]),
        package("c", "2.0.0", vec![]),
        package("d", "2.0.0", vec![("e", "[1.0.0]")]),
        package("e", "1.0.0", vec![]),
        package("f", "3.0.0", vec![]),
    ]);
    fixture.install("b", "1.0.0")?;
    fixture.install("c", "2.0.0")?;
    fixture.install("d", "2.0.0")?;

    // knowingly orphan `d`
    fixture.manager.uninstall(
        &fixture.project,
        &id("e"),
        &UninstallationContext::new().forced(),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;

    let plan = fixture.manager.preview_install(
        &fixture.project,
        &identity("f", "3.0.0"),
        &ResolutionContext::default(),
        &Cancellation::new(),
    )?;
    // a single install; no attempt to repair the missing `e`
    assert_eq!(transitions(&plan), vec!["+f/3.0.0"]);
    Ok(())
}

#[test]
fn update_preserves_foreign_manifest_attributes() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("b", "1.0.0", vec![]),
        package("b", "2.0.0", vec![]),
    ]);
    fixture.install("b", "1.0.0")?;

    // a user hand-edits the entry with data the applier does not own
    let manifest_path = fixture.project.manifest_path();
    let mut manifest = nupm_manifest::PackagesConfig::load(manifest_path)?;
    let mut reference = manifest.remove(&id("b")).expect("b is installed");
    reference.allowed_versions = Some(VersionRange::from_str("[1.0,3.0)")?);
    reference.development_dependency = true;
    reference
        .extra
        .push(("reviewed".to_string(), "2024-11-05".to_string()));
    manifest.add(reference)?;
    manifest.write_to(manifest_path)?;

    fixture.manager.update(
        &fixture.project,
        &UpdateTarget::Identities(vec![identity("b", "2.0.0")]),
        &ResolutionContext::new(DependencyBehavior::Highest),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;

    let references = fixture.manager.get_installed_packages(&fixture.project)?;
    let reference = &references[0];
    assert_eq!(reference.identity.to_string(), "b/2.0.0");
    assert_eq!(
        reference.allowed_versions,
        Some(VersionRange::from_str("[1.0,3.0)")?),
    );
    assert!(reference.development_dependency);
    assert_eq!(
        reference.extra,
        vec![("reviewed".to_string(), "2024-11-05".to_string())],
    );
    Ok(())
}

#[test]
fn dependency_order_is_empty_when_unrestored() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery.Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
    ]);
    fixture.install("jQuery.Validation", "1.13.1")?;

    let ordered = fixture
        .manager
        .get_installed_in_dependency_order(&fixture.project)?;
    assert_eq!(
        ordered,
        vec![identity("jQuery", "1.4.4"), identity("jQuery.Validation", "1.13.1")],
    );

    // simulate an external wipe of one store directory
    let store = fixture.manager.solution().store();
    std::fs::remove_dir_all(store.dir_for(&identity("jQuery", "1.4.4")))?;
    assert_eq!(
        fixture
            .manager
            .get_installed_in_dependency_order(&fixture.project)?,
        Vec::new(),
    );
    Ok(())
}

#[test]
fn preview_is_deterministic() -> TestResult {
    let fixture = Fixture::new("App", vec![
        package("a", "1.0.0", vec![("b", "1.0.0"), ("c", "1.0.0")]),
        package("b", "1.0.0", vec![("d", "1.0.0")]),
        package("c", "1.0.0", vec![("d", "1.0.0")]),
        package("d", "1.0.0", vec![]),
    ]);

    let preview = || {
        fixture.manager.preview_install(
            &fixture.project,
            &identity("a", "1.0.0"),
            &ResolutionContext::default(),
            &Cancellation::new(),
        )
    };
    let first = preview()?;
    for _ in 0..5 {
        assert_eq!(preview()?.actions(), first.actions());
    }
    Ok(())
}

#[test]
fn readme_of_direct_install_is_surfaced() -> TestResult {
    let direct = PackageBuilder::new(identity("Direct", "1.0.0"))
        .dependency_group(DependencyGroup::new(
            None,
            vec![PackageDependency::new(
                id("Transitive"),
                VersionRange::from_str("[1.0.0]")?,
            )],
        ))
        .file(README_FILE_NAME, b"direct readme")
        .build()?;
    let transitive = PackageBuilder::new(identity("Transitive", "1.0.0"))
        .file(README_FILE_NAME, b"transitive readme")
        .build()?;
    let fixture = Fixture::new("App", vec![direct, transitive]);

    let execution = Arc::new(ExecutionContext::new());
    let context = ProjectContext::default().with_execution_context(execution.clone());
    let plan = fixture.manager.preview_install(
        &fixture.project,
        &identity("Direct", "1.0.0"),
        &ResolutionContext::default(),
        &Cancellation::new(),
    )?;
    fixture
        .manager
        .execute(&fixture.project, &plan, &context, &Cancellation::new())?;

    let store = fixture.manager.solution().store();
    // only the direct target's readme is recorded
    assert_eq!(
        execution.files_opened(),
        vec![store.dir_for(&identity("Direct", "1.0.0")).join(README_FILE_NAME)],
    );
    Ok(())
}

#[test]
fn min_client_version_gate_blocks_before_mutation() -> TestResult {
    let gated = PackageBuilder::new(identity("Gated", "1.0.0"))
        .min_client_version(Version::from_str("99.0")?)
        .file("lib/net45/library.dll", b"binary")
        .build()?;
    let fixture = Fixture::new("App", vec![gated]);

    let error = fixture.install("Gated", "1.0.0");
    assert!(matches!(error, Err(Error::VersionNotSatisfied { .. })));
    assert!(fixture.installed().is_empty());
    assert!(!fixture
        .manager
        .solution()
        .store()
        .is_restored(&identity("Gated", "1.0.0")));
    Ok(())
}

#[test]
fn unknown_package_type_is_refused() -> TestResult {
    let tool = PackageBuilder::new(identity("Tool", "1.0.0"))
        .package_type("DotnetTool")
        .file("lib/net45/library.dll", b"binary")
        .build()?;
    let fixture = Fixture::new("App", vec![tool]);

    let error = fixture.install("Tool", "1.0.0");
    assert!(matches!(error, Err(Error::VersionNotSatisfied { .. })));
    assert!(fixture.installed().is_empty());
    Ok(())
}

#[test]
fn incompatible_framework_content_is_refused() -> TestResult {
    let modern = PackageBuilder::new(identity("Modern", "1.0.0"))
        .file("lib/net48/library.dll", b"binary")
        .build()?;
    let fixture = Fixture::new("App", vec![modern]);

    let error = fixture.install("Modern", "1.0.0");
    match error {
        Err(Error::Package(nupm_package::Error::NoCompatibleItems { identity, framework })) => {
            assert_eq!(identity.to_string(), "Modern/1.0.0");
            assert_eq!(framework, net45());
        }
        other => panic!("expected NoCompatibleItems, got {other:?}"),
    }
    assert!(fixture.installed().is_empty());
    Ok(())
}

/// A project system that counts its callbacks.
#[derive(Debug, Default)]
struct RecordingProjectSystem {
    added: AtomicUsize,
    removed: AtomicUsize,
    redirects: AtomicUsize,
}

impl ProjectSystem for RecordingProjectSystem {
    fn add_references(&self, _: &PackageIdentity, _: &[String]) -> Result<(), Error> {
        self.added.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_references(&self, _: &PackageIdentity) -> Result<(), Error> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_binding_redirects(&self) -> Result<(), Error> {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn binding_redirects_run_once_unless_disabled() -> TestResult {
    let dir = tempfile::tempdir()?;
    let source = InMemorySource::new("feed");
    source.add(package("a", "1.0.0", vec![]))?;
    source.add(package("b", "1.0.0", vec![("a", "[1.0.0]")]))?;
    let gateway = SourceGateway::new(vec![Arc::new(source)]);

    let solution = Arc::new(SolutionManager::new(dir.path().join("packages")));
    let system = Arc::new(RecordingProjectSystem::default());
    let project = Arc::new(PackagesConfigProject::with_project_system(
        "App",
        dir.path().join("App/packages.config"),
        net45(),
        system.clone(),
    ));
    std::fs::create_dir_all(dir.path().join("App"))?;
    solution.add_project(project.clone());
    let manager = PackageManager::new(gateway, solution);

    manager.install(
        &project,
        &identity("b", "1.0.0"),
        &ResolutionContext::default(),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;
    // two installs, one redirect rewrite
    assert_eq!(system.added.load(Ordering::SeqCst), 2);
    assert_eq!(system.redirects.load(Ordering::SeqCst), 1);

    manager.uninstall(
        &project,
        &id("b"),
        &UninstallationContext::new(),
        &ProjectContext::default().without_binding_redirects(),
        &Cancellation::new(),
    )?;
    assert_eq!(system.removed.load(Ordering::SeqCst), 1);
    // a plan without installs does not rewrite redirects
    assert_eq!(system.redirects.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn cancelled_token_stops_the_operation() -> TestResult {
    let fixture = Fixture::new("App", vec![package("a", "1.0.0", vec![])]);
    let cancel = Cancellation::new();
    cancel.cancel();

    let error = fixture.manager.preview_install(
        &fixture.project,
        &identity("a", "1.0.0"),
        &ResolutionContext::default(),
        &cancel,
    );
    assert!(matches!(error, Err(Error::Cancelled)));
    Ok(())
}

#[test]
fn restore_materializes_without_manifest_changes() -> TestResult {
    let fixture = Fixture::new("App", vec![package("a", "1.0.0", vec![])]);

    fixture
        .manager
        .restore_package(&identity("a", "1.0.0"), &Cancellation::new())?;
    assert!(fixture
        .manager
        .solution()
        .store()
        .is_restored(&identity("a", "1.0.0")));
    assert!(fixture.installed().is_empty());

    // restoring again is a no-op
    fixture
        .manager
        .restore_package(&identity("a", "1.0.0"), &Cancellation::new())?;
    Ok(())
}

#[test]
fn shared_store_directory_outlives_the_first_uninstall() -> TestResult {
    let dir = tempfile::tempdir()?;
    let source = InMemorySource::new("feed");
    source.add(package("Shared", "1.0.0", vec![]))?;
    let gateway = SourceGateway::new(vec![Arc::new(source)]);

    let solution = Arc::new(SolutionManager::new(dir.path().join("packages")));
    let first = Arc::new(PackagesConfigProject::new(
        "First",
        dir.path().join("First/packages.config"),
        net45(),
    ));
    let second = Arc::new(PackagesConfigProject::new(
        "Second",
        dir.path().join("Second/packages.config"),
        net45(),
    ));
    std::fs::create_dir_all(dir.path().join("First"))?;
    std::fs::create_dir_all(dir.path().join("Second"))?;
    solution.add_project(first.clone());
    solution.add_project(second.clone());
    let manager = PackageManager::new(gateway, solution);

    let shared = identity("Shared", "1.0.0");
    for project in [&first, &second] {
        manager.install(
            project,
            &shared,
            &ResolutionContext::default(),
            &ProjectContext::default(),
            &Cancellation::new(),
        )?;
    }

    manager.uninstall(
        &first,
        &id("Shared"),
        &UninstallationContext::new(),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;
    // the second project still references the identity
    assert!(manager.solution().store().is_restored(&shared));

    manager.uninstall(
        &second,
        &id("Shared"),
        &UninstallationContext::new(),
        &ProjectContext::default(),
        &Cancellation::new(),
    )?;
    assert!(!manager.solution().store().is_restored(&shared));
    Ok(())
}

#[test]
fn concurrent_readers_never_observe_a_torn_manifest() -> TestResult {
    let _ = simplelog::SimpleLogger::init(
        log::LevelFilter::Warn,
        simplelog::Config::default(),
    );
    let fixture = Fixture::new("App", vec![
        package("stable", "1.0.0", vec![]),
        package("churn", "1.0.0", vec![]),
    ]);
    fixture.install("stable", "1.0.0")?;

    std::thread::scope(|scope| {
        let manager = &fixture.manager;
        let project = &fixture.project;

        let writer = scope.spawn(move || {
            for _ in 0..10 {
                manager
                    .install(
                        project,
                        &identity("churn", "1.0.0"),
                        &ResolutionContext::default(),
                        &ProjectContext::default(),
                        &Cancellation::new(),
                    )
                    .unwrap();
                manager
                    .uninstall(
                        project,
                        &id("churn"),
                        &UninstallationContext::new(),
                        &ProjectContext::default(),
                        &Cancellation::new(),
                    )
                    .unwrap();
            }
        });

        for _ in 0..4 {
            scope.spawn(move || {
                for _ in 0..50 {
                    // a torn manifest would fail to parse here
                    let references = manager.get_installed_packages(project).unwrap();
                    assert!(!references.is_empty());
                    assert!(references
                        .iter()
                        .any(|reference| reference.identity.id == id("stable")));
                }
            });
        }

        writer.join().unwrap();
    });
    Ok(())
}
