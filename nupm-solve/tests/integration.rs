//! Integration tests for `nupm-solve`.

use std::{str::FromStr, sync::Arc};

use nupm_package::PackageBuilder;
use nupm_solve::{
    DependencyBehavior,
    Error,
    InstalledPackage,
    Resolution,
    ResolutionContext,
    ResolutionTarget,
    Resolver,
};
use nupm_source::{InMemorySource, SourceGateway};
use nupm_types::{
    DependencyGroup,
    FrameworkName,
    PackageDependency,
    PackageId,
    PackageIdentity,
    Version,
    VersionRange,
};
use rstest::rstest;
use testresult::TestResult;

fn identity(id: &str, version: &str) -> PackageIdentity {
    PackageIdentity::new(
        PackageId::from_str(id).unwrap(),
        Version::from_str(version).unwrap(),
    )
}

fn package(id: &str, version: &str, dependencies: Vec<(&str, &str)>) -> Vec<u8> {
    let dependencies = dependencies
        .into_iter()
        .map(|(id, range)| {
            PackageDependency::new(
                PackageId::from_str(id).unwrap(),
                VersionRange::from_str(range).unwrap(),
            )
        })
        .collect();
    PackageBuilder::new(identity(id, version))
        .dependency_group(DependencyGroup::new(None, dependencies))
        .build()
        .unwrap()
}

fn gateway(packages: Vec<Vec<u8>>) -> SourceGateway {
    let source = InMemorySource::new("feed");
    for bytes in packages {
        source.add(bytes).unwrap();
    }
    SourceGateway::new(vec![Arc::new(source)])
}

fn versions(resolution: &Resolution) -> Vec<String> {
    resolution
        .set
        .iter()
        .map(|identity| identity.to_string())
        .collect()
}

#[test]
fn install_pulls_dependency_at_lowest() -> TestResult {
    let gateway = gateway(vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery", "1.6.4", vec![]),
        package("jQuery.Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Lowest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let resolution = resolver.resolve(
        &[ResolutionTarget::Identity(identity("jQuery.Validation", "1.13.1"))],
        &[],
    )?;
    assert_eq!(
        versions(&resolution),
        vec!["jQuery/1.4.4", "jQuery.Validation/1.13.1"],
    );
    Ok(())
}

#[test]
fn update_coerces_dependency_with_highest() -> TestResult {
    let gateway = gateway(vec![
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
    let context = ResolutionContext::new(DependencyBehavior::Highest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![
        InstalledPackage::new(identity("a", "1.0.0")),
        InstalledPackage::new(identity("b", "1.0.0")),
        InstalledPackage::new(identity("c", "2.0.0")),
    ];
    let resolution = resolver.resolve(
        &[
            ResolutionTarget::Identity(identity("b", "2.0.0")),
            ResolutionTarget::Identity(identity("c", "3.0.0")),
        ],
        &installed,
    )?;
    assert_eq!(versions(&resolution), vec!["a/2.0.0", "b/2.0.0", "c/3.0.0"]);
    Ok(())
}

#[test]
fn latest_target_expansion_honors_prerelease_policy() -> TestResult {
    let gateway = gateway(vec![
        package("a", "1.0.0", vec![]),
        package("a", "2.0.0-beta.1", vec![]),
    ]);
    let id = PackageId::from_str("a")?;

    let stable = ResolutionContext::new(DependencyBehavior::Lowest);
    let resolver = Resolver::new(&gateway, &stable, FrameworkName::ANY);
    let resolution = resolver.resolve(&[ResolutionTarget::Latest(id.clone())], &[])?;
    assert_eq!(versions(&resolution), vec!["a/1.0.0"]);

    let prerelease = ResolutionContext::new(DependencyBehavior::Lowest).with_prerelease(true);
    let resolver = Resolver::new(&gateway, &prerelease, FrameworkName::ANY);
    let resolution = resolver.resolve(&[ResolutionTarget::Latest(id)], &[])?;
    assert_eq!(versions(&resolution), vec!["a/2.0.0-beta.1"]);
    Ok(())
}

#[test]
fn parent_is_upgraded_to_lowest_admitting_version() -> TestResult {
    let gateway = gateway(vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery", "1.6.4", vec![]),
        package("Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
        package("Validation", "1.14.0", vec![("jQuery", "[1.6.4]")]),
        package("Validation", "1.15.0", vec![("jQuery", "[1.6.4]")]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Highest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![
        InstalledPackage::new(identity("jQuery", "1.4.4")),
        InstalledPackage::new(identity("Validation", "1.13.1")),
    ];
    let resolution = resolver.resolve(
        &[ResolutionTarget::Identity(identity("jQuery", "1.6.4"))],
        &installed,
    )?;
    // the parent moves to the lowest version admitting the new child
    assert_eq!(
        versions(&resolution),
        vec!["jQuery/1.6.4", "Validation/1.14.0"],
    );
    Ok(())
}

#[test]
fn parent_without_admitting_version_is_a_conflict() -> TestResult {
    let gateway = gateway(vec![
        package("jQuery", "1.4.4", vec![]),
        package("jQuery", "1.6.4", vec![]),
        package("Validation", "1.13.1", vec![("jQuery", "[1.4.4]")]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Highest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![
        InstalledPackage::new(identity("jQuery", "1.4.4")),
        InstalledPackage::new(identity("Validation", "1.13.1")),
    ];
    let result = resolver.resolve(
        &[ResolutionTarget::Identity(identity("jQuery", "1.6.4"))],
        &installed,
    );
    assert!(matches!(result, Err(Error::DependencyConflict { .. })));
    Ok(())
}

#[test]
fn conflicting_exact_requirements_fail() -> TestResult {
    let gateway = gateway(vec![
        package("shared", "1.0.0", vec![]),
        package("shared", "2.0.0", vec![]),
        package("left", "1.0.0", vec![("shared", "[1.0.0]")]),
        package("right", "1.0.0", vec![("shared", "[2.0.0]")]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Lowest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let result = resolver.resolve(
        &[
            ResolutionTarget::Identity(identity("left", "1.0.0")),
            ResolutionTarget::Identity(identity("right", "1.0.0")),
        ],
        &[],
    );
    let error = result.expect_err("exact requirements cannot both hold");
    match error {
        Error::DependencyConflict { id, details } => {
            assert_eq!(id, PackageId::from_str("shared")?);
            assert!(details.contains("left"));
            assert!(details.contains("right"));
        }
        other => panic!("expected a dependency conflict, got {other}"),
    }
    Ok(())
}

#[test]
fn missing_dependency_of_untouched_package_is_ignored() -> TestResult {
    // `d` depends on `e`, which was force-uninstalled earlier and is not in
    // any source; installing an unrelated package must not try to repair it
    let gateway = gateway(vec![
        package("a", "1.0.0", vec![]),
        package("b", "1.0.0", vec![("a", "[1.0.0]")]),
        package("c", "2.0.0", vec![]),
        package("d", "2.0.0", vec![("e", "[1.0.0]")]),
        package("f", "3.0.0", vec![]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Lowest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![
        InstalledPackage::new(identity("a", "1.0.0")),
        InstalledPackage::new(identity("b", "1.0.0")),
        InstalledPackage::new(identity("c", "2.0.0")),
        InstalledPackage::new(identity("d", "2.0.0")),
    ];
    let resolution = resolver.resolve(
        &[ResolutionTarget::Identity(identity("f", "3.0.0"))],
        &installed,
    )?;
    assert_eq!(
        versions(&resolution),
        vec!["a/1.0.0", "b/1.0.0", "c/2.0.0", "d/2.0.0", "f/3.0.0"],
    );
    Ok(())
}

#[test]
fn ignore_behavior_skips_dependency_expansion() -> TestResult {
    let gateway = gateway(vec![
        package("parent", "1.0.0", vec![("child", "[1.0.0]")]),
        package("child", "1.0.0", vec![]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Ignore);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let resolution = resolver.resolve(
        &[ResolutionTarget::Identity(identity("parent", "1.0.0"))],
        &[],
    )?;
    assert_eq!(versions(&resolution), vec!["parent/1.0.0"]);
    Ok(())
}

#[rstest]
#[case(DependencyBehavior::Lowest, "1.5.1")]
#[case(DependencyBehavior::HighestPatch, "1.5.2")]
#[case(DependencyBehavior::HighestMinor, "1.9.0")]
#[case(DependencyBehavior::Highest, "2.2.0")]
fn behavior_governs_dependency_choice(
    #[case] behavior: DependencyBehavior,
    #[case] expected: &str,
) -> TestResult {
    // the requirement excludes the installed 1.5.0, forcing a re-pick; the
    // installed version stays the basis for the patch/minor behaviors
    let gateway = gateway(vec![
        package("dep", "1.5.0", vec![]),
        package("dep", "1.5.1", vec![]),
        package("dep", "1.5.2", vec![]),
        package("dep", "1.9.0", vec![]),
        package("dep", "2.2.0", vec![]),
        package("root", "1.0.0", vec![("dep", "(1.5.0,)")]),
    ]);
    let context = ResolutionContext::new(behavior);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![InstalledPackage::new(identity("dep", "1.5.0"))];
    let targets = vec![ResolutionTarget::Identity(identity("root", "1.0.0"))];

    let resolution = resolver.resolve(&targets, &installed)?;
    let dep = resolution
        .version_of(&PackageId::from_str("dep")?)
        .expect("dep is in the set");
    assert_eq!(dep.version, Version::from_str(expected)?);
    Ok(())
}

#[test]
fn allowed_versions_lock_bounds_the_choice() -> TestResult {
    // the requirement forces a re-pick; the lock keeps 2.0.0 out of reach
    let gateway = gateway(vec![
        package("dep", "1.0.0", vec![]),
        package("dep", "1.5.0", vec![]),
        package("dep", "2.0.0", vec![]),
        package("root", "1.0.0", vec![("dep", "(1.0.0,)")]),
    ]);
    let context = ResolutionContext::new(DependencyBehavior::Highest);
    let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);

    let installed = vec![InstalledPackage::with_lock(
        identity("dep", "1.0.0"),
        VersionRange::from_str("[1.0,2.0)")?,
    )];
    let resolution = resolver.resolve(
        &[ResolutionTarget::Identity(identity("root", "1.0.0"))],
        &installed,
    )?;
    let dep = resolution
        .version_of(&PackageId::from_str("dep")?)
        .expect("dep is in the set");
    assert_eq!(dep.version, Version::from_str("1.5.0")?);
    Ok(())
}

#[test]
fn resolution_is_deterministic() -> TestResult {
    let packages = || {
        vec![
            package("a", "1.0.0", vec![("b", "1.0.0"), ("c", "1.0.0")]),
            package("b", "1.0.0", vec![("d", "1.0.0")]),
            package("b", "1.1.0", vec![("d", "1.0.0")]),
            package("c", "1.0.0", vec![("d", "1.0.0")]),
            package("d", "1.0.0", vec![]),
            package("d", "1.2.0", vec![]),
        ]
    };
    let run = || -> Result<Vec<String>, Error> {
        let gateway = gateway(packages());
        let context = ResolutionContext::new(DependencyBehavior::Lowest);
        let resolver = Resolver::new(&gateway, &context, FrameworkName::ANY);
        let resolution = resolver.resolve(
            &[ResolutionTarget::Identity(identity("a", "1.0.0"))],
            &[],
        )?;
        Ok(versions(&resolution))
    };

    let first = run()?;
    for _ in 0..5 {
        assert_eq!(run()?, first);
    }
    Ok(())
}
