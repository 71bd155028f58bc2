//! Aggregation of multiple package sources.

use std::sync::Arc;

use log::{debug, warn};
use nupm_types::{FrameworkName, PackageId, PackageIdentity, Version};

use crate::{Error, GatherCache, GatherKey, PackageSource, ResolvedDependencyInfo, Source};

/// A composition of package sources in declared priority order.
///
/// Version listings are unioned across sources; dependency info and package
/// bytes come from the first source that carries the identity. A failure of
/// one source is recoverable as long as another source can answer; only when
/// every source fails does the error surface.
#[derive(Clone, Debug)]
pub struct SourceGateway {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceGateway {
    /// Creates a gateway over `sources` in priority order.
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        SourceGateway { sources }
    }

    /// Returns the composed sources.
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Lists all versions of `id` across all sources, sorted and deduped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] if every source failed.
    pub fn list_versions(
        &self,
        id: &PackageId,
        include_unlisted: bool,
    ) -> Result<Vec<Version>, Error> {
        let mut versions: Vec<Version> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for source in &self.sources {
            match source.list_versions(id, include_unlisted) {
                Ok(listed) => versions.extend(listed),
                Err(error) => {
                    warn!("source {} failed listing {id}: {error}", source.package_source());
                    failures.push(format!("{}: {error}", source.package_source()));
                }
            }
        }
        if !self.sources.is_empty() && failures.len() == self.sources.len() {
            return Err(Error::SourceUnavailable {
                context: format!("listing versions of {id}"),
                reasons: failures.join("; "),
            });
        }
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Returns the greatest version of `id` admissible under the given
    /// policy.
    ///
    /// With `include_prerelease` unset only release versions are considered;
    /// there is no fallback to prereleases when no release exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoLatestVersion`] if no version is admissible, or
    /// [`Error::SourceUnavailable`] if every source failed.
    pub fn latest_version(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> Result<Version, Error> {
        let versions = self.list_versions(id, include_unlisted)?;
        versions
            .into_iter()
            .filter(|version| include_prerelease || !version.is_prerelease())
            .max()
            .ok_or_else(|| Error::NoLatestVersion { id: id.clone() })
    }

    /// Returns dependency information for `identity` reduced to `framework`.
    ///
    /// Sources are probed in declared order through the gather cache; the
    /// first hit wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] if no source carries the identity,
    /// or [`Error::SourceUnavailable`] if every source failed.
    pub fn dependency_info(
        &self,
        cache: &GatherCache,
        identity: &PackageIdentity,
        framework: &FrameworkName,
    ) -> Result<ResolvedDependencyInfo, Error> {
        let mut failures: Vec<String> = Vec::new();
        for source in &self.sources {
            let key = GatherKey {
                source_url: source.package_source().url.clone(),
                identity: identity.clone(),
                framework: *framework,
            };
            match cache.get_or_fetch(key, || source.dependency_info(identity, framework)) {
                Ok(Some(info)) => {
                    debug!("{identity} resolved by source {}", source.package_source());
                    return Ok(info);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        "source {} failed resolving {identity}: {error}",
                        source.package_source(),
                    );
                    failures.push(format!("{}: {error}", source.package_source()));
                }
            }
        }
        if !self.sources.is_empty() && failures.len() == self.sources.len() {
            return Err(Error::SourceUnavailable {
                context: format!("resolving {identity}"),
                reasons: failures.join("; "),
            });
        }
        Err(Error::PackageNotFound {
            identity: identity.clone(),
        })
    }

    /// Copies the package bytes for `identity`.
    ///
    /// When `preferred` names one of the composed sources it is probed
    /// first, so an execution fetches from the source the resolver
    /// attributed; the remaining sources serve as fallback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageNotFound`] if no source carries the identity.
    pub fn fetch(
        &self,
        identity: &PackageIdentity,
        preferred: Option<&PackageSource>,
    ) -> Result<(Vec<u8>, PackageSource), Error> {
        let ordered = self.sources.iter().enumerate().map(|(index, source)| {
            let preferred_first =
                preferred.is_some_and(|preferred| source.package_source() == preferred);
            (if preferred_first { 0 } else { index + 1 }, source)
        });
        let mut ordered: Vec<_> = ordered.collect();
        ordered.sort_by_key(|(rank, _)| *rank);

        let mut failures: Vec<String> = Vec::new();
        for (_, source) in ordered {
            match source.copy_bytes(identity) {
                Ok(Some(bytes)) => return Ok((bytes, source.package_source().clone())),
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        "source {} failed fetching {identity}: {error}",
                        source.package_source(),
                    );
                    failures.push(format!("{}: {error}", source.package_source()));
                }
            }
        }
        if !self.sources.is_empty() && failures.len() == self.sources.len() {
            return Err(Error::SourceUnavailable {
                context: format!("fetching {identity}"),
                reasons: failures.join("; "),
            });
        }
        Err(Error::PackageNotFound {
            identity: identity.clone(),
        })
    }
}
