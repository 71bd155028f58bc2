//! Management of the shared `packages/` directory.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex},
};

use log::debug;
use nupm_package::{PackageArchive, README_FILE_NAME};
use nupm_types::{PackageId, PackageIdentity, Version};

use crate::Error;

/// The shared, solution-scoped package store.
///
/// One directory per identity lives under the store root, named
/// `<Id>.<NormalizedVersion>`. Presence of the directory means the identity
/// is restored. The store is shared by every project of a solution; callers
/// decide *whether* to delete (reference counting across projects), the
/// store ensures each add and remove runs under a per-identity mutex.
///
/// ## Examples
/// ```no_run
/// use std::str::FromStr;
///
/// use nupm_store::FolderStore;
/// use nupm_types::{PackageId, PackageIdentity, Version};
///
/// let store = FolderStore::new("/solution/packages");
/// let identity = PackageIdentity::new(
///     PackageId::from_str("jQuery").unwrap(),
///     Version::from_str("1.4.4").unwrap(),
/// );
/// assert!(!store.is_restored(&identity));
/// ```
#[derive(Debug)]
pub struct FolderStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FolderStore {
    /// Creates a store over `root`.
    ///
    /// The directory is created lazily on the first add.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FolderStore {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory an identity occupies in the store.
    pub fn dir_for(&self, identity: &PackageIdentity) -> PathBuf {
        self.root.join(identity.dir_name())
    }

    /// Returns `true` if the identity's directory exists.
    pub fn is_restored(&self, identity: &PackageIdentity) -> bool {
        self.dir_for(identity).is_dir()
    }

    /// Returns the on-disk path of the package's root readme, if restored.
    pub fn readme_path(&self, identity: &PackageIdentity) -> Option<PathBuf> {
        let path = self.dir_for(identity).join(README_FILE_NAME);
        path.is_file().then_some(path)
    }

    /// Materializes a package into the store.
    ///
    /// A no-op if the identity is already restored. The archive is extracted
    /// into a temporary sibling directory which is then renamed into place,
    /// so a half-written directory is never observable under the final name.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or the rename fails.
    pub fn add(&self, archive: &PackageArchive) -> Result<(), Error> {
        let identity = archive.identity();
        let lock = self.lock_for(identity);
        let _guard = lock.lock().expect("store mutex is never poisoned");

        let target = self.dir_for(identity);
        if target.is_dir() {
            debug!("{identity} is already restored");
            return Ok(());
        }

        fs::create_dir_all(&self.root).map_err(|source| Error::IoPath {
            path: self.root.clone(),
            context: "creating the store root",
            source,
        })?;
        let staging = tempfile::tempdir_in(&self.root).map_err(|source| Error::IoPath {
            path: self.root.clone(),
            context: "creating a staging directory",
            source,
        })?;
        archive.extract_to(staging.path())?;
        fs::rename(staging.keep(), &target).map_err(|source| Error::IoPath {
            path: target.clone(),
            context: "moving a staged package into the store",
            source,
        })?;
        debug!("restored {identity} to {target:?}");
        Ok(())
    }

    /// Removes an identity's directory from the store.
    ///
    /// A no-op if the identity is not restored. Callers are responsible for
    /// checking that no other project still references the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn remove(&self, identity: &PackageIdentity) -> Result<(), Error> {
        let lock = self.lock_for(identity);
        let _guard = lock.lock().expect("store mutex is never poisoned");

        let target = self.dir_for(identity);
        if !target.is_dir() {
            return Ok(());
        }
        fs::remove_dir_all(&target).map_err(|source| Error::IoPath {
            path: target.clone(),
            context: "removing a package from the store",
            source,
        })?;
        debug!("removed {identity} from the store");
        Ok(())
    }

    /// Returns every identity with a directory in the store.
    ///
    /// Foreign directories that do not parse as `<Id>.<Version>` are
    /// skipped. The result is sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store root exists but cannot be read.
    pub fn installed(&self) -> Result<Vec<PackageIdentity>, Error> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| Error::IoPath {
            path: self.root.clone(),
            context: "reading the store root",
            source,
        })?;

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::IoPath {
                path: self.root.clone(),
                context: "reading a store entry",
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(identity) = parse_dir_name(name) {
                identities.push(identity);
            }
        }
        identities.sort();
        Ok(identities)
    }

    fn lock_for(&self, identity: &PackageIdentity) -> Arc<Mutex<()>> {
        let key = identity.dir_name().to_ascii_lowercase();
        let mut locks = self.locks.lock().expect("store mutex is never poisoned");
        locks.entry(key).or_default().clone()
    }
}

/// Splits a store directory name back into an identity.
///
/// The id itself may contain dots, so every dot is tried as the separator
/// from left to right; the first suffix that parses as a version wins.
fn parse_dir_name(name: &str) -> Option<PackageIdentity> {
    for (index, _) in name.match_indices('.') {
        let (id, version) = (&name[..index], &name[index + 1..]);
        if id.is_empty() {
            continue;
        }
        if let Ok(version) = Version::from_str(version) {
            let id = PackageId::from_str(id).ok()?;
            return Some(PackageIdentity::new(id, version));
        }
    }
    None
}
