use serde::{Deserialize, Serialize};

use crate::store::MasterRepository;

/// Versioning policy of a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryPolicy {
    /// Hosts released, versioned artifacts.
    Release,
    /// Hosts in-development builds that are expected to change.
    Snapshot,
    Mixed,
}

/// Whether a repository accepts writes to already published paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Artifacts may be deployed and redeployed.
    AllowWrite,
    /// Artifacts may be deployed once, never overwritten.
    AllowWriteOnce,
    ReadOnly,
}

/// Whether cached copies of `master`'s archives must be checked against it on every hit.
///
/// Only a release repository that allows redeploying published artifacts can change an
/// archive behind the cache. Snapshot repositories and write-once releases are trusted to
/// never change a path once it has been cached. The answer is derived from the master's
/// current configuration on each call, since administrators may change it at runtime.
pub fn release_redeploy_enabled(master: &dyn MasterRepository) -> bool {
    redeploy_allowed(master.repository_policy(), master.write_policy())
}

pub fn redeploy_allowed(repository: Option<RepositoryPolicy>, write: WritePolicy) -> bool {
    repository == Some(RepositoryPolicy::Release) && write == WritePolicy::AllowWrite
}
