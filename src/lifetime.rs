//! Lifetime controller: ties an OS mapping and its handles to one owner and releases them once.

use log::{trace, warn};

use crate::backing::BackingStore;
use crate::engine::Region;
use crate::errors::{MapError, Result};
use crate::flush::FlushPolicy;
use crate::path::ResolvedPath;

/// Owner of a live region plus any platform handle it depends on.
///
/// `release` unmaps the region and then closes the retained handle. It runs
/// from `Drop` unless called earlier; every call after the first is a no-op.
#[derive(Debug)]
pub(crate) struct Mapping {
    region: Option<Region>,
    retained: Option<BackingStore>,
    path: ResolvedPath,
    policy: FlushPolicy,
}

impl Mapping {
    pub(crate) fn new(
        region: Region,
        retained: Option<BackingStore>,
        path: ResolvedPath,
        policy: FlushPolicy,
    ) -> Self {
        Self {
            region: Some(region),
            retained,
            path,
            policy,
        }
    }

    pub(crate) fn path(&self) -> &ResolvedPath {
        &self.path
    }

    pub(crate) fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub(crate) fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Mapped bytes; empty once released.
    pub(crate) fn bytes(&self) -> &[u8] {
        match self.region.as_ref() {
            Some(region) => region.as_slice(),
            None => &[],
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self.region.as_mut() {
            Some(region) => region.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Unmap and close. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `MapError::FlushFailed` if the `OnRelease` flush fails; the
    /// mapping is released regardless.
    pub(crate) fn release(&mut self) -> Result<()> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        let flushed = match self.policy {
            FlushPolicy::OnRelease => region
                .flush()
                .map_err(|e| MapError::FlushFailed(e.to_string())),
            FlushPolicy::Never | FlushPolicy::Always => Ok(()),
        };
        let len = region.len();
        drop(region);
        drop(self.retained.take());
        trace!(
            "released mapping of {} ({len} bytes)",
            self.path.as_path().display()
        );
        flushed
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(
                "releasing mapping of {}: {err}",
                self.path.as_path().display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memmap2::MmapMut;
    use std::path::PathBuf;

    fn anon_mapping(len: usize, policy: FlushPolicy) -> Mapping {
        let region = Region::from_mmap(MmapMut::map_anon(len).expect("anon"));
        Mapping::new(
            region,
            None,
            ResolvedPath::File(PathBuf::from("/anon")),
            policy,
        )
    }

    #[test]
    fn release_is_idempotent() {
        let mut mapping = anon_mapping(32, FlushPolicy::Never);
        mapping.bytes_mut()[0] = 9;
        assert_eq!(mapping.bytes().len(), 32);
        assert!(mapping.region().is_some());

        mapping.release().expect("first release");
        assert!(mapping.bytes().is_empty());
        assert!(mapping.bytes_mut().is_empty());
        assert!(mapping.region().is_none());

        mapping.release().expect("second release is a no-op");
        drop(mapping);
    }

    #[test]
    fn release_flushes_when_configured() {
        let mut mapping = anon_mapping(64, FlushPolicy::OnRelease);
        mapping.bytes_mut().fill(1);
        mapping.release().expect("flush on release");
        assert_eq!(mapping.policy(), FlushPolicy::OnRelease);
    }
}
