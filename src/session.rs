use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use crate::{
    assembler::{assemble, Assembly, EngineError},
    context::Options,
    provider::SourceProvider,
};

/// Becomes cancelled as soon as its session starts a newer run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    generation: Option<(Arc<AtomicU64>, u64)>,
}

impl CancelToken {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.generation {
            Some((current, mine)) => current.load(Ordering::Acquire) != *mine,
            None => false,
        }
    }
}

/// Latest completed assembly of a document plus the run bookkeeping that
/// guarantees superseded runs are never published.
#[derive(Default)]
pub struct Session {
    generation: Arc<AtomicU64>,
    current: Mutex<Option<Arc<Assembly>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run, cancelling every earlier one.
    pub fn begin(&self) -> CancelToken {
        let _slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let mine = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!("starting run {mine}");
        CancelToken {
            generation: Some((self.generation.clone(), mine)),
        }
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Swaps in `assembly` unless `token` has been superseded.
    pub fn publish(&self, token: &CancelToken, assembly: Assembly) -> bool {
        let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            tracing::trace!("dropping superseded assembly");
            return false;
        }
        *slot = Some(Arc::new(assembly));
        true
    }

    pub fn current(&self) -> Option<Arc<Assembly>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Assembles `path` and publishes the result. A run overtaken by a later
    /// `begin` leaves the previous assembly in place.
    pub fn reparse(
        &self,
        path: &Path,
        provider: &dyn SourceProvider,
        options: Options,
    ) -> Result<Option<Arc<Assembly>>, EngineError> {
        let token = self.begin();
        match assemble(path, provider, options, &token) {
            Ok(assembly) => {
                if self.publish(&token, assembly) {
                    Ok(self.current())
                } else {
                    Ok(None)
                }
            }
            Err(EngineError::Cancelled(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    #[test]
    fn newer_run_cancels_older() {
        let session = Session::new();
        let first = session.begin();
        assert!(!first.is_cancelled());
        let second = session.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn stale_results_are_not_published() {
        let provider = MemoryProvider::new().with_file("a.asm", "ORG &2000\nRTS\n");
        let session = Session::new();
        let stale = session.begin();
        let assembly = assemble(Path::new("a.asm"), &provider, Options::default(), &stale)
            .expect("assembles");
        let fresh = session.begin();
        assert!(!session.publish(&stale, assembly));
        assert!(session.current().is_none());

        let assembly = assemble(Path::new("a.asm"), &provider, Options::default(), &fresh)
            .expect("assembles");
        assert!(session.publish(&fresh, assembly));
        assert_eq!(&[0x60], session.current().unwrap().memory(0x2000..0x2001));
    }

    #[test]
    fn cancelled_run_stops_early() {
        let provider = MemoryProvider::new().with_file("a.asm", "RTS\n");
        let session = Session::new();
        let token = session.begin();
        session.cancel();
        assert!(matches!(
            assemble(Path::new("a.asm"), &provider, Options::default(), &token),
            Err(EngineError::Cancelled(_))
        ));
    }

    #[test]
    fn reparse_publishes() {
        let provider = MemoryProvider::new().with_file("a.asm", "ORG &1900\nNOP\n");
        let session = Session::new();
        let assembly = session
            .reparse(Path::new("a.asm"), &provider, Options::default())
            .unwrap()
            .unwrap();
        assert_eq!(&[0xEA], assembly.memory(0x1900..0x1901));
    }
}
