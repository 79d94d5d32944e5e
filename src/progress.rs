//! Progress reporting for batch runs

use std::path::Path;

use crate::batch::DocumentResult;

/// Receives progress events while a batch runs
///
/// Events for one document arrive in order. In parallel mode events from
/// different documents interleave, so implementations must be `Sync`.
pub trait ProgressObserver: Sync {
    /// A document is about to be opened
    fn document_started(&self, _index: usize, _path: &Path) {}

    /// A page of a document was rendered and written
    fn page_done(&self, _index: usize, _page: usize, _total_pages: usize) {}

    /// A document finished, successfully or not
    fn document_finished(&self, _index: usize, _result: &DocumentResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
