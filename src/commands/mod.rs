mod errors_cmd;
mod queue_cmd;
mod submit_cmd;
mod sync_cmd;

pub use errors_cmd::ErrorsCommand;
pub use queue_cmd::QueueCommand;
pub use submit_cmd::SubmitCommand;
pub use sync_cmd::SyncCommand;

use finsync_core::{Connectivity, FileQueueStore, StoreError, SyncEngine};

use crate::config::Config;
use crate::transport::HttpTransport;

/// Builds an engine wired to the configured API and data directory.
pub(crate) fn build_engine(
    config: &Config,
) -> Result<SyncEngine<HttpTransport, FileQueueStore>, StoreError> {
    let transport = HttpTransport::new(config.api_url.clone(), config.api_key.clone());
    let store = FileQueueStore::in_dir(&config.data_dir);
    SyncEngine::new(transport, store, Connectivity::new(true))
}
