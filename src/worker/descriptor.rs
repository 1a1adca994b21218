//! Result descriptor merging.

use std::sync::Arc;

use tracing::debug;

use crate::error::DescriptorError;
use crate::model::{ResultDescriptor, ResultId, StoredResult};
use crate::store::Store;

/// Folds observed shape/dtype into stored result descriptors.
///
/// Read-modify-write without compare-and-swap: two first writers racing on
/// an unset `base_name` or `chunk` both win, last write sticks.
#[derive(Clone)]
pub struct DescriptorMerger {
    store: Arc<dyn Store>,
}

impl DescriptorMerger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Merge into the stored descriptor of `result_id` and persist it.
    /// Returns the descriptor as written.
    pub async fn merge(
        &self,
        result_id: ResultId,
        shape: &[u64],
        dtype: &str,
        source: &ResultDescriptor,
    ) -> Result<ResultDescriptor, DescriptorError> {
        let mut metadata = match self.store.get_result(result_id).await? {
            StoredResult::Single(metadata) => metadata,
            StoredResult::Collection(_) => {
                return Err(DescriptorError::InvalidOperation { result_id });
            }
        };

        metadata.descriptor.merge_observed(shape, dtype, source);
        self.store.update_result(result_id, &metadata).await?;

        debug!(
            result_id,
            shape = ?metadata.descriptor.shape,
            chunk = ?metadata.descriptor.chunk,
            dtype = ?metadata.descriptor.dtype,
            "Result descriptor merged"
        );
        Ok(metadata.descriptor)
    }
}
