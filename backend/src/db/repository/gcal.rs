//! Smart GCAL mapping table lookups.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{GcalConfig, SearchKey, SmartGcalType};

/// Read-only access to the smart GCAL mapping table.
///
/// The table is bulk loaded and not edited while observations are being
/// expanded, so lookups may run outside any sequence transaction.
#[async_trait]
pub trait GcalMappingRepository: Send + Sync {
    /// Calibration configurations mapped to `key` for the given recipe.
    ///
    /// # Returns
    /// * `Ok(Vec<GcalConfig>)` - Matching configurations in table order (possibly empty)
    /// * `Err(RepositoryError)` - If the lookup fails
    async fn select_gcal(
        &self,
        key: &SearchKey,
        smart_gcal_type: SmartGcalType,
    ) -> RepositoryResult<Vec<GcalConfig>>;
}
