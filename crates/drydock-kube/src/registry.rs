//! Registry settings resolution

use drydock_core::RegistrySettings;

use crate::error::{KubeError, Result};
use crate::storage::RegistryStore;

/// Registry settings configured for an application
///
/// `Ok(None)` means no private registry is configured. A missing application
/// or a failed read is an error.
pub async fn resolve_registry_settings<S: RegistryStore + ?Sized>(
    store: &S,
    app_id: &str,
) -> Result<Option<RegistrySettings>> {
    let row = store
        .registry_row(app_id)
        .await
        .map_err(|e| KubeError::RegistryLookup {
            app_id: app_id.to_string(),
            source: Box::new(e),
        })?;

    Ok(RegistrySettings::from_row(row))
}
