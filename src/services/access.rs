//! Device permission checks

use crate::db::schemas::{DeviceDoc, OwnerType};
use crate::store::DirectoryStore;
use crate::types::Result;

/// Role that may do anything to any device
pub const ADMINISTRATOR: &str = "Administrator";

/// Permission name for read-only access
pub const READ: &str = "read";

/// Whether `user` may perform `op` on `device`.
///
/// Private owners and members of the owning company group hold every
/// permission. Share group members may only read.
pub async fn has_permission(
    directory: &dyn DirectoryStore,
    device: &DeviceDoc,
    user: &str,
    op: &str,
) -> Result<bool> {
    if user == ADMINISTRATOR || device.is_owned_by(OwnerType::User, user) {
        return Ok(true);
    }

    if let (Some(OwnerType::CompanyGroup), Some(group)) =
        (device.owner_type, device.owner_id.as_deref())
    {
        let member = directory
            .list_user_groups(user)
            .await?
            .iter()
            .any(|g| g.name == group);
        if member {
            return Ok(true);
        }
    }

    if op != READ {
        return Ok(false);
    }
    Ok(directory
        .share_groups_for_user(user)
        .await?
        .iter()
        .any(|g| g.devices.iter().any(|sn| sn == &device.sn)))
}
