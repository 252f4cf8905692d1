//! Rewriting the permission bits of a single mapping.

use core::fmt;

use paging::{AddressSpace, PermissionSet, PhysicalAddress, VirtualAddress};

use crate::{MonitorError, codec};

/// The mapping as it stands after a successful [`setperm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPermOutcome {
    pub virt: VirtualAddress,
    /// Physical address of the byte at `virt`.
    pub phys: PhysicalAddress,
    pub permissions: PermissionSet,
}

impl fmt::Display for SetPermOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "New mapping = VA: {}, PA: {}, perm: {:#05x} ({}).",
            self.virt,
            self.phys,
            self.permissions.bits(),
            codec::PermissionString::from(self.permissions)
        )
    }
}

/// Replaces the attribute bits of the mapping that covers `virt`.
///
/// `permissions` is a permission string as accepted by [`codec::decode`]. Present is
/// always kept, a superpage stays a superpage, and a 4 KiB mapping never gains the
/// superpage bit. The frame address is left alone. Nothing is written unless the string
/// parses and the mapping exists.
///
/// The TLB is not flushed; the new attributes may only take effect once the stale
/// entry is evicted or the address space is reloaded.
///
/// # Errors
/// - [`MonitorError::InvalidPermissionToken`] if the string does not parse.
/// - [`MonitorError::NoSuchMapping`] if `virt` has no present mapping.
pub fn setperm(
    space: &mut AddressSpace,
    virt: VirtualAddress,
    permissions: &str,
) -> Result<SetPermOutcome, MonitorError> {
    let requested = codec::decode(permissions)?;

    if let Some(frame) = space.directory_entry(virt).large_frame() {
        // SAFETY: Only attribute bits change; the superpage keeps its frame and stays
        // present. Rewriting them on request is the operator's call.
        let entry = unsafe {
            space.update_directory_entry(virt, |entry| {
                entry.set_superpage_permissions(requested)
            })
        };
        let outcome = SetPermOutcome {
            virt,
            phys: frame + virt.large_page_offset(),
            permissions: entry.permissions(),
        };
        log::debug!("setperm {}: superpage now {:?}", virt, outcome.permissions);
        return Ok(outcome);
    }

    let frame = space
        .leaf_entry(virt)
        .and_then(|leaf| leaf.frame())
        .ok_or(MonitorError::NoSuchMapping { va: virt })?;

    // SAFETY: As above, for a present 4 KiB mapping.
    let entry = unsafe {
        space.update_leaf_entry(virt, |entry| entry.set_permissions(requested))
    }
    .ok_or(MonitorError::NoSuchMapping { va: virt })?;

    let outcome = SetPermOutcome {
        virt,
        phys: frame + virt.page_offset(),
        permissions: entry.permissions(),
    };
    log::debug!("setperm {}: page now {:?}", virt, outcome.permissions);
    Ok(outcome)
}
