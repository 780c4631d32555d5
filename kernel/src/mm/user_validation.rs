//! User space memory validation utilities
//!
//! Provides functions to validate user space addresses and check page mappings.

use crate::mm::{page_table::PageTableEntry, FrameNumber, PageFlags, VirtualAddress};

/// Check if a user address is valid (within user space range)
pub fn is_user_addr_valid(addr: usize) -> bool {
    // User space is 0x0 - 0x7FFF_FFFF_FFFF (128TB)
    addr < 0x0000_8000_0000_0000
}

/// Translate a virtual address to its page table entry in the current
/// process's own address space.
///
/// Returns None if the address is not mapped.
pub fn translate_address(addr: usize) -> Option<PageTableEntry> {
    let current_process = crate::process::current_process()?;
    let memory_space = current_process.memory_space.lock();
    let pt_root = memory_space.get_page_table();
    if pt_root == 0 {
        return None;
    }

    // SAFETY: `pt_root` is the current process's own L4 root, set by
    // `VirtualAddressSpace::set_page_table` during process creation/exec and
    // identity-mapped in the kernel's physical memory window.
    let mapper = unsafe { super::vas::create_mapper_from_root_pub(pt_root) };
    let (frame, flags) = mapper.translate_page(VirtualAddress::new(addr as u64)).ok()?;

    let mut entry = PageTableEntry::empty();
    entry.set(frame, flags);
    Some(entry)
}

/// Like [`translate_address`] but also reports the frame number, for callers
/// that want the physical frame directly instead of a synthetic entry.
pub fn translate_to_frame(addr: usize) -> Option<(FrameNumber, PageFlags)> {
    let current_process = crate::process::current_process()?;
    let memory_space = current_process.memory_space.lock();
    let pt_root = memory_space.get_page_table();
    if pt_root == 0 {
        return None;
    }

    // SAFETY: same as `translate_address` above.
    let mapper = unsafe { super::vas::create_mapper_from_root_pub(pt_root) };
    mapper.translate_page(VirtualAddress::new(addr as u64)).ok()
}

/// Extension trait for PageTableEntry to check user accessibility
pub trait PageTableEntryExt {
    fn is_user_accessible(&self) -> bool;
}

impl PageTableEntryExt for PageTableEntry {
    fn is_user_accessible(&self) -> bool {
        // Check user bit (bit 2) in flags
        self.flags().contains(PageFlags::USER)
    }
}
