//! Memory management subsystem
//!
//! Owns physical frame allocation, per-address-space page tables, demand
//! paging / copy-on-write, the kernel heap, and user pointer validation.

#![allow(dead_code)]

use core::sync::atomic::{AtomicU64, Ordering};

pub mod demand_paging;
pub mod frame_allocator;
pub mod heap;
pub mod page_fault;
pub mod page_table;
pub mod user_validation;
pub mod vas;

pub use demand_paging::DemandPagingManager;
pub use frame_allocator::{
    FrameAllocator, FrameAllocatorError, FrameNumber, PhysicalAddress, PhysicalFrame,
    FRAME_ALLOCATOR, FRAME_SIZE,
};
pub use page_fault::{handle_page_fault as handle_page_fault_info, PageFaultInfo, PageFaultReason};
pub use user_validation::{is_user_addr_valid, translate_address};
pub use vas::{MappingType, VirtualAddressSpace, VirtualMapping};

/// Standard 4 KiB page size. All allocator and page-table arithmetic in this
/// subsystem works in units of this constant; large/huge pages are expressed
/// as multiples of it via [`PageSize`].
pub const PAGE_SIZE: usize = 4096;

/// Virtual memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualAddress(pub u64);

impl VirtualAddress {
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub fn add(&self, offset: usize) -> Self {
        Self(self.0 + offset as u64)
    }
}

/// Page size options
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// 4 KiB pages
    Small = 4096,
    /// 2 MiB pages (x86_64) / 2 MiB (AArch64)
    Large = 2 * 1024 * 1024,
    /// 1 GiB pages (x86_64) / 1 GiB (AArch64)
    Huge = 1024 * 1024 * 1024,
}

/// Page table / mapping flags.
///
/// Mirrors the x86_64 PTE bit layout directly so [`page_table`] can build
/// entries with a plain OR of the raw value; `contains` is a bitwise test
/// against the same representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageFlags(u64);

impl PageFlags {
    pub const PRESENT: Self = Self(1 << 0);
    pub const WRITABLE: Self = Self(1 << 1);
    pub const USER: Self = Self(1 << 2);
    pub const WRITE_THROUGH: Self = Self(1 << 3);
    pub const NO_CACHE: Self = Self(1 << 4);
    pub const ACCESSED: Self = Self(1 << 5);
    pub const DIRTY: Self = Self(1 << 6);
    pub const HUGE: Self = Self(1 << 7);
    pub const GLOBAL: Self = Self(1 << 8);
    pub const NO_EXECUTE: Self = Self(1 << 63);

    /// Wrap a raw PTE bit pattern (used by [`page_table`] when decoding an
    /// existing entry).
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bit pattern, for storing into a page table entry.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// True if every bit set in `other` is also set in `self`.
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for PageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for PageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for PageFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl core::ops::Not for PageFlags {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

/// Offset between physical memory and its mapping in the kernel's direct
/// physical-memory window. Set once during early boot by [`init`] from the
/// bootloader's physical memory offset, before any other CPU is started.
pub static PHYS_MEM_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Physical address of the kernel's own L4 page table root, captured once at
/// boot from CR3 (the bootloader leaves paging already enabled). Used by
/// kernel-only threads (e.g. per-CPU idle tasks) that have no process or
/// `VirtualAddressSpace` of their own.
static KERNEL_PAGE_TABLE: AtomicU64 = AtomicU64::new(0);

/// Physical address of the kernel page table root, as captured by [`init`].
pub fn get_kernel_page_table() -> usize {
    KERNEL_PAGE_TABLE.load(Ordering::Relaxed) as usize
}

/// Translate a physical address into the kernel's direct-mapped virtual
/// address for it. Used whenever the kernel needs to read or write physical
/// memory directly (zeroing frames, walking page tables, copying COW pages).
pub fn phys_to_virt_addr(phys: u64) -> usize {
    (PHYS_MEM_OFFSET.load(Ordering::Relaxed) + phys) as usize
}

/// Free a physical frame, honoring any outstanding copy-on-write reference
/// count. Call sites that used to call `FRAME_ALLOCATOR.lock().free_frames`
/// directly on a frame that might be CoW-shared must go through this
/// instead, or a forked child and its parent will double-free the frame.
pub fn free_frame_checked(frame: FrameNumber) {
    if frame_allocator::drop_shared_ref(frame) {
        let _ = FRAME_ALLOCATOR.lock().free_frames(frame, 1);
    }
}

/// Initialize memory management.
///
/// `phys_mem_offset` is the virtual offset at which the bootloader (or early
/// boot code) has identity-mapped all of physical memory; it must be set
/// before any code calls [`phys_to_virt_addr`].
pub fn init(phys_mem_offset: u64) {
    println!("[MM] Initializing memory management...");

    PHYS_MEM_OFFSET.store(phys_mem_offset, Ordering::Relaxed);

    #[cfg(target_arch = "x86_64")]
    KERNEL_PAGE_TABLE.store(
        crate::arch::x86_64::mmu::read_cr3().as_u64(),
        Ordering::Relaxed,
    );

    heap::init();

    println!("[MM] Memory management initialized");
}
