//! x86_64 system call entry point

#![allow(function_casts_as_integer)]

use crate::syscall::syscall_handler;

/// x86_64 SYSCALL instruction entry point
///
/// Handles the transition from user mode to kernel mode when a SYSCALL
/// instruction is executed. Switches to the kernel stack, builds a
/// `SyscallFrame` (syscall number plus all six argument registers) on it,
/// and calls [`syscall_handler`] with a pointer to that frame. Individual
/// user-memory accesses are SMAP-gated (`stac`/`clac`) inside the handlers
/// themselves (see `syscall::userspace`), keeping the unsafe window as
/// narrow as possible rather than spanning the whole trampoline.
///
/// # Safety
/// This function must only be called by the CPU's SYSCALL instruction.
/// It expects specific register states as defined by the x86_64 ABI.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn syscall_entry() {
    core::arch::naked_asm!(
        // Save user context on kernel stack
        "swapgs",                    // Switch to kernel GS
        "mov gs:[0x8], rsp",        // Save user RSP in per-CPU data
        "mov rsp, gs:[0x0]",        // Load kernel RSP from per-CPU data

        // Save callee-saved registers we'll need to restore before sysretq
        "push rcx",                  // User RIP
        "push r11",                  // User RFLAGS
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",

        // Build a SyscallFrame { num: usize, args: [usize; 6] } on the
        // stack. Pushes land at decreasing addresses, so pushing the
        // fields in reverse order leaves them laid out low-to-high as
        // [num, arg1, arg2, arg3, arg4, arg5, arg6] with rsp pointing at
        // num.
        // rax = syscall number
        // rdi = arg1, rsi = arg2, rdx = arg3
        // r10 = arg4, r8 = arg5, r9 = arg6
        "push r9",                   // arg6
        "push r8",                   // arg5
        "push r10",                  // arg4 (r10, not rcx: the SYSCALL
                                      // instruction clobbers rcx/r11 with
                                      // the user return address/flags)
        "push rdx",                  // arg3
        "push rsi",                  // arg2
        "push rdi",                  // arg1
        "push rax",                  // syscall number

        "mov rdi, rsp",              // &SyscallFrame
        "call {handler}",
        "add rsp, 56",               // pop the SyscallFrame (7 * 8 bytes)

        // Restore registers
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "pop r11",                   // User RFLAGS
        "pop rcx",                   // User RIP

        // Restore user stack and return
        "mov rsp, gs:[0x8]",        // Restore user RSP
        "swapgs",                    // Switch back to user GS
        "sysretq",

        handler = sym syscall_handler
    );
}

/// Initialize SYSCALL/SYSRET support
#[allow(dead_code)]
pub fn init_syscall() {
    use x86_64::registers::{
        model_specific::{Efer, EferFlags, LStar, Star},
        segmentation::SegmentSelector,
    };

    unsafe {
        // Enable SYSCALL/SYSRET
        Efer::update(|flags| {
            flags.insert(EferFlags::SYSTEM_CALL_EXTENSIONS);
        });

        // Set up SYSCALL entry point
        LStar::write(x86_64::VirtAddr::new(syscall_entry as usize as u64));

        // Set up segment selectors
        // Star::write takes 4 arguments:
        // 1. User CS (for SYSRET)
        // 2. User SS (for SYSRET)
        // 3. Kernel CS (for SYSCALL)
        // 4. Kernel SS (for SYSCALL)
        Star::write(
            SegmentSelector(0x18), // User CS (ring 3)
            SegmentSelector(0x20), // User SS (ring 3)
            SegmentSelector(0x08), // Kernel CS (ring 0)
            SegmentSelector(0x10), // Kernel SS (ring 0)
        )
        .unwrap();
    }
}
