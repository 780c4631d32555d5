//! System call interface
//!
//! Dispatches the Linux x86-64 syscall numbering convention so userspace
//! programs built against a standard sysroot run unmodified. Arguments
//! arrive in `rdi, rsi, rdx, r10, r8, r9` per the kernel entry glue in
//! `arch::x86_64::syscall`; this module only sees them bundled into a
//! [`SyscallFrame`].

#![allow(dead_code)]

pub mod arch_prctl;
pub mod debug;
pub mod filesystem;
pub mod futex;
pub mod info;
pub mod memory;
pub mod process;
pub mod pty;
pub mod signal;
pub mod thread_clone;
pub mod time;
pub mod userspace;

use self::{
    arch_prctl::sys_arch_prctl,
    debug::sys_ptrace,
    filesystem::{
        sys_close, sys_dup, sys_dup2, sys_mkdir, sys_mount, sys_open, sys_pipe, sys_read,
        sys_rmdir, sys_seek, sys_stat, sys_sync, sys_truncate, sys_unmount, sys_write,
    },
    futex::sys_futex_dispatch,
    info::{sys_get_kernel_info, sys_uname},
    memory::{sys_brk, sys_mmap, sys_mprotect, sys_munmap},
    process::{
        sys_exec, sys_exit, sys_fork, sys_getpid, sys_getppid, sys_gettid, sys_setpriority,
        sys_thread_getaffinity, sys_thread_join, sys_thread_setaffinity, sys_wait,
    },
    pty::{handle_pty_ioctl, sys_grantpt, sys_openpty, sys_ptsname, sys_unlockpt},
    signal::{sys_sigaction, sys_sigprocmask, sys_sigreturn, sys_sigsuspend},
    thread_clone::sys_thread_clone,
    time::{sys_time_cancel_timer, sys_time_create_timer, sys_time_get_uptime},
    userspace::validate_user_ptr,
};

/// Linux x86-64 syscall numbers this kernel implements.
///
/// Userspace is built against a Linux-compatible sysroot, so the dispatcher
/// accepts the real `syscall(2)` numbering rather than an OS-specific one.
/// Unlisted numbers fall through to [`SyscallError::InvalidSyscall`].
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read = 0,
    Write = 1,
    Open = 2,
    Close = 3,
    Fstat = 5,
    Lseek = 8,
    Mmap = 9,
    Mprotect = 10,
    Munmap = 11,
    Brk = 12,
    Sigaction = 13,
    Sigprocmask = 14,
    Sigreturn = 15,
    Ioctl = 16,
    Pipe = 22,
    SchedYield = 24,
    Dup = 32,
    Dup2 = 33,
    Pause = 34,
    Getpid = 39,
    Clone = 56,
    Fork = 57,
    Execve = 59,
    Exit = 60,
    Wait4 = 61,
    Rmdir = 84,
    Mkdir = 83,
    Uname = 63,
    Truncate = 76,
    Sync = 162,
    Getppid = 110,
    Sigsuspend = 130,
    Gettid = 186,
    Futex = 202,
    SetPriority = 140,
    ArchPrctl = 158,
    Mount = 165,
    Umount2 = 166,
    Ptrace = 101,
    ExitGroup = 231,
    ThreadJoin = 1000,
    ThreadSetAffinity = 1001,
    ThreadGetAffinity = 1002,
    GetKernelInfo = 1003,
    TimeCreateTimer = 1004,
    TimeCancelTimer = 1005,
    TimeGetUptime = 1006,
    /// Legacy PTY syscalls (pre-/dev/ptmx model), kept until the devfs PTY
    /// rework lands.
    OpenPty = 280,
    GrantPty = 281,
    UnlockPty = 282,
    PtsName = 283,
}

impl TryFrom<usize> for Syscall {
    type Error = ();

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        use Syscall::*;
        Ok(match value {
            0 => Read,
            1 => Write,
            2 => Open,
            3 => Close,
            5 => Fstat,
            8 => Lseek,
            9 => Mmap,
            10 => Mprotect,
            11 => Munmap,
            12 => Brk,
            13 => Sigaction,
            14 => Sigprocmask,
            15 => Sigreturn,
            16 => Ioctl,
            22 => Pipe,
            24 => SchedYield,
            32 => Dup,
            33 => Dup2,
            34 => Pause,
            39 => Getpid,
            56 => Clone,
            57 => Fork,
            59 => Execve,
            60 => Exit,
            61 => Wait4,
            63 => Uname,
            76 => Truncate,
            83 => Mkdir,
            84 => Rmdir,
            101 => Ptrace,
            110 => Getppid,
            130 => Sigsuspend,
            140 => SetPriority,
            158 => ArchPrctl,
            162 => Sync,
            165 => Mount,
            166 => Umount2,
            186 => Gettid,
            202 => Futex,
            231 => ExitGroup,
            280 => OpenPty,
            281 => GrantPty,
            282 => UnlockPty,
            283 => PtsName,
            1000 => ThreadJoin,
            1001 => ThreadSetAffinity,
            1002 => ThreadGetAffinity,
            1003 => GetKernelInfo,
            1004 => TimeCreateTimer,
            1005 => TimeCancelTimer,
            1006 => TimeGetUptime,
            _ => return Err(()),
        })
    }
}

/// System call result type. `Ok` carries the raw return value; negative
/// values never appear here, they are produced by [`SyscallError::to_errno`]
/// at the dispatcher boundary.
pub type SyscallResult = Result<usize, SyscallError>;

/// System call error codes, mapped to negated POSIX errno values on return
/// to userspace via [`SyscallError::to_errno`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall,
    InvalidArgument,
    InvalidPointer,
    InvalidState,
    PermissionDenied,
    ResourceNotFound,
    ProcessNotFound,
    BadFileDescriptor,
    OutOfMemory,
    WouldBlock,
    Interrupted,
    NotATerminal,
}

impl SyscallError {
    /// Negated errno value, the form the `syscall(2)` ABI returns on error.
    pub fn to_errno(self) -> isize {
        let errno: i32 = match self {
            SyscallError::InvalidSyscall => 38,   // ENOSYS
            SyscallError::InvalidArgument => 22,  // EINVAL
            SyscallError::InvalidPointer => 14,   // EFAULT
            SyscallError::InvalidState => 22,     // EINVAL
            SyscallError::PermissionDenied => 13, // EACCES
            SyscallError::ResourceNotFound => 2,  // ENOENT
            SyscallError::ProcessNotFound => 10,  // ECHILD
            SyscallError::BadFileDescriptor => 9, // EBADF
            SyscallError::OutOfMemory => 12,      // ENOMEM
            SyscallError::WouldBlock => 11,       // EAGAIN
            SyscallError::Interrupted => 4,       // EINTR
            SyscallError::NotATerminal => 25,     // ENOTTY
        };
        -(errno as isize)
    }
}

/// Arguments bundled by the kernel stack entry glue. The six registers are
/// `rdi, rsi, rdx, r10, r8, r9` per the `syscall(2)` ABI (not `rcx`, which the
/// `syscall` instruction itself clobbers with the user return address).
#[repr(C)]
pub struct SyscallFrame {
    pub num: usize,
    pub args: [usize; 6],
}

/// System call handler entry point, called from the kernel stack set up by
/// `arch::x86_64::syscall::syscall_entry`.
///
/// # Safety
/// `frame` must point to a valid, fully-initialized [`SyscallFrame`] built by
/// the architecture's syscall entry trampoline.
#[no_mangle]
pub unsafe extern "C" fn syscall_handler(frame: *const SyscallFrame) -> isize {
    let frame = &*frame;
    let [a1, a2, a3, a4, a5, a6] = frame.args;

    let result = match Syscall::try_from(frame.num) {
        Ok(syscall) => handle_syscall(syscall, a1, a2, a3, a4, a5, a6),
        Err(_) => Err(SyscallError::InvalidSyscall),
    };

    match result {
        Ok(value) => value as isize,
        Err(error) => error.to_errno(),
    }
}

/// Dispatch a decoded syscall to its handler.
fn handle_syscall(
    syscall: Syscall,
    a1: usize,
    a2: usize,
    a3: usize,
    a4: usize,
    a5: usize,
    a6: usize,
) -> SyscallResult {
    let _ = a6; // reserved for syscalls needing a 6th argument in the future
    match syscall {
        Syscall::Read => sys_read(a1, a2, a3),
        Syscall::Write => sys_write(a1, a2, a3),
        Syscall::Open => sys_open(a1, a2, a3),
        Syscall::Close => sys_close(a1),
        Syscall::Fstat => sys_stat(a1, a2),
        Syscall::Lseek => sys_seek(a1, a2 as isize, a3),
        Syscall::Mmap => sys_mmap(a1, a2, a3, a4, a5),
        Syscall::Mprotect => sys_mprotect(a1, a2, a3),
        Syscall::Munmap => sys_munmap(a1, a2),
        Syscall::Brk => sys_brk(a1),
        Syscall::Sigaction => sys_sigaction(a1, a2, a3),
        Syscall::Sigprocmask => sys_sigprocmask(a1, a2, a3),
        Syscall::Sigreturn => sys_sigreturn(a1),
        Syscall::Ioctl => match handle_pty_ioctl(a1, a2, a3) {
            Some(result) => result,
            None => Err(SyscallError::InvalidArgument),
        },
        Syscall::Pipe => sys_pipe(a1),
        Syscall::SchedYield => sys_yield(),
        Syscall::Dup => sys_dup(a1),
        Syscall::Dup2 => sys_dup2(a1, a2),
        Syscall::Pause => sys_sigsuspend(0),
        Syscall::Getpid => sys_getpid(),
        Syscall::Clone => sys_thread_clone(a1, a2, a3, a4, a5),
        Syscall::Fork => sys_fork(),
        Syscall::Execve => sys_exec(a1, a2, a3),
        Syscall::Exit => sys_exit(a1),
        Syscall::ExitGroup => sys_exit(a1),
        Syscall::Wait4 => sys_wait(a1 as isize, a2, a3),
        Syscall::Mkdir => sys_mkdir(a1, a2),
        Syscall::Rmdir => sys_rmdir(a1),
        Syscall::Truncate => sys_truncate(a1, a2),
        Syscall::Uname => sys_uname(a1),
        Syscall::Sync => sys_sync(),
        Syscall::Getppid => sys_getppid(),
        Syscall::Sigsuspend => sys_sigsuspend(a1),
        Syscall::Gettid => sys_gettid(),
        Syscall::Futex => sys_futex_dispatch(a1, a2, a3, a4, a5).map(|v| v as usize),
        Syscall::SetPriority => sys_setpriority(a1, a2, a3),
        Syscall::ArchPrctl => sys_arch_prctl(a1, a2).map(|v| v as usize),
        Syscall::Mount => sys_mount(a1, a2, a3, a4),
        Syscall::Umount2 => sys_unmount(a1),
        Syscall::Ptrace => sys_ptrace(a1, a2, a3, a4),
        Syscall::ThreadJoin => sys_thread_join(a1, a2),
        Syscall::ThreadSetAffinity => sys_thread_setaffinity(a1, a2, a3),
        Syscall::ThreadGetAffinity => sys_thread_getaffinity(a1, a2, a3),
        Syscall::GetKernelInfo => sys_get_kernel_info(a1),
        Syscall::TimeCreateTimer => sys_time_create_timer(a1, a2, a3),
        Syscall::TimeCancelTimer => sys_time_cancel_timer(a1),
        Syscall::TimeGetUptime => sys_time_get_uptime(),
        Syscall::OpenPty => sys_openpty(a1, a2),
        Syscall::GrantPty => sys_grantpt(a1),
        Syscall::UnlockPty => sys_unlockpt(a1),
        Syscall::PtsName => sys_ptsname(a1, a2, a3),
    }
}

/// Yield the CPU to another runnable process.
fn sys_yield() -> SyscallResult {
    crate::sched::yield_cpu();
    Ok(0)
}

/// Validate a raw user pointer and its access size. Thin alias kept for
/// callers that predate [`userspace::validate_user_ptr`]'s name.
pub fn validate_user_pointer(ptr: usize, size: usize) -> Result<(), SyscallError> {
    validate_user_ptr(ptr, size)
}

/// Validate a user-provided buffer of `len` bytes starting at `ptr`.
pub fn validate_user_buffer(ptr: usize, len: usize) -> Result<(), SyscallError> {
    validate_user_ptr(ptr, len)
}

/// Validate a user pointer to a single value of type `T`.
pub fn validate_user_ptr_typed<T>(ptr: usize) -> Result<(), SyscallError> {
    validate_user_ptr(ptr, core::mem::size_of::<T>())
}
