//! User space memory access utilities
//!
//! Safe functions for copying data between kernel and user space. Every
//! access here is wrapped in SMAP gating on x86_64: `stac` before touching
//! user memory, `clac` immediately after, so a stray kernel bug elsewhere
//! can't silently dereference a user pointer.

use core::{ptr, slice, str};

use super::SyscallError;

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "alloc")]
use alloc::{string::String, vec::Vec};

/// Maximum string length we'll copy from user space
const MAX_USER_STRING_LEN: usize = 4096;

/// Lower bound of the user address range. Page zero is never mappable, so
/// treating it as invalid also catches null pointers.
const USER_ADDR_MIN: usize = 0x1000;
/// Upper bound (exclusive) of the user address range: the canonical
/// lower-half limit on x86_64.
const USER_ADDR_MAX: usize = 0x7FFF_FFFF_FFFF;

/// Run `f` with SMAP's AC flag set so user-space accesses are permitted,
/// clearing it again before returning.
///
/// # Safety
/// The caller must ensure `f` only dereferences pointers that were already
/// validated by [`validate_user_ptr`] (or equivalent).
#[cfg(target_arch = "x86_64")]
unsafe fn with_user_access<R>(f: impl FnOnce() -> R) -> R {
    core::arch::asm!("stac", options(nomem, nostack, preserves_flags));
    let result = f();
    core::arch::asm!("clac", options(nomem, nostack, preserves_flags));
    result
}

#[cfg(not(target_arch = "x86_64"))]
unsafe fn with_user_access<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Check if a user pointer is valid
pub fn validate_user_ptr(ptr: usize, size: usize) -> Result<(), SyscallError> {
    if ptr < USER_ADDR_MIN {
        return Err(SyscallError::InvalidPointer);
    }

    let end = ptr.checked_add(size).ok_or(SyscallError::InvalidPointer)?;
    if end > USER_ADDR_MAX {
        return Err(SyscallError::InvalidPointer);
    }

    Ok(())
}

/// Copy a null-terminated string from user space
///
/// # Safety
/// This function reads from user-provided pointers and must validate them
pub unsafe fn copy_string_from_user(user_ptr: usize) -> Result<String, SyscallError> {
    validate_user_ptr(user_ptr, 1)?;

    let mut len = 0;
    let mut ptr = user_ptr as *const u8;

    while len < MAX_USER_STRING_LEN {
        if len % 4096 == 0 {
            validate_user_ptr(ptr as usize, 1)?;
        }

        let byte = with_user_access(|| ptr::read_volatile(ptr));
        if byte == 0 {
            break;
        }

        len += 1;
        ptr = ptr.offset(1);
    }

    if len >= MAX_USER_STRING_LEN {
        return Err(SyscallError::InvalidArgument);
    }

    let slice = slice::from_raw_parts(user_ptr as *const u8, len);
    let string = String::from(str::from_utf8(slice).map_err(|_| SyscallError::InvalidArgument)?);

    Ok(string)
}

/// Copy data from user space to kernel space
///
/// # Safety
/// This function reads from user-provided pointers and must validate them
pub unsafe fn copy_from_user<T>(user_ptr: usize) -> Result<T, SyscallError>
where
    T: Copy,
{
    let size = core::mem::size_of::<T>();
    validate_user_ptr(user_ptr, size)?;

    let value = with_user_access(|| ptr::read_volatile(user_ptr as *const T));
    Ok(value)
}

/// Copy data from kernel space to user space
///
/// # Safety
/// This function writes to user-provided pointers and must validate them
pub unsafe fn copy_to_user<T>(user_ptr: usize, value: &T) -> Result<(), SyscallError>
where
    T: Copy,
{
    let size = core::mem::size_of::<T>();
    validate_user_ptr(user_ptr, size)?;

    with_user_access(|| ptr::write_volatile(user_ptr as *mut T, *value));
    Ok(())
}

/// Copy a byte slice from user space
///
/// # Safety
/// This function reads from user-provided pointers and must validate them
pub unsafe fn copy_slice_from_user(user_ptr: usize, len: usize) -> Result<Vec<u8>, SyscallError> {
    validate_user_ptr(user_ptr, len)?;

    with_user_access(|| {
        let slice = slice::from_raw_parts(user_ptr as *const u8, len);
        Ok(slice.to_vec())
    })
}

/// Copy a byte slice to user space
///
/// # Safety
/// This function writes to user-provided pointers and must validate them
pub unsafe fn copy_slice_to_user(user_ptr: usize, data: &[u8]) -> Result<(), SyscallError> {
    validate_user_ptr(user_ptr, data.len())?;

    with_user_access(|| {
        let dest = slice::from_raw_parts_mut(user_ptr as *mut u8, data.len());
        dest.copy_from_slice(data);
    });
    Ok(())
}

/// Copy a null-terminated string array from user space (like argv/envp)
///
/// # Safety
/// This function reads from user-provided pointers and must validate them
pub unsafe fn copy_string_array_from_user(array_ptr: usize) -> Result<Vec<String>, SyscallError> {
    if array_ptr == 0 {
        return Ok(Vec::new());
    }

    let mut strings = Vec::new();
    let mut current_ptr = array_ptr;

    loop {
        validate_user_ptr(current_ptr, 8)?;
        let string_ptr = with_user_access(|| ptr::read_volatile(current_ptr as *const usize));

        if string_ptr == 0 {
            break;
        }

        let string = copy_string_from_user(string_ptr)?;
        strings.push(string);

        current_ptr += 8;

        if strings.len() > 1024 {
            return Err(SyscallError::InvalidArgument);
        }
    }

    Ok(strings)
}
