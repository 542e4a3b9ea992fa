//! A wrapper type for secret values that prevents accidental leakage.
//!
//! # Status
//!
//! `Secret<T>` provides the following guarantees:
//! - Debug and Display always show `[REDACTED]` instead of the actual value
//! - The inner value is zeroized on drop
//! - Access to the inner value requires an explicit `expose()` call
//! - Comparisons use constant-time operations to prevent timing attacks
//!
//! # Platform-Specific Behavior
//!
//! On Unix platforms, `Secret<T>` provides additional OS-level memory protection:
//! - Memory is locked to prevent swapping (mlock)
//! - Memory is marked no-access while no guard is alive (mprotect)
//!
//! Any number of read guards may be alive at once (from any number of threads). The
//! region is only made readable by the first of them and only re-protected by the last.
//!
//! On other platforms, `Secret<T>` provides software-only protection
//! (zeroization and redacted debug output).
//!
//! # Type Constraints
//!
//! `Secret<T>` only provides full protection for self-contained types (no heap pointers).
//! Scalars are stored as `[u8; 32]`.

/// Constant-time equality comparison for byte slices.
///
/// XORs all bytes together and checks if the result is zero.
#[inline]
pub(crate) fn ct_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Constant-time less-than comparison for equal-length big-endian byte slices.
///
/// Every byte is visited regardless of where the first difference is.
#[inline]
pub(crate) fn ct_lt_bytes(a: &[u8], b: &[u8]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    let mut result = 0u8; // 0 = equal so far, 1 = a < b, 2 = a > b
    for (x, y) in a.iter().zip(b.iter()) {
        // 0xFF if result == 0, 0x00 otherwise
        let is_equal_so_far = 0u8.wrapping_sub(((result as u16).wrapping_sub(1) >> 15) as u8);
        // 1 if x < y (the 16-bit difference only wraps when y is larger)
        let x_lt_y = ((*x as u16).wrapping_sub(*y as u16) >> 15) as u8;
        let x_gt_y = ((*y as u16).wrapping_sub(*x as u16) >> 15) as u8;
        result |= is_equal_so_far & (x_lt_y | (x_gt_y << 1));
    }
    result == 1
}

/// Constant-time check that every byte is zero.
#[inline]
pub(crate) fn ct_is_zero(a: &[u8]) -> bool {
    let mut acc = 0u8;
    for x in a {
        acc |= x;
    }
    acc == 0
}

#[cfg(test)]
std::thread_local! {
    static WIPED: core::cell::RefCell<Vec<u8>> = const { core::cell::RefCell::new(Vec::new()) };
}

/// Records the contents of a region after it was wiped and before it was released.
#[cfg(test)]
fn record_wiped(bytes: &[u8]) {
    WIPED.with(|wiped| *wiped.borrow_mut() = bytes.to_vec());
}

/// Returns the backing bytes of the last [Secret] dropped on this thread, as they
/// were immediately before the memory was returned to the allocator.
#[cfg(test)]
pub(crate) fn last_wiped() -> Vec<u8> {
    WIPED.with(|wiped| wiped.borrow().clone())
}

#[cfg(unix)]
mod implementation {
    use core::{
        fmt::{Debug, Display, Formatter},
        ops::{Deref, DerefMut},
        ptr::NonNull,
    };
    use std::{
        alloc::{alloc, dealloc, Layout},
        sync::{Mutex, PoisonError},
    };
    use zeroize::{Zeroize, ZeroizeOnDrop};

    /// Returns the system page size.
    fn page_size() -> usize {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            4096
        } else {
            size as usize
        }
    }

    /// A wrapper for secret values with OS-level memory protection.
    ///
    /// Access requires an explicit `expose()` call which returns a guard.
    /// Memory is re-protected when the last guard is dropped.
    pub struct Secret<T: Zeroize> {
        ptr: NonNull<T>,
        size: usize,
        readers: Mutex<usize>,
    }

    // SAFETY: Secret owns its memory. Protection changes are serialized by `readers`
    // and mutable access requires `&mut self`.
    unsafe impl<T: Zeroize + Send> Send for Secret<T> {}
    // SAFETY: Shared access only ever reads, and the region stays readable for as long
    // as any read guard is alive.
    unsafe impl<T: Zeroize + Sync> Sync for Secret<T> {}

    impl<T: Zeroize> Secret<T> {
        /// Creates a new `Secret` wrapping the given value.
        ///
        /// # Panics
        ///
        /// Panics if memory protection fails (allocation, mlock, or mprotect).
        #[inline]
        pub fn new(value: T) -> Self {
            Self::try_new(value).expect("failed to create protected secret")
        }

        /// Creates a new `Secret`, returning an error on failure.
        ///
        /// Allocates page-aligned memory, writes the value, locks the pages with mlock and
        /// then removes all access with mprotect. Every failure path releases what was
        /// acquired before it.
        #[allow(clippy::undocumented_unsafe_blocks)]
        pub fn try_new(mut value: T) -> Result<Self, &'static str> {
            let page_size = page_size();
            let type_size = core::mem::size_of::<T>();
            // Round up to page boundary (minimum one page)
            let size = type_size.max(1).next_multiple_of(page_size);

            let layout = match Layout::from_size_align(size, page_size) {
                Ok(layout) => layout,
                Err(_) => {
                    value.zeroize();
                    return Err("invalid layout");
                }
            };

            // SAFETY: layout is valid (checked above), ptr may be null (checked below)
            let ptr = unsafe { alloc(layout) } as *mut T;
            if ptr.is_null() {
                value.zeroize();
                return Err("allocation failed");
            }

            // SAFETY: ptr is non-null and properly aligned for T
            unsafe { core::ptr::write(ptr, value) };

            // SAFETY: ptr points to valid allocated memory of size `size`
            if unsafe { libc::mlock(ptr as *const libc::c_void, size) } != 0 {
                // SAFETY: ptr and layout match the allocation above
                unsafe {
                    (*ptr).zeroize();
                    dealloc(ptr as *mut u8, layout);
                }
                return Err("mlock failed");
            }

            // SAFETY: ptr points to valid locked memory of size `size`
            if unsafe { libc::mprotect(ptr as *mut libc::c_void, size, libc::PROT_NONE) } != 0 {
                // SAFETY: cleanup on failure - wipe, unlock and deallocate
                unsafe {
                    (*ptr).zeroize();
                    libc::munlock(ptr as *const libc::c_void, size);
                    dealloc(ptr as *mut u8, layout);
                }
                return Err("mprotect failed");
            }

            Ok(Self {
                // SAFETY: ptr is non-null (checked above)
                ptr: unsafe { NonNull::new_unchecked(ptr) },
                size,
                readers: Mutex::new(0),
            })
        }

        /// Exposes the secret value for use.
        ///
        /// Returns a guard that re-protects memory when the last outstanding guard is dropped.
        #[inline]
        pub fn expose(&self) -> SecretGuard<'_, T> {
            let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
            if *readers == 0 {
                // SAFETY: self.ptr points to valid protected memory of self.size bytes
                let result = unsafe {
                    libc::mprotect(
                        self.ptr.as_ptr() as *mut libc::c_void,
                        self.size,
                        libc::PROT_READ,
                    )
                };
                assert_eq!(result, 0, "mprotect failed to unprotect memory");
            }
            *readers += 1;
            SecretGuard { secret: self }
        }

        /// Exposes the secret value mutably.
        ///
        /// Returns a guard that re-protects memory when dropped.
        #[inline]
        pub fn expose_mut(&mut self) -> SecretGuardMut<'_, T> {
            // SAFETY: self.ptr points to valid protected memory of self.size bytes
            let result = unsafe {
                libc::mprotect(
                    self.ptr.as_ptr() as *mut libc::c_void,
                    self.size,
                    libc::PROT_READ | libc::PROT_WRITE,
                )
            };
            assert_eq!(result, 0, "mprotect failed to unprotect memory");
            SecretGuardMut { secret: self }
        }

        fn release_reader(&self) {
            let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
            *readers -= 1;
            if *readers == 0 {
                // SAFETY: The pointer and size are valid for the lifetime of Secret.
                unsafe {
                    libc::mprotect(
                        self.ptr.as_ptr() as *mut libc::c_void,
                        self.size,
                        libc::PROT_NONE,
                    );
                }
            }
        }
    }

    impl<T: Zeroize> Debug for Secret<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
            f.write_str("[REDACTED]")
        }
    }

    impl<T: Zeroize> Display for Secret<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
            f.write_str("[REDACTED]")
        }
    }

    impl<T: Zeroize> Drop for Secret<T> {
        fn drop(&mut self) {
            let page_size = page_size();
            // SAFETY: self.ptr points to valid memory that was allocated with page_size
            // alignment and self.size bytes. We unprotect, zeroize, unlock, and deallocate
            // in sequence with exclusive access (&mut self).
            unsafe {
                libc::mprotect(
                    self.ptr.as_ptr() as *mut libc::c_void,
                    self.size,
                    libc::PROT_READ | libc::PROT_WRITE,
                );
                (*self.ptr.as_ptr()).zeroize();
                #[cfg(test)]
                super::record_wiped(core::slice::from_raw_parts(
                    self.ptr.as_ptr() as *const u8,
                    core::mem::size_of::<T>(),
                ));
                libc::munlock(self.ptr.as_ptr() as *const libc::c_void, self.size);
                let layout = Layout::from_size_align_unchecked(self.size, page_size);
                dealloc(self.ptr.as_ptr() as *mut u8, layout);
            }
        }
    }

    impl<T: Zeroize> ZeroizeOnDrop for Secret<T> {}

    impl<T: Zeroize + Clone> Clone for Secret<T> {
        fn clone(&self) -> Self {
            let guard = self.expose();
            Self::new((*guard).clone())
        }
    }

    impl<T: Zeroize> PartialEq for Secret<T> {
        fn eq(&self, other: &Self) -> bool {
            let guard_self = self.expose();
            let guard_other = other.expose();
            // SAFETY: Reading the raw bytes of a Sized T for constant-time comparison.
            let self_bytes = unsafe {
                core::slice::from_raw_parts(
                    &*guard_self as *const T as *const u8,
                    core::mem::size_of::<T>(),
                )
            };
            // SAFETY: Same as above.
            let other_bytes = unsafe {
                core::slice::from_raw_parts(
                    &*guard_other as *const T as *const u8,
                    core::mem::size_of::<T>(),
                )
            };
            super::ct_eq_bytes(self_bytes, other_bytes)
        }
    }

    impl<T: Zeroize> Eq for Secret<T> {}

    /// RAII guard for read access to a secret.
    pub struct SecretGuard<'a, T: Zeroize> {
        secret: &'a Secret<T>,
    }

    impl<T: Zeroize> Deref for SecretGuard<'_, T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            // SAFETY: The memory is readable while this guard exists, and the pointer is
            // valid for the lifetime of Secret.
            unsafe { self.secret.ptr.as_ref() }
        }
    }

    impl<T: Zeroize> Drop for SecretGuard<'_, T> {
        fn drop(&mut self) {
            self.secret.release_reader();
        }
    }

    /// RAII guard for mutable access to a secret.
    pub struct SecretGuardMut<'a, T: Zeroize> {
        secret: &'a mut Secret<T>,
    }

    impl<T: Zeroize> Deref for SecretGuardMut<'_, T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            // SAFETY: The memory is readable and writable while this guard exists.
            unsafe { self.secret.ptr.as_ref() }
        }
    }

    impl<T: Zeroize> DerefMut for SecretGuardMut<'_, T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            // SAFETY: The memory is readable and writable while this guard exists, and we
            // have exclusive access.
            unsafe { self.secret.ptr.as_mut() }
        }
    }

    impl<T: Zeroize> Drop for SecretGuardMut<'_, T> {
        fn drop(&mut self) {
            // SAFETY: The pointer and size are valid from the Secret.
            unsafe {
                libc::mprotect(
                    self.secret.ptr.as_ptr() as *mut libc::c_void,
                    self.secret.size,
                    libc::PROT_NONE,
                );
            }
        }
    }
}

#[cfg(not(unix))]
mod implementation {
    use core::{
        fmt::{Debug, Display, Formatter},
        ops::{Deref, DerefMut},
    };
    use zeroize::{Zeroize, ZeroizeOnDrop};

    /// A wrapper for secret values that prevents accidental leakage.
    ///
    /// Without OS-level protection (non-Unix):
    /// - Debug and Display show `[REDACTED]`
    /// - Zeroized on drop
    /// - Access requires explicit `expose()` call
    pub struct Secret<T: Zeroize>(T);

    impl<T: Zeroize> Secret<T> {
        /// Creates a new `Secret` wrapping the given value.
        #[inline]
        pub fn new(value: T) -> Self {
            Self(value)
        }

        /// Creates a new `Secret`. Never fails without OS-level protection.
        #[inline]
        pub fn try_new(value: T) -> Result<Self, &'static str> {
            Ok(Self(value))
        }

        /// Exposes the secret value for use.
        #[inline]
        pub fn expose(&self) -> SecretGuard<'_, T> {
            SecretGuard(&self.0)
        }

        /// Exposes the secret value mutably.
        #[inline]
        pub fn expose_mut(&mut self) -> SecretGuardMut<'_, T> {
            SecretGuardMut(&mut self.0)
        }
    }

    impl<T: Zeroize> Debug for Secret<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
            f.write_str("[REDACTED]")
        }
    }

    impl<T: Zeroize> Display for Secret<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
            f.write_str("[REDACTED]")
        }
    }

    impl<T: Zeroize> Drop for Secret<T> {
        fn drop(&mut self) {
            self.0.zeroize();
            #[cfg(test)]
            // SAFETY: Reading the raw bytes of a Sized T.
            super::record_wiped(unsafe {
                core::slice::from_raw_parts(
                    &self.0 as *const T as *const u8,
                    core::mem::size_of::<T>(),
                )
            });
        }
    }

    impl<T: Zeroize> ZeroizeOnDrop for Secret<T> {}

    impl<T: Zeroize + Clone> Clone for Secret<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone())
        }
    }

    impl<T: Zeroize> PartialEq for Secret<T> {
        fn eq(&self, other: &Self) -> bool {
            // SAFETY: Reading the raw bytes of a Sized T for constant-time comparison.
            let self_bytes = unsafe {
                core::slice::from_raw_parts(
                    &self.0 as *const T as *const u8,
                    core::mem::size_of::<T>(),
                )
            };
            // SAFETY: Same as above.
            let other_bytes = unsafe {
                core::slice::from_raw_parts(
                    &other.0 as *const T as *const u8,
                    core::mem::size_of::<T>(),
                )
            };
            super::ct_eq_bytes(self_bytes, other_bytes)
        }
    }

    impl<T: Zeroize> Eq for Secret<T> {}

    /// RAII guard for read access to a secret.
    pub struct SecretGuard<'a, T: Zeroize>(&'a T);

    impl<T: Zeroize> Deref for SecretGuard<'_, T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            self.0
        }
    }

    /// RAII guard for mutable access to a secret.
    pub struct SecretGuardMut<'a, T: Zeroize>(&'a mut T);

    impl<T: Zeroize> Deref for SecretGuardMut<'_, T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            self.0
        }
    }

    impl<T: Zeroize> DerefMut for SecretGuardMut<'_, T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            self.0
        }
    }
}

pub use implementation::*;
