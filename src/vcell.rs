//! Volatile cell that conforms to the RAL's register API
//!
//! Both the USB registers and the 16-bit packet memory words are
//! modeled with `VCell`s, so the `ral-registers` macros work against
//! either one.

use core::cell::UnsafeCell;

#[repr(transparent)]
pub struct VCell<T>(UnsafeCell<T>);

impl<T> VCell<T> {
    pub const fn new(val: T) -> Self {
        VCell(UnsafeCell::new(val))
    }
}

impl<T: Copy> VCell<T> {
    #[inline(always)]
    pub fn read(&self) -> T {
        // Safety: the cell is only reachable through shared references, and
        // T is Copy. Volatile access keeps the compiler from caching values
        // the hardware can change underneath us.
        unsafe { self.0.get().read_volatile() }
    }
    #[inline(always)]
    pub fn write(&self, val: T) {
        unsafe { self.0.get().write_volatile(val) }
    }
}
