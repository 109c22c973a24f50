//! Timer2 interrupt and frequency generator.
//!
//! Turns a free-running timer peripheral into a square-wave generator with
//! microsecond period control. On every period boundary the peripheral either
//! toggles its output pin in hardware or calls a registered function from
//! interrupt context.
//!
//! Two hardware families are supported, one per build:
//!
//! - `atmega328p`: the 8-bit `TC2` compare-match timer ([`tc2`]).
//! - `mk20dx256`: the 16-bit carrier modulator timer of a Kinetis K20 ([`cmt`]).
//!
//! ```ignore
//! let dp = atmega_hal::Peripherals::take().unwrap();
//! let mut timer = timer_two::tc2::avr::timer_two(dp.TC2);
//! timer.set_period(1136);
//! timer.enable();
//! ```
#![cfg_attr(not(test), no_std)]
#![cfg_attr(
    all(target_arch = "avr", feature = "rt"),
    feature(abi_avr_interrupt)
)]

#[cfg(all(feature = "atmega328p", feature = "mk20dx256"))]
compile_error!("Exactly one timer family may be selected: `atmega328p` or `mk20dx256`");

macro_rules! const_int_cast {
    ($value:expr, $to:ty) => {{
        const OUT: $to = {
            // Validate 128-bit is not used
            #[expect(
                clippy::indexing_slicing,
                reason = "We want it to panic if we use 128-bit types"
            )]
            const _: () = [()][(core::mem::size_of::<$to>() == 16
                || core::mem::size_of_val(&$value) == 16) as usize];
            // Bounds check
            const _: () = assert!(
                ($value as i128) >= <$to>::MIN as i128 && ($value as i128) <= <$to>::MAX as i128,
                "const_int_cast: value out of bounds"
            );

            $value as $to
        };
        OUT
    }};
}
pub(crate) use const_int_cast;

pub mod cmt;
pub mod dispatch;
pub mod registers;
pub mod tc2;
pub mod timer;
pub mod toggle;

pub use dispatch::{Dispatch, InterruptDispatcher, DISPATCHER};
pub use timer::{FrequencyTimer, TimerConfiguration, TimerTwo};
