//! The CMT of an MK20DX256 (Teensy 3.1/3.2) through its memory-mapped registers.

use super::{acknowledge, Cmt, CmtRegister};
use crate::dispatch::DISPATCHER;
use crate::registers::{InterruptLine, RegisterBlock};
use crate::timer::TimerTwo;
use core::cell::Cell;
use core::ptr;
use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use critical_section::Mutex;

const CMT_BASE: usize = 0x4006_2000;
const SIM_SCGC4: usize = 0x4004_8034;
const SIM_SCGC4_CMT: u32 = 1 << 2;

/// The CMT vector in the MK20DX256 NVIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmtIrq;

// SAFETY: 65 is the CMT position in the K20 vector table
unsafe impl InterruptNumber for CmtIrq {
    fn number(self) -> u16 {
        65
    }
}

/// F_BUS of a Teensy 3.2 running at 96 MHz.
pub const BUS_CYCLES_PER_US: u32 = 48;

pub type Timer = TimerTwo<'static, Cmt<MmioCmt, BUS_CYCLES_PER_US>>;

static TAKEN: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

pub struct MmioCmt {
    _private: (),
}

impl MmioCmt {
    /// Claim the CMT and gate its clock on. Returns `None` after the first call.
    pub fn take() -> Option<Self> {
        let first = critical_section::with(|cs| !TAKEN.borrow(cs).replace(true));
        first.then(|| {
            // SAFETY: SIM_SCGC4 is a valid, always-clocked register on every K20
            unsafe {
                let scgc4 = SIM_SCGC4 as *mut u32;
                ptr::write_volatile(scgc4, ptr::read_volatile(scgc4) | SIM_SCGC4_CMT);
            }
            Self { _private: () }
        })
    }

    /// Register view for the vector, which only reads to clear `EOCF`.
    /// Ownership stays with the value returned by [`MmioCmt::take`].
    const fn isr_view() -> Self {
        Self { _private: () }
    }
}

/// Take over the CMT. Callbacks registered on the result run from [`on_cmt_interrupt`].
pub fn timer_two() -> Option<Timer> {
    MmioCmt::take().map(|regs| TimerTwo::new(Cmt::new(regs), &DISPATCHER))
}

impl RegisterBlock for MmioCmt {
    type Register = CmtRegister;

    fn read(&self, register: CmtRegister) -> u8 {
        // SAFETY: the offsets in `CmtRegister` are the CMT's byte registers
        unsafe { ptr::read_volatile((CMT_BASE + register.offset()) as *const u8) }
    }

    fn write(&mut self, register: CmtRegister, value: u8) {
        // SAFETY: as above, and the clock gate was opened in `take`
        unsafe { ptr::write_volatile((CMT_BASE + register.offset()) as *mut u8, value) }
    }
}

impl InterruptLine for MmioCmt {
    fn enable(&mut self) {
        // SAFETY: the vector only touches the dispatcher, which is critical-section guarded
        unsafe { NVIC::unmask(CmtIrq) }
    }

    fn disable(&mut self) {
        NVIC::mask(CmtIrq);
    }
}

/// Entry point for the `CMT` vector (IRQ 65).
pub fn on_cmt_interrupt() {
    acknowledge(&MmioCmt::isr_view());
    DISPATCHER.dispatch();
}
