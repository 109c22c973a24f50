use super::{Tc2, Tc2Register};
use crate::dispatch::DISPATCHER;
use crate::registers::RegisterBlock;
use crate::timer::TimerTwo;
use atmega_hal::clock::Clock as _;
use atmega_hal::pac::TC2;

pub type CoreClock = atmega_hal::clock::MHz16;

pub const CYCLES_PER_US: u32 = crate::const_int_cast!(CoreClock::FREQ / 1_000_000, u32);

pub type Timer = TimerTwo<'static, Tc2<TC2, CYCLES_PER_US>>;

/// Take over `TC2`. Callbacks registered on the result run from `TIMER2_COMPA`.
pub fn timer_two(tc2: TC2) -> Timer {
    TimerTwo::new(Tc2::new(tc2), &DISPATCHER)
}

impl RegisterBlock for TC2 {
    type Register = Tc2Register;

    fn read(&self, register: Tc2Register) -> u8 {
        match register {
            Tc2Register::Tccr2a => self.tccr2a.read().bits(),
            Tc2Register::Tccr2b => self.tccr2b.read().bits(),
            Tc2Register::Tcnt2 => self.tcnt2.read().bits(),
            Tc2Register::Ocr2a => self.ocr2a.read().bits(),
            Tc2Register::Assr => self.assr.read().bits(),
            Tc2Register::Timsk2 => self.timsk2.read().bits(),
        }
    }

    #[allow(
        unused_unsafe,
        reason = "Raw bit writes are unsafe only on registers with reserved bits"
    )]
    fn write(&mut self, register: Tc2Register, value: u8) {
        // SAFETY: every value written comes from the documented bit layout in `tc2`
        unsafe {
            match register {
                Tc2Register::Tccr2a => self.tccr2a.write(|w| w.bits(value)),
                Tc2Register::Tccr2b => self.tccr2b.write(|w| w.bits(value)),
                Tc2Register::Tcnt2 => self.tcnt2.write(|w| w.bits(value)),
                Tc2Register::Ocr2a => self.ocr2a.write(|w| w.bits(value)),
                Tc2Register::Assr => self.assr.write(|w| w.bits(value)),
                Tc2Register::Timsk2 => self.timsk2.write(|w| w.bits(value)),
            }
        }
    }
}

#[cfg(feature = "rt")]
#[avr_device::interrupt(atmega328p)]
#[expect(
    clippy::single_call_fn,
    reason = "Interrupts are only triggered by internal interrupts"
)]
fn TIMER2_COMPA() {
    DISPATCHER.dispatch();
}
