//! 8-bit compare-match timer (`TC2` on the atmega328p).
//!
//! The timer runs in CTC mode: it counts up to `OCR2A`, clears, and fires
//! `TIMER2_COMPA`. With `COM2A0` set the `OC2A` pin (PB3, Arduino D11) toggles
//! on every match, so the output period is two compare periods.
//!
//! https://ww1.microchip.com/downloads/en/DeviceDoc/Atmel-7810-Automotive-Microcontrollers-ATmega328P_Datasheet.pdf
//! section 17.11
//!
//! | Register | Bits used                                        |
//! |----------|--------------------------------------------------|
//! | `TCCR2A` | `COM2A0` (6) toggle on match, `WGM21` (1) CTC    |
//! | `TCCR2B` | `CS22:0` (2..0) clock select, see [`Prescaler`]  |
//! | `TCNT2`  | counter                                          |
//! | `OCR2A`  | top value                                        |
//! | `ASSR`   | `AS2` (5) cleared, clock from `clk_io`           |
//! | `TIMSK2` | `OCIE2A` (1) compare match A interrupt enable    |
//!
//! Only parts with the split `TCCR2A`/`TCCR2B` control registers and the
//! `TIMER2_COMPA` vector are supported. The older single `TCCR2` layout with
//! `TIMER2_COMP` (ATmega8 and relatives) is not.

#[cfg(feature = "atmega328p")]
pub mod avr;

use crate::registers::RegisterBlock;
use crate::timer::{FrequencyTimer, TimerConfiguration};
use strum::{EnumIter, IntoEnumIterator as _};
use ufmt::{uDisplay, uWrite, Formatter};

pub mod bits {
    pub const COM2A0: u8 = 1 << 6;
    pub const WGM21: u8 = 1 << 1;
    pub const CS2_MASK: u8 = 0b111;
    pub const AS2: u8 = 1 << 5;
    pub const OCIE2A: u8 = 1 << 1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tc2Register {
    Tccr2a,
    Tccr2b,
    Tcnt2,
    Ocr2a,
    Assr,
    Timsk2,
}

pub const REGISTER_COUNT: usize = 6;

impl From<Tc2Register> for usize {
    fn from(register: Tc2Register) -> Self {
        match register {
            Tc2Register::Tccr2a => 0,
            Tc2Register::Tccr2b => 1,
            Tc2Register::Tcnt2 => 2,
            Tc2Register::Ocr2a => 3,
            Tc2Register::Assr => 4,
            Tc2Register::Timsk2 => 5,
        }
    }
}

/// `CS22:0` clock select values, in ascending divisor order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Prescaler {
    Direct,
    Prescale8,
    Prescale32,
    Prescale64,
    Prescale128,
    Prescale256,
    Prescale1024,
}

impl Prescaler {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Direct => 1,
            Self::Prescale8 => 2,
            Self::Prescale32 => 3,
            Self::Prescale64 => 4,
            Self::Prescale128 => 5,
            Self::Prescale256 => 6,
            Self::Prescale1024 => 7,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            Self::Direct => 1,
            Self::Prescale8 => 8,
            Self::Prescale32 => 32,
            Self::Prescale64 => 64,
            Self::Prescale128 => 128,
            Self::Prescale256 => 256,
            Self::Prescale1024 => 1024,
        }
    }
}

impl uDisplay for Prescaler {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(f, "clk/{}", self.divisor())
    }
}

/// Left shift that turns `OCR2A + 1` back into cycles, indexed by `CS22:0`.
/// Code 0 (stopped) shares the shift of code 1.
const SHIFTS: [u8; 8] = [0, 0, 3, 5, 6, 7, 8, 10];

const TOP_LIMIT: u32 = 255;
const SATURATED_TOP: u8 = crate::const_int_cast!(TOP_LIMIT, u8);

/// Pick the smallest prescaler whose top value fits in `OCR2A`.
pub fn convert(period_us: u32, cycles_per_us: u32) -> TimerConfiguration<Prescaler> {
    let period_us = period_us.max(1);
    // Half cycles: the pin toggles twice per output period
    let ticks = (period_us.saturating_mul(cycles_per_us) / 2).max(1);

    let (divider, top) = Prescaler::iter()
        .map(|prescaler| (prescaler, (ticks / prescaler.divisor()).saturating_sub(1)))
        .find(|&(_, top)| top <= TOP_LIMIT)
        .unwrap_or((Prescaler::Prescale1024, TOP_LIMIT));

    TimerConfiguration {
        requested_period_us: period_us,
        divider,
        top: u16::from(u8::try_from(top).unwrap_or(SATURATED_TOP)),
    }
}

/// Period in microseconds implied by a clock select code and `OCR2A`.
pub(crate) fn period_from_registers(clock_select: u8, top: u8, cycles_per_us: u32) -> u32 {
    debug_assert_ne!(clock_select, 0, "TC2 read back while stopped");
    let shift = SHIFTS
        .get(usize::from(clock_select & bits::CS2_MASK))
        .copied()
        .unwrap_or(0);
    // shift + 1 converts from half period to period
    (((u32::from(top) + 1) << (shift + 1)) + 1) / cycles_per_us
}

/// `TC2` driven through a [`RegisterBlock`], at `CYCLES_PER_US` CPU cycles per microsecond.
pub struct Tc2<R, const CYCLES_PER_US: u32> {
    regs: R,
}

impl<R, const CYCLES_PER_US: u32> Tc2<R, CYCLES_PER_US> {
    const CLOCK_TEST: () = assert!(CYCLES_PER_US > 0, "TC2 needs at least one cycle per microsecond");

    pub const fn new(regs: R) -> Self {
        let () = Self::CLOCK_TEST;
        Self { regs }
    }

    pub const fn registers(&self) -> &R {
        &self.regs
    }
}

impl<R, const CYCLES_PER_US: u32> FrequencyTimer for Tc2<R, CYCLES_PER_US>
where
    R: RegisterBlock<Register = Tc2Register>,
{
    type Divider = Prescaler;

    const MAX_TOP: u16 = 255;

    fn convert(period_us: u32) -> TimerConfiguration<Prescaler> {
        convert(period_us, CYCLES_PER_US)
    }

    fn configure_period(&mut self, config: &TimerConfiguration<Prescaler>, toggle: bool) {
        let top = u8::try_from(config.top).unwrap_or(SATURATED_TOP);
        let regs = &mut self.regs;

        // Stop the clock and clear the counter before the new top goes in
        regs.write(Tc2Register::Tccr2b, 0);
        regs.write(Tc2Register::Tccr2a, 0);
        regs.write(Tc2Register::Tcnt2, 0);
        regs.set_bits(Tc2Register::Assr, bits::AS2, false);
        regs.write(Tc2Register::Ocr2a, top);
        regs.write(
            Tc2Register::Tccr2a,
            bits::WGM21 | if toggle { bits::COM2A0 } else { 0 },
        );
        regs.write(Tc2Register::Tccr2b, config.divider.bits());
    }

    fn read_period(&self) -> u32 {
        // Before the first `configure_period` the clock is stopped, which
        // reads back like the undivided clock
        let clock_select = (self.regs.read(Tc2Register::Tccr2b) & bits::CS2_MASK)
            .max(Prescaler::Direct.bits());
        let top = self.regs.read(Tc2Register::Ocr2a);
        period_from_registers(clock_select, top, CYCLES_PER_US)
    }

    fn set_toggle_mode(&mut self, enabled: bool) {
        self.regs.set_bits(Tc2Register::Tccr2a, bits::COM2A0, enabled);
    }

    fn set_interrupt(&mut self, enabled: bool) {
        self.regs.set_bits(Tc2Register::Timsk2, bits::OCIE2A, enabled);
    }
}
