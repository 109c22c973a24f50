//! 16-bit carrier modulator timer (CMT on the Kinetis K20 / Teensy 3.x).
//!
//! Used in baseband mode: the modulator output is high for `CMD1:CMD2 + 1`
//! and low for `CMD3:CMD4` counts, and raises the end-of-cycle interrupt once
//! per period. One count is `(PPS + 1) * 2^CMTDIV * 8` bus clocks, and with
//! both phases equal a period is `2^(CMTDIV + 4) * (PPS + 1)` bus clocks per
//! unit of `CMD3:CMD4`.
//!
//! K20 Sub-Family Reference Manual, chapter 40
//!
//! | Register    | Bits used                                              |
//! |-------------|--------------------------------------------------------|
//! | `CMT_OC`    | `CMTPOL` (6) always set, `IROPEN` (5) toggle output    |
//! | `CMT_MSC`   | `EOCF` (7), `CMTDIV` (6..5), `BASE` (3), `EOCIE` (1), `MCGEN` (0) |
//! | `CMT_CMD1:2`| high time minus one, big-endian                        |
//! | `CMT_CMD3:4`| period, big-endian                                     |
//! | `CMT_PPS`   | `PPSDIV` (3..0) primary prescaler                      |

#[cfg(feature = "mk20dx256")]
pub mod mmio;

use crate::registers::{InterruptLine, RegisterBlock};
use crate::timer::{FrequencyTimer, TimerConfiguration};
use ufmt::{uDisplay, uWrite, Formatter};

pub mod bits {
    pub const CMTPOL: u8 = 1 << 6;
    pub const IROPEN: u8 = 1 << 5;

    pub const EOCF: u8 = 1 << 7;
    pub const CMTDIV_SHIFT: u8 = 5;
    pub const CMTDIV_MASK: u8 = 0b11;
    pub const BASE: u8 = 1 << 3;
    pub const EOCIE: u8 = 1 << 1;
    pub const MCGEN: u8 = 1 << 0;

    pub const PPSDIV_MASK: u8 = 0b1111;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmtRegister {
    Oc,
    Msc,
    Cmd1,
    Cmd2,
    Cmd3,
    Cmd4,
    Pps,
}

pub const REGISTER_COUNT: usize = 7;

impl CmtRegister {
    /// Byte offset from the CMT base address.
    pub const fn offset(self) -> usize {
        match self {
            Self::Oc => 0x04,
            Self::Msc => 0x05,
            Self::Cmd1 => 0x06,
            Self::Cmd2 => 0x07,
            Self::Cmd3 => 0x08,
            Self::Cmd4 => 0x09,
            Self::Pps => 0x0A,
        }
    }
}

impl From<CmtRegister> for usize {
    fn from(register: CmtRegister) -> Self {
        register.offset() - CmtRegister::Oc.offset()
    }
}

/// Primary (`PPSDIV`, 0..=15) and secondary (`CMTDIV`, 0..=3) divider fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmtDivider {
    pub bdiv: u8,
    pub cdiv: u8,
}

impl CmtDivider {
    /// Combined divisor in units of the fixed /16.
    pub const fn multiplier(self) -> u32 {
        (self.bdiv as u32 + 1) << self.cdiv
    }

    /// Bus clocks per modulator count.
    pub const fn divisor(self) -> u32 {
        self.multiplier() << 4
    }
}

impl uDisplay for CmtDivider {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(f, "bus/{} (pps={} div={})", self.divisor(), self.bdiv, self.cdiv)
    }
}

pub const DIVIDER_COUNT: usize = 40;

/// Every divider pair worth using, in ascending combined divisor.
///
/// The secondary stage only pairs with primaries of 9 and up, the smaller
/// products are already reached by the primary alone.
pub const DIVIDERS: [CmtDivider; DIVIDER_COUNT] = divider_table();

#[expect(
    clippy::cast_possible_truncation,
    reason = "index stays below 16 while it is used as a divider"
)]
const fn divider_table() -> [CmtDivider; DIVIDER_COUNT] {
    let mut table = [CmtDivider { bdiv: 0, cdiv: 0 }; DIVIDER_COUNT];
    let mut index = 0;
    while index < 16 {
        table[index].bdiv = index as u8;
        index += 1;
    }
    let mut cdiv = 1;
    while cdiv < 4 {
        let mut bdiv = 8;
        while bdiv < 16 {
            table[index] = CmtDivider { bdiv, cdiv };
            index += 1;
            bdiv += 1;
        }
        cdiv += 1;
    }
    table
}

const VALUE_LIMIT: u32 = 65_535;
const SATURATED_VALUE: u16 = crate::const_int_cast!(VALUE_LIMIT, u16);
const LARGEST: CmtDivider = CmtDivider { bdiv: 15, cdiv: 3 };

/// Pick the smallest divider pair that keeps the period count within 16 bits.
pub fn convert(period_us: u32, bus_cycles_per_us: u32) -> TimerConfiguration<CmtDivider> {
    let period_us = period_us.max(1);
    let ticks = period_us.saturating_mul(bus_cycles_per_us);

    let divider = DIVIDERS
        .iter()
        .copied()
        .find(|divider| ticks < VALUE_LIMIT * 16 * divider.multiplier())
        .unwrap_or(LARGEST);
    let value = ((ticks / (u32::from(divider.bdiv) + 1)) >> (divider.cdiv + 4)).clamp(1, VALUE_LIMIT);

    TimerConfiguration {
        requested_period_us: period_us,
        divider,
        top: u16::try_from(value).unwrap_or(SATURATED_VALUE),
    }
}

/// Period in microseconds implied by `CMD3:CMD4`, `PPS` and `MSC`.
pub(crate) fn period_from_registers(period: [u8; 2], pps: u8, msc: u8, bus_cycles_per_us: u32) -> u32 {
    let divider = CmtDivider {
        bdiv: pps & bits::PPSDIV_MASK,
        cdiv: (msc >> bits::CMTDIV_SHIFT) & bits::CMTDIV_MASK,
    };
    u32::from(u16::from_be_bytes(period)) * divider.divisor() / bus_cycles_per_us
}

/// Clear the end-of-cycle flag: read `MSC` with `EOCF` set, then `CMD2`.
///
/// Returns whether the flag was set.
pub fn acknowledge<R: RegisterBlock<Register = CmtRegister>>(regs: &R) -> bool {
    let msc = regs.read(CmtRegister::Msc);
    let _ = regs.read(CmtRegister::Cmd2);
    msc & bits::EOCF != 0
}

/// CMT driven through a [`RegisterBlock`], with `BUS_CYCLES_PER_US` bus clocks per microsecond.
pub struct Cmt<R, const BUS_CYCLES_PER_US: u32> {
    regs: R,
}

impl<R, const BUS_CYCLES_PER_US: u32> Cmt<R, BUS_CYCLES_PER_US> {
    const CLOCK_TEST: () = assert!(
        BUS_CYCLES_PER_US > 0,
        "CMT needs at least one bus cycle per microsecond"
    );

    pub const fn new(regs: R) -> Self {
        let () = Self::CLOCK_TEST;
        Self { regs }
    }

    pub const fn registers(&self) -> &R {
        &self.regs
    }
}

impl<R, const BUS_CYCLES_PER_US: u32> FrequencyTimer for Cmt<R, BUS_CYCLES_PER_US>
where
    R: RegisterBlock<Register = CmtRegister> + InterruptLine,
{
    type Divider = CmtDivider;

    const MAX_TOP: u16 = 65_535;

    fn convert(period_us: u32) -> TimerConfiguration<CmtDivider> {
        convert(period_us, BUS_CYCLES_PER_US)
    }

    fn configure_period(&mut self, config: &TimerConfiguration<CmtDivider>, toggle: bool) {
        let value = config.top.max(1);
        let [high_msb, high_lsb] = (value - 1).to_be_bytes();
        let [period_msb, period_lsb] = value.to_be_bytes();
        let regs = &mut self.regs;

        regs.write(CmtRegister::Msc, 0);
        regs.write(CmtRegister::Pps, config.divider.bdiv & bits::PPSDIV_MASK);
        regs.write(CmtRegister::Cmd1, high_msb);
        regs.write(CmtRegister::Cmd2, high_lsb);
        regs.write(CmtRegister::Cmd3, period_msb);
        regs.write(CmtRegister::Cmd4, period_lsb);
        regs.write(
            CmtRegister::Oc,
            bits::CMTPOL | if toggle { bits::IROPEN } else { 0 },
        );
        regs.write(
            CmtRegister::Msc,
            ((config.divider.cdiv & bits::CMTDIV_MASK) << bits::CMTDIV_SHIFT)
                | bits::BASE
                | bits::EOCIE
                | bits::MCGEN,
        );
    }

    fn read_period(&self) -> u32 {
        let period = [self.regs.read(CmtRegister::Cmd3), self.regs.read(CmtRegister::Cmd4)];
        let pps = self.regs.read(CmtRegister::Pps);
        let msc = self.regs.read(CmtRegister::Msc);
        period_from_registers(period, pps, msc, BUS_CYCLES_PER_US)
    }

    fn set_toggle_mode(&mut self, enabled: bool) {
        self.regs.set_bits(CmtRegister::Oc, bits::IROPEN, enabled);
    }

    fn set_interrupt(&mut self, enabled: bool) {
        if enabled {
            self.regs.enable();
        } else {
            self.regs.disable();
        }
    }
}
