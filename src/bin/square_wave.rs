//! Plays two alternating tones on D11 (OC2A) and blinks the on-board LED at
//! every switch. The tone comes from the timer pin toggle, the switching from
//! counting compare matches in the overflow callback.
#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

#[cfg(feature = "log")]
use atmega_hal::prelude::*;
#[cfg(feature = "log")]
use atmega_hal::usart::{Baudrate, Usart};
use avr_device::interrupt::Mutex;
use core::cell;
use embedded_hal::delay::DelayNs as _;
use panic_halt as _;
use timer_two::tc2::avr::{timer_two, CoreClock};

static COMPARE_MATCHES: Mutex<cell::Cell<u32>> = Mutex::new(cell::Cell::new(0));

/// A3 and A5, two octaves apart
const TONES_US: [u32; 2] = [4545, 1136];

fn count_match() {
    avr_device::interrupt::free(|cs| {
        let counter_cell = COMPARE_MATCHES.borrow(cs);
        let counter = counter_cell.get();
        counter_cell.set(counter.wrapping_add(1));
    });
}

fn compare_matches() -> u32 {
    avr_device::interrupt::free(|cs| COMPARE_MATCHES.borrow(cs).get())
}

#[avr_device::entry]
fn main() -> ! {
    let dp = atmega_hal::Peripherals::take().unwrap();
    let pins = atmega_hal::pins!(dp);
    #[cfg(feature = "log")]
    let mut serial = Usart::new(
        dp.USART0,
        pins.pd0,
        pins.pd1.into_output(),
        Baudrate::<CoreClock>::new(57600),
    );
    let mut delay = atmega_hal::delay::Delay::<CoreClock>::new();

    // OC2A is driven by the timer once it is an output
    let _tone_pin = pins.pb3.into_output();
    let mut led = pins.pb5.into_output();

    let mut timer = timer_two(dp.TC2);
    let mut tone = 0;
    timer.set_period(TONES_US[tone]);
    timer.enable();
    timer.set_on_overflow(Some(count_match));

    #[cfg(feature = "log_info")]
    ufmt::uwriteln!(
        &mut serial,
        "TC2 {}\r",
        timer_two::tc2::convert(TONES_US[tone], timer_two::tc2::avr::CYCLES_PER_US)
    )
    .unwrap_infallible();

    // Enable interrupts globally
    unsafe { avr_device::interrupt::enable() };

    let mut last_switch = 0;
    loop {
        let matches = compare_matches();
        // Two compare matches per output period
        if matches.wrapping_sub(last_switch) >= 2_000_000 / TONES_US[tone] {
            last_switch = matches;
            tone = (tone + 1) % TONES_US.len();
            timer.set_period(TONES_US[tone]);
            led.toggle();

            #[cfg(feature = "log_debug")]
            ufmt::uwriteln!(&mut serial, "period {}us\r", timer.period()).unwrap_infallible();
        }
        delay.delay_ms(10);
    }
}
