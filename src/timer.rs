use crate::dispatch::InterruptDispatcher;
use crate::toggle::ToggleController;
use ufmt::{uDisplay, uWrite, Formatter};

/// Divider selection and compare/top value computed for one requested period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfiguration<D> {
    /// The requested period after clamping 0 to 1.
    pub requested_period_us: u32,
    pub divider: D,
    /// Never exceeds the family's `MAX_TOP`.
    pub top: u16,
}

impl<D: uDisplay> uDisplay for TimerConfiguration<D> {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(
            f,
            "{}us -> {} top={}",
            self.requested_period_us,
            self.divider,
            self.top
        )
    }
}

/// One hardware strategy for periodic frequency generation.
///
/// Exactly one implementation is present per build; [`TimerTwo`] is generic
/// over it so there is no runtime dispatch.
pub trait FrequencyTimer {
    type Divider: Copy;

    /// Largest value the compare/top register can hold.
    const MAX_TOP: u16;

    /// Nearest representable configuration for `period_us`.
    fn convert(period_us: u32) -> TimerConfiguration<Self::Divider>;

    /// Program the registers for `config`. `toggle` is written into the
    /// mode bits as part of the same sequence.
    ///
    /// Callers must hold a critical section.
    fn configure_period(&mut self, config: &TimerConfiguration<Self::Divider>, toggle: bool);

    /// Period implied by the live register contents.
    fn read_period(&self) -> u32;

    fn set_toggle_mode(&mut self, enabled: bool);

    fn set_interrupt(&mut self, enabled: bool);
}

/// The timer as clients see it.
///
/// Owning a `TimerTwo` means owning the peripheral, so there is at most one
/// per program. The dispatcher it registers callbacks with is the one the
/// interrupt vector calls.
pub struct TimerTwo<'d, F> {
    family: F,
    toggle: ToggleController,
    dispatcher: &'d InterruptDispatcher,
}

impl<'d, F: FrequencyTimer> TimerTwo<'d, F> {
    pub const fn new(family: F, dispatcher: &'d InterruptDispatcher) -> Self {
        Self {
            family,
            toggle: ToggleController::new(),
            dispatcher,
        }
    }

    /// Program the nearest representable period. 0 is treated as 1 and
    /// periods beyond the hardware range saturate.
    pub fn set_period(&mut self, period_us: u32) {
        let config = F::convert(period_us);
        let toggle = self.toggle.is_enabled();
        critical_section::with(|_| self.family.configure_period(&config, toggle));
    }

    /// Period derived from the registers, which may differ from the last
    /// requested one by up to one quantization step. Before the first
    /// [`set_period`](Self::set_period) this is whatever the reset values imply.
    pub fn period(&self) -> u32 {
        self.family.read_period()
    }

    /// Register `callback` to run from the timer interrupt, or `None` to stop.
    pub fn set_on_overflow(&mut self, callback: Option<fn()>) {
        let dispatcher = self.dispatcher;
        let family = &mut self.family;
        critical_section::with(|cs| {
            if callback.is_some() {
                dispatcher.register(cs, callback);
                family.set_interrupt(true);
            } else {
                // Gate the source before dropping the callback
                family.set_interrupt(false);
                dispatcher.register(cs, None);
            }
        });
    }

    pub fn on_overflow(&self) -> Option<fn()> {
        self.dispatcher.callback()
    }

    /// Drive the output pin from the peripheral on every period boundary.
    pub fn enable(&mut self) {
        let (toggle, family) = (&mut self.toggle, &mut self.family);
        critical_section::with(|_| toggle.enable(family));
    }

    pub fn disable(&mut self) {
        let (toggle, family) = (&mut self.toggle, &mut self.family);
        critical_section::with(|_| toggle.disable(family));
    }

    pub const fn is_enabled(&self) -> bool {
        self.toggle.is_enabled()
    }

    pub const fn family(&self) -> &F {
        &self.family
    }
}

#[cfg(test)]
mod tests {
    use super::{FrequencyTimer, TimerTwo};
    use crate::cmt::{self, Cmt, CmtRegister};
    use crate::dispatch::{Dispatch, InterruptDispatcher};
    use crate::registers::fake::FakeBlock;
    use crate::tc2::{self, Tc2, Tc2Register};
    use std::sync::atomic::{AtomicU32, Ordering};

    type FakeTc2 = Tc2<FakeBlock<Tc2Register, { tc2::REGISTER_COUNT }>, 16>;
    type FakeCmt = Cmt<FakeBlock<CmtRegister, { cmt::REGISTER_COUNT }>, 48>;

    fn tc2_timer(dispatcher: &InterruptDispatcher) -> TimerTwo<'_, FakeTc2> {
        TimerTwo::new(Tc2::new(FakeBlock::new()), dispatcher)
    }

    fn cmt_timer(dispatcher: &InterruptDispatcher) -> TimerTwo<'_, FakeCmt> {
        TimerTwo::new(Cmt::new(FakeBlock::new()), dispatcher)
    }

    fn toggle_bit(timer: &TimerTwo<'_, FakeTc2>) -> bool {
        timer.family().registers().get(Tc2Register::Tccr2a) & tc2::bits::COM2A0 != 0
    }

    #[test]
    fn one_millisecond_at_sixteen_megahertz() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = tc2_timer(&dispatcher);
        timer.set_period(1000);

        let regs = timer.family().registers();
        assert_eq!(regs.get(Tc2Register::Ocr2a), 249);
        assert_eq!(regs.get(Tc2Register::Tccr2b), tc2::Prescaler::Prescale32.bits());
        assert_eq!(timer.period(), 1000);
    }

    #[test]
    fn zero_period_programs_like_one() {
        let dispatcher = InterruptDispatcher::new();
        let mut zero = tc2_timer(&dispatcher);
        let mut one = tc2_timer(&dispatcher);
        zero.set_period(0);
        one.set_period(1);
        assert_eq!(zero.family().registers().values, one.family().registers().values);

        let mut zero = cmt_timer(&dispatcher);
        let mut one = cmt_timer(&dispatcher);
        zero.set_period(0);
        one.set_period(1);
        assert_eq!(zero.family().registers().values, one.family().registers().values);
    }

    #[test]
    fn toggle_mode_survives_period_changes() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = tc2_timer(&dispatcher);
        timer.set_period(500);
        timer.enable();
        assert!(toggle_bit(&timer));

        for period in [1, 250, 1000, 20_000, 1_000_000] {
            timer.set_period(period);
            assert!(timer.is_enabled());
            assert!(toggle_bit(&timer), "toggle lost at {period}us");
        }

        timer.disable();
        for period in [1, 250, 1000, 20_000] {
            timer.set_period(period);
            assert!(!toggle_bit(&timer), "toggle appeared at {period}us");
        }
    }

    #[test]
    fn enable_keeps_ctc_mode() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = tc2_timer(&dispatcher);
        timer.set_period(100);
        timer.enable();
        let mode = timer.family().registers().get(Tc2Register::Tccr2a);
        assert_eq!(mode, tc2::bits::WGM21 | tc2::bits::COM2A0);
        timer.disable();
        let mode = timer.family().registers().get(Tc2Register::Tccr2a);
        assert_eq!(mode, tc2::bits::WGM21);
    }

    #[test]
    fn cmt_toggle_mode_survives_period_changes() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = cmt_timer(&dispatcher);
        timer.enable();
        timer.set_period(2000);
        let oc = timer.family().registers().get(CmtRegister::Oc);
        assert_eq!(oc, cmt::bits::CMTPOL | cmt::bits::IROPEN);

        timer.disable();
        timer.set_period(3000);
        let oc = timer.family().registers().get(CmtRegister::Oc);
        assert_eq!(oc, cmt::bits::CMTPOL);
    }

    static TICKS: AtomicU32 = AtomicU32::new(0);

    fn count_tick() {
        TICKS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn registering_a_callback_gates_the_interrupt() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = tc2_timer(&dispatcher);
        let mask = |timer: &TimerTwo<'_, FakeTc2>| {
            timer.family().registers().get(Tc2Register::Timsk2) & tc2::bits::OCIE2A != 0
        };

        timer.set_on_overflow(Some(count_tick));
        assert!(mask(&timer));
        assert!(timer.on_overflow().is_some());

        let before = TICKS.load(Ordering::SeqCst);
        assert_eq!(dispatcher.dispatch(), Dispatch::Invoked);
        assert_eq!(TICKS.load(Ordering::SeqCst), before + 1);

        timer.set_on_overflow(None);
        assert!(!mask(&timer));
        assert!(timer.on_overflow().is_none());
        assert_eq!(dispatcher.dispatch(), Dispatch::Unregistered);
    }

    #[test]
    fn clearing_the_callback_disables_the_source_first() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = tc2_timer(&dispatcher);
        timer.set_on_overflow(Some(count_tick));
        let writes_before = timer.family().registers().writes.len();
        timer.set_on_overflow(None);
        // The only register touched is the interrupt mask
        let writes = &timer.family().registers().writes[writes_before..];
        assert_eq!(writes, &[(usize::from(Tc2Register::Timsk2), 0)]);
    }

    #[test]
    fn cmt_callback_uses_the_interrupt_line() {
        let dispatcher = InterruptDispatcher::new();
        let mut timer = cmt_timer(&dispatcher);
        timer.set_on_overflow(Some(count_tick));
        assert!(timer.family().registers().line_enabled);
        timer.set_on_overflow(None);
        assert!(!timer.family().registers().line_enabled);
    }

    #[test]
    fn period_reads_live_registers() {
        let dispatcher = InterruptDispatcher::new();
        let mut regs = FakeBlock::new();
        regs.set(Tc2Register::Ocr2a, 124);
        regs.set(Tc2Register::Tccr2b, tc2::Prescaler::Prescale32.bits());
        let timer: TimerTwo<'_, FakeTc2> = TimerTwo::new(Tc2::new(regs), &dispatcher);
        // ((124 + 1) << 6) + 1 = 8001 cycles
        assert_eq!(timer.period(), 500);
        assert_eq!(FakeTc2::convert(500).top, 124);
    }

    #[test]
    fn period_before_any_set_period() {
        let dispatcher = InterruptDispatcher::new();
        // Reset state: clock stopped, OCR2A = 0
        assert_eq!(tc2_timer(&dispatcher).period(), 0);
        assert_eq!(cmt_timer(&dispatcher).period(), 0);

        let mut regs = FakeBlock::new();
        regs.set(Tc2Register::Ocr2a, 255);
        let timer: TimerTwo<'_, FakeTc2> = TimerTwo::new(Tc2::new(regs), &dispatcher);
        // ((255 + 1) << 1) + 1 = 513 cycles
        assert_eq!(timer.period(), 32);
    }

    fn assert_within_max_top<F: FrequencyTimer>() {
        for period in [0, 1, 7, 999, 65_536, 1_000_000, 50_000_000, u32::MAX] {
            assert!(F::convert(period).top <= F::MAX_TOP, "{period}us");
        }
    }

    #[test]
    fn configurations_respect_register_width() {
        assert_within_max_top::<FakeTc2>();
        assert_within_max_top::<FakeCmt>();
        assert_eq!(FakeTc2::MAX_TOP, 255);
        assert_eq!(FakeCmt::MAX_TOP, 65_535);
    }
}
