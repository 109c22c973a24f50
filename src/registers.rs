//! Byte-wide register access shared by both timer families.
//!
//! Each family names its registers with a small enum and provides one
//! [`RegisterBlock`] for the real peripheral. Everything above this layer,
//! the period converters included, only talks to the trait.

/// Read/modify/write surface over a fixed set of 8-bit peripheral registers.
pub trait RegisterBlock {
    type Register: Copy;

    fn read(&self, register: Self::Register) -> u8;

    fn write(&mut self, register: Self::Register, value: u8);

    fn modify(&mut self, register: Self::Register, f: impl FnOnce(u8) -> u8) {
        let value = self.read(register);
        self.write(register, f(value));
    }

    /// Set or clear `mask` in `register`, leaving the other bits alone.
    fn set_bits(&mut self, register: Self::Register, mask: u8, set: bool) {
        self.modify(register, |value| {
            if set {
                value | mask
            } else {
                value & !mask
            }
        });
    }
}

/// Interrupt gate that lives outside the timer's own register block (the NVIC on Kinetis).
pub trait InterruptLine {
    fn enable(&mut self);
    fn disable(&mut self);
}

#[cfg(test)]
pub mod fake {
    use super::{InterruptLine, RegisterBlock};
    use core::cell::RefCell;
    use core::marker::PhantomData;

    /// In-memory register file used by the host tests.
    pub struct FakeBlock<R, const N: usize> {
        pub values: [u8; N],
        pub writes: Vec<(usize, u8)>,
        pub reads: RefCell<Vec<usize>>,
        pub line_enabled: bool,
        _register: PhantomData<R>,
    }

    impl<R, const N: usize> FakeBlock<R, N> {
        pub fn new() -> Self {
            Self {
                values: [0; N],
                writes: Vec::new(),
                reads: RefCell::new(Vec::new()),
                line_enabled: false,
                _register: PhantomData,
            }
        }
    }

    impl<R: Copy + Into<usize>, const N: usize> FakeBlock<R, N> {
        pub fn get(&self, register: R) -> u8 {
            self.values[register.into()]
        }

        pub fn set(&mut self, register: R, value: u8) {
            self.values[register.into()] = value;
        }
    }

    impl<R: Copy + Into<usize>, const N: usize> RegisterBlock for FakeBlock<R, N> {
        type Register = R;

        fn read(&self, register: R) -> u8 {
            self.reads.borrow_mut().push(register.into());
            self.values[register.into()]
        }

        fn write(&mut self, register: R, value: u8) {
            self.writes.push((register.into(), value));
            self.values[register.into()] = value;
        }
    }

    impl<R, const N: usize> InterruptLine for FakeBlock<R, N> {
        fn enable(&mut self) {
            self.line_enabled = true;
        }

        fn disable(&mut self) {
            self.line_enabled = false;
        }
    }

    mod tests {
        use super::FakeBlock;
        use crate::registers::RegisterBlock;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Reg(usize);

        impl From<Reg> for usize {
            fn from(reg: Reg) -> Self {
                reg.0
            }
        }

        #[test]
        fn set_bits_only_touches_the_mask() {
            let mut block = FakeBlock::<Reg, 2>::new();
            block.set(Reg(1), 0b1000_0001);
            block.set_bits(Reg(1), 0b0100_0000, true);
            assert_eq!(block.get(Reg(1)), 0b1100_0001);
            block.set_bits(Reg(1), 0b1000_0000, false);
            assert_eq!(block.get(Reg(1)), 0b0100_0001);
            assert_eq!(block.get(Reg(0)), 0);
        }
    }
}
