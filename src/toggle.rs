use crate::timer::FrequencyTimer;

/// Whether the peripheral drives its output pin on compare match.
///
/// The flag is the source of truth: a period change rewrites the mode
/// register from scratch and reads it back from here.
pub struct ToggleController {
    enabled: bool,
}

impl ToggleController {
    pub const fn new() -> Self {
        Self { enabled: false }
    }

    pub fn enable<F: FrequencyTimer>(&mut self, family: &mut F) {
        self.enabled = true;
        family.set_toggle_mode(true);
    }

    pub fn disable<F: FrequencyTimer>(&mut self, family: &mut F) {
        self.enabled = false;
        family.set_toggle_mode(false);
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ToggleController {
    fn default() -> Self {
        Self::new()
    }
}
