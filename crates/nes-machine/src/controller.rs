//! Standard controller and Zapper input state.
//!
//! Controllers follow the serial shift protocol on $4016/$4017: eight
//! button reads, eleven zero bits, a one bit for the signature, then
//! padding until the 24-read cycle wraps.

use serde::{Deserialize, Serialize};

/// Button indices in read order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

const RELEASED: u8 = 0x40;
const PRESSED: u8 = 0x41;

/// One standard controller on the serial port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    state: [u8; 8],
    strobe: u8,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: [RELEASED; 8],
            strobe: 0,
        }
    }

    pub fn button_down(&mut self, button: Button) {
        self.state[button as usize] = PRESSED;
    }

    pub fn button_up(&mut self, button: Button) {
        self.state[button as usize] = RELEASED;
    }

    /// Rewind the shift register to the first button.
    pub fn reset_strobe(&mut self) {
        self.strobe = 0;
    }

    /// Shift out the next serial bit.
    pub fn read(&mut self) -> u8 {
        let ret = match self.strobe {
            0..=7 => self.state[usize::from(self.strobe)],
            19 => 1,
            _ => 0,
        };

        self.strobe += 1;
        if self.strobe == 24 {
            self.strobe = 0;
        }

        ret
    }
}

/// Zapper light gun state, reported through $4017.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Zapper {
    /// Screen position the gun points at, if any.
    pub pos: Option<(usize, usize)>,
    /// Trigger currently pulled.
    pub fired: bool,
}

impl Zapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_protocol_shifts_buttons_then_signature() {
        let mut pad = Controller::new();
        pad.button_down(Button::A);
        pad.button_down(Button::Start);

        let mut bits = Vec::new();
        for _ in 0..24 {
            bits.push(pad.read());
        }

        assert_eq!(bits[0], 0x41); // A pressed
        assert_eq!(bits[1], 0x40); // B released
        assert_eq!(bits[3], 0x41); // Start pressed
        assert!(bits[8..19].iter().all(|&b| b == 0));
        assert_eq!(bits[19], 1);
        assert!(bits[20..24].iter().all(|&b| b == 0));

        // Cycle wraps back to the buttons.
        assert_eq!(pad.read(), 0x41);
    }

    #[test]
    fn strobe_reset_rewinds_to_first_button() {
        let mut pad = Controller::new();
        pad.button_down(Button::B);
        pad.read();
        pad.read();
        pad.reset_strobe();
        pad.read();
        assert_eq!(pad.read(), 0x41); // B again
    }

    #[test]
    fn button_up_clears_state() {
        let mut pad = Controller::new();
        pad.button_down(Button::Left);
        pad.button_up(Button::Left);
        for _ in 0..8 {
            assert_eq!(pad.read(), 0x40);
        }
    }
}
