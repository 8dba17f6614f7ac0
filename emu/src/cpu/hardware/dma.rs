//! DMA channel registers and control decoding.
//!
//! The transfer engine itself lives on the bus, which owns both the channel
//! state and the memory it moves. Register layout per channel at
//! 0x040000B0 + 12·ch: SAD, DAD, CNT_L (length), CNT_H (control).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// How an internal address advances after each unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    /// Increment during the transfer, then reload the programmed address.
    /// Only valid for the destination.
    IncrementReload,
}

impl AddressControl {
    #[must_use]
    pub const fn delta(self) -> i64 {
        match self {
            Self::Increment | Self::IncrementReload => 1,
            Self::Decrement => -1,
            Self::Fixed => 0,
        }
    }
}

impl From<u16> for AddressControl {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0b00 => Self::Increment,
            0b01 => Self::Decrement,
            0b10 => Self::Fixed,
            0b11 => Self::IncrementReload,
            _ => unreachable!(),
        }
    }
}

/// When a pending (enabled) channel actually runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTiming {
    Immediate,
    VBlank,
    HBlank,
    /// Sound FIFO refill on channels 1/2, video capture on channel 3.
    Special,
}

impl From<u16> for StartTiming {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0b00 => Self::Immediate,
            0b01 => Self::VBlank,
            0b10 => Self::HBlank,
            0b11 => Self::Special,
            _ => unreachable!(),
        }
    }
}

/// External trigger sources forwarded to pending channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaEvent {
    HBlank,
    VBlank,
    /// Sound FIFO refill request; FIFO 0 feeds channel 1, FIFO 1 channel 2.
    Fifo(usize),
}

#[derive(Default, Serialize, Deserialize)]
pub struct DmaChannel {
    /// Programmed source (SAD). 27 bits on channel 0, 28 elsewhere.
    pub source_address: u32,
    /// Programmed destination (DAD). 28 bits on channel 3, 27 elsewhere.
    pub destination_address: u32,
    /// Programmed length (CNT_L). 14 bits, 16 on channel 3; 0 means max.
    pub word_count: u16,
    /// CNT_H.
    pub control: u16,

    /// Latched at the enable edge, advanced by transfers. Not re-latched
    /// across repeats.
    pub internal_source: u32,
    pub internal_destination: u32,
}

impl DmaChannel {
    #[must_use]
    pub fn destination_control(&self) -> AddressControl {
        self.control.get_bits(5..=6).into()
    }

    /// IncrementReload is prohibited for the source; clamp it to Increment
    /// and keep going.
    #[must_use]
    pub fn source_control(&self) -> AddressControl {
        let control = AddressControl::from(self.control.get_bits(7..=8));
        if control == AddressControl::IncrementReload {
            tracing::warn!("DMA source address control 0b11 is prohibited, treating as increment");
            return AddressControl::Increment;
        }

        control
    }

    #[must_use]
    pub fn repeat(&self) -> bool {
        self.control.get_bit(9)
    }

    /// Unit size: false = halfword, true = word.
    #[must_use]
    pub fn transfer_word(&self) -> bool {
        self.control.get_bit(10)
    }

    #[must_use]
    pub fn start_timing(&self) -> StartTiming {
        self.control.get_bits(12..=13).into()
    }

    #[must_use]
    pub fn irq_on_end(&self) -> bool {
        self.control.get_bit(14)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(15)
    }

    pub fn set_enabled(&mut self, value: bool) {
        self.control.set_bit(15, value);
    }

    const fn source_mask(channel: usize) -> u32 {
        if channel == 0 {
            0x07FF_FFFF
        } else {
            0x0FFF_FFFF
        }
    }

    const fn destination_mask(channel: usize) -> u32 {
        if channel == 3 {
            0x0FFF_FFFF
        } else {
            0x07FF_FFFF
        }
    }

    /// Units to move; a programmed length of 0 means the channel maximum.
    #[must_use]
    pub fn length(&self, channel: usize) -> u32 {
        let mask = if channel == 3 { 0xFFFF } else { 0x3FFF };
        let count = u32::from(self.word_count) & mask;
        if count == 0 {
            mask + 1
        } else {
            count
        }
    }

    /// Enable-edge latch of the programmed addresses.
    pub fn latch(&mut self, channel: usize) {
        self.internal_source = self.source_address & Self::source_mask(channel);
        self.internal_destination = self.destination_address & Self::destination_mask(channel);
    }

    /// Destination control 0b11 resets the internal destination after every
    /// transfer.
    pub fn reload_destination(&mut self, channel: usize) {
        self.internal_destination = self.destination_address & Self::destination_mask(channel);
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct Dma {
    pub channels: [DmaChannel; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_field_decoding() {
        let mut channel = DmaChannel::default();
        // dst decrement, src fixed, repeat, word, HBlank timing, irq, enable.
        channel.control = (0b01 << 5) | (0b10 << 7) | (1 << 9) | (1 << 10) | (0b10 << 12)
            | (1 << 14)
            | (1 << 15);

        assert_eq!(channel.destination_control(), AddressControl::Decrement);
        assert_eq!(channel.source_control(), AddressControl::Fixed);
        assert!(channel.repeat());
        assert!(channel.transfer_word());
        assert_eq!(channel.start_timing(), StartTiming::HBlank);
        assert!(channel.irq_on_end());
        assert!(channel.enabled());
    }

    #[test]
    fn prohibited_source_control_is_clamped() {
        let channel = DmaChannel {
            control: 0b11 << 7,
            ..Default::default()
        };

        assert_eq!(channel.source_control(), AddressControl::Increment);
    }

    #[test]
    fn zero_length_means_channel_maximum() {
        let channel = DmaChannel::default();
        assert_eq!(channel.length(0), 0x4000);
        assert_eq!(channel.length(3), 0x1_0000);

        let channel = DmaChannel {
            word_count: 256,
            ..Default::default()
        };
        assert_eq!(channel.length(1), 256);
    }

    #[test]
    fn latch_applies_address_masks() {
        let mut channel = DmaChannel {
            source_address: 0xFFFF_FFFF,
            destination_address: 0xFFFF_FFFF,
            ..Default::default()
        };

        channel.latch(0);
        assert_eq!(channel.internal_source, 0x07FF_FFFF);
        assert_eq!(channel.internal_destination, 0x07FF_FFFF);

        channel.latch(3);
        assert_eq!(channel.internal_source, 0x0FFF_FFFF);
        assert_eq!(channel.internal_destination, 0x0FFF_FFFF);
    }
}
