//! The memory bus.
//!
//! Every 8/16/32-bit access is decoded here: the top byte of the address
//! picks the region (BIOS, work RAM, I/O, palette, VRAM, OAM, gamepak),
//! I/O accesses fan out to per-register byte handlers, and the wider
//! accesses are synthesized from byte handlers in little-endian order.
//!
//! The bus also owns the scheduler and every hardware block, so scheduler
//! events and DMA transfers are dispatched from here.

use std::collections::HashMap;

use logger::log;

use crate::bitwise::Bits;
use crate::cpu::hardware::dma::{AddressControl, Dma, DmaEvent, StartTiming};
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::interrupt_control::{Interrupt, InterruptControl};
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::{self, Lcd};
use crate::cpu::hardware::timers::Timers;
use crate::scheduler::{EventKind, Scheduler};

pub struct Bus {
    pub internal_memory: InternalMemory,
    pub lcd: Lcd,
    pub dma: Dma,
    pub timers: Timers,
    pub keypad: Keypad,
    pub interrupt_control: InterruptControl,
    pub scheduler: Scheduler,

    /// Bus cycles consumed by DMA since the CPU last advanced the clock.
    pending_dma_cycles: u64,

    /// I/O addresses nothing decodes; written values are remembered so
    /// reads stay consistent.
    unused_region: HashMap<usize, u8>,
}

impl Default for Bus {
    fn default() -> Self {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(lcd::HDRAW_CYCLES, EventKind::HBlankStart);
        scheduler.schedule(lcd::LINE_CYCLES, EventKind::LineEnd);

        Self {
            internal_memory: InternalMemory::default(),
            lcd: Lcd::default(),
            dma: Dma::default(),
            timers: Timers::default(),
            keypad: Keypad::default(),
            interrupt_control: InterruptControl::default(),
            scheduler,
            pending_dma_cycles: 0,
            unused_region: HashMap::new(),
        }
    }
}

impl Bus {
    pub fn with_memory(memory: InternalMemory) -> Self {
        Self {
            internal_memory: memory,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // I/O register byte handlers
    // ------------------------------------------------------------------

    fn read_lcd_raw(&self, address: usize) -> u8 {
        match address {
            0x0400_0000 => self.lcd.dispcnt.get_byte(0),
            0x0400_0001 => self.lcd.dispcnt.get_byte(1),
            0x0400_0002 => self.lcd.green_swap.get_byte(0),
            0x0400_0003 => self.lcd.green_swap.get_byte(1),
            0x0400_0004 => self.lcd.dispstat.get_byte(0),
            0x0400_0005 => self.lcd.dispstat.get_byte(1),
            0x0400_0006 => self.lcd.vcount.get_byte(0),
            0x0400_0007 => self.lcd.vcount.get_byte(1),
            _ => {
                log(format!("read on unused LCD register {address:#010X}"));
                self.unused_region.get(&address).map_or(0, |v| *v)
            }
        }
    }

    fn write_lcd_raw(&mut self, address: usize, value: u8) {
        match address {
            0x0400_0000 => self.lcd.dispcnt.set_byte(0, value),
            0x0400_0001 => self.lcd.dispcnt.set_byte(1, value),
            0x0400_0002 => self.lcd.green_swap.set_byte(0, value),
            0x0400_0003 => self.lcd.green_swap.set_byte(1, value),
            0x0400_0004 => {
                // Bits 0-2 of DISPSTAT are hardware status, not writable.
                let flags = self.lcd.dispstat & 0b111;
                self.lcd.dispstat = (self.lcd.dispstat & !0xFF) | u16::from(value & 0xF8) | flags;
            }
            0x0400_0005 => self.lcd.dispstat.set_byte(1, value),
            0x0400_0006 | 0x0400_0007 => {
                log(format!("write on read-only VCOUNT {address:#010X}"));
            }
            _ => {
                log(format!("write on unused LCD register {address:#010X}"));
                self.unused_region.insert(address, value);
            }
        }
    }

    fn read_dma_raw(&self, address: usize) -> u8 {
        let (channel, offset) = match address {
            0x0400_00B0..=0x0400_00BB => (&self.dma.channels[0], address - 0x0400_00B0),
            0x0400_00BC..=0x0400_00C7 => (&self.dma.channels[1], address - 0x0400_00BC),
            0x0400_00C8..=0x0400_00D3 => (&self.dma.channels[2], address - 0x0400_00C8),
            0x0400_00D4..=0x0400_00DF => (&self.dma.channels[3], address - 0x0400_00D4),
            _ => {
                log(format!("read on unused DMA register {address:#010X}"));
                return self.unused_region.get(&address).map_or(0, |v| *v);
            }
        };

        match offset {
            // SAD/DAD/CNT_L are write-only; reads see the open bus.
            0..=9 => 0,
            10 => channel.control.get_byte(0),
            11 => channel.control.get_byte(1),
            _ => unreachable!(),
        }
    }

    fn write_dma_raw(&mut self, address: usize, value: u8) {
        let (channel_idx, offset) = match address {
            0x0400_00B0..=0x0400_00BB => (0, address - 0x0400_00B0),
            0x0400_00BC..=0x0400_00C7 => (1, address - 0x0400_00BC),
            0x0400_00C8..=0x0400_00D3 => (2, address - 0x0400_00C8),
            0x0400_00D4..=0x0400_00DF => (3, address - 0x0400_00D4),
            _ => {
                log(format!("write on unused DMA register {address:#010X}"));
                self.unused_region.insert(address, value);
                return;
            }
        };

        let channel = &mut self.dma.channels[channel_idx];
        match offset {
            0..=3 => channel.source_address.set_byte(offset as u8, value),
            4..=7 => channel.destination_address.set_byte((offset - 4) as u8, value),
            8 | 9 => channel.word_count.set_byte((offset - 8) as u8, value),
            10 => channel.control.set_byte(0, value),
            11 => {
                let was_enabled = channel.enabled();
                channel.control.set_byte(1, value);

                // The internal addresses latch on the 0->1 edge only; a
                // repeat keeps transferring from where it stopped.
                if !was_enabled && channel.enabled() {
                    channel.latch(channel_idx);
                    if channel.start_timing() == StartTiming::Immediate {
                        self.dma_transfer(channel_idx);
                    }
                }
            }
            _ => unreachable!(),
        }
    }

    fn read_timers_raw(&self, address: usize) -> u8 {
        let timers = &self.timers.timers;
        match address {
            0x0400_0100 => timers[0].counter.get_byte(0),
            0x0400_0101 => timers[0].counter.get_byte(1),
            0x0400_0102 => timers[0].control.get_byte(0),
            0x0400_0103 => timers[0].control.get_byte(1),
            0x0400_0104 => timers[1].counter.get_byte(0),
            0x0400_0105 => timers[1].counter.get_byte(1),
            0x0400_0106 => timers[1].control.get_byte(0),
            0x0400_0107 => timers[1].control.get_byte(1),
            0x0400_0108 => timers[2].counter.get_byte(0),
            0x0400_0109 => timers[2].counter.get_byte(1),
            0x0400_010A => timers[2].control.get_byte(0),
            0x0400_010B => timers[2].control.get_byte(1),
            0x0400_010C => timers[3].counter.get_byte(0),
            0x0400_010D => timers[3].counter.get_byte(1),
            0x0400_010E => timers[3].control.get_byte(0),
            0x0400_010F => timers[3].control.get_byte(1),
            _ => {
                log(format!("read on unused timer register {address:#010X}"));
                self.unused_region.get(&address).map_or(0, |v| *v)
            }
        }
    }

    fn write_timers_raw(&mut self, address: usize, value: u8) {
        match address {
            0x0400_0100 => self.timers.timers[0].reload.set_byte(0, value),
            0x0400_0101 => self.timers.timers[0].reload.set_byte(1, value),
            0x0400_0102 => self.write_timer_control(0, value),
            0x0400_0103 => self.timers.timers[0].control.set_byte(1, value),
            0x0400_0104 => self.timers.timers[1].reload.set_byte(0, value),
            0x0400_0105 => self.timers.timers[1].reload.set_byte(1, value),
            0x0400_0106 => self.write_timer_control(1, value),
            0x0400_0107 => self.timers.timers[1].control.set_byte(1, value),
            0x0400_0108 => self.timers.timers[2].reload.set_byte(0, value),
            0x0400_0109 => self.timers.timers[2].reload.set_byte(1, value),
            0x0400_010A => self.write_timer_control(2, value),
            0x0400_010B => self.timers.timers[2].control.set_byte(1, value),
            0x0400_010C => self.timers.timers[3].reload.set_byte(0, value),
            0x0400_010D => self.timers.timers[3].reload.set_byte(1, value),
            0x0400_010E => self.write_timer_control(3, value),
            0x0400_010F => self.timers.timers[3].control.set_byte(1, value),
            _ => {
                log(format!("write on unused timer register {address:#010X}"));
                self.unused_region.insert(address, value);
            }
        }
    }

    /// TMxCNT_H low byte. A 0->1 enable edge reloads the counter and arms
    /// the overflow event; cascaded timers are driven by their predecessor
    /// instead.
    fn write_timer_control(&mut self, id: usize, value: u8) {
        let was_enabled = self.timers.timers[id].enabled();
        self.timers.timers[id].control.set_byte(0, value);

        let timer = &mut self.timers.timers[id];
        if !was_enabled && timer.enabled() {
            timer.counter = timer.reload;
            if timer.cascade() {
                timer.overflow_at = None;
            } else {
                let cycles = timer.cycles_until_overflow();
                timer.overflow_at = Some(self.scheduler.current_cycle() + cycles);
                self.scheduler.schedule(cycles, EventKind::TimerOverflow(id));
            }
        } else if was_enabled && !timer.enabled() {
            // Any in-flight overflow event is now stale.
            timer.overflow_at = None;
        }
    }

    fn read_keypad_raw(&self, address: usize) -> u8 {
        match address {
            0x0400_0130 => self.keypad.key_input.get_byte(0),
            0x0400_0131 => self.keypad.key_input.get_byte(1),
            0x0400_0132 => self.keypad.key_interrupt_control.get_byte(0),
            0x0400_0133 => self.keypad.key_interrupt_control.get_byte(1),
            _ => unreachable!(),
        }
    }

    fn write_keypad_raw(&mut self, address: usize, value: u8) {
        match address {
            // KEYINPUT should be read-only but the BIOS writes it.
            0x0400_0130 => self.keypad.key_input.set_byte(0, value),
            0x0400_0131 => self.keypad.key_input.set_byte(1, value),
            0x0400_0132 => self.keypad.key_interrupt_control.set_byte(0, value),
            0x0400_0133 => self.keypad.key_interrupt_control.set_byte(1, value),
            _ => unreachable!(),
        }
    }

    fn read_interrupt_control_raw(&self, address: usize) -> u8 {
        let control = &self.interrupt_control;
        match address {
            0x0400_0200 => control.interrupt_enable.get_byte(0),
            0x0400_0201 => control.interrupt_enable.get_byte(1),
            0x0400_0202 => control.interrupt_request.get_byte(0),
            0x0400_0203 => control.interrupt_request.get_byte(1),
            0x0400_0204 => control.wait_state_control.get_byte(0),
            0x0400_0205 => control.wait_state_control.get_byte(1),
            0x0400_0208 => control.interrupt_master_enable.get_byte(0),
            0x0400_0209 => control.interrupt_master_enable.get_byte(1),
            0x0400_0300 => control.post_boot_flag,
            // HALTCNT is write-only.
            0x0400_0301 => 0,
            _ => match address & 0xFFFF {
                // The internal memory control mirrors every 64 KiB.
                0x0800 => control.internal_memory_control.get_byte(0),
                0x0801 => control.internal_memory_control.get_byte(1),
                0x0802 => control.internal_memory_control.get_byte(2),
                0x0803 => control.internal_memory_control.get_byte(3),
                _ => {
                    log(format!("read on unused memory {address:#010X}"));
                    self.unused_region.get(&address).map_or(0, |v| *v)
                }
            },
        }
    }

    fn write_interrupt_control_raw(&mut self, address: usize, value: u8) {
        let control = &mut self.interrupt_control;
        match address {
            0x0400_0200 => control.interrupt_enable.set_byte(0, value),
            0x0400_0201 => control.interrupt_enable.set_byte(1, value),
            // IF acknowledges by writing 1s.
            0x0400_0202 => control.acknowledge(u16::from(value)),
            0x0400_0203 => control.acknowledge(u16::from(value) << 8),
            0x0400_0204 => control.wait_state_control.set_byte(0, value),
            0x0400_0205 => control.wait_state_control.set_byte(1, value),
            0x0400_0208 => control.interrupt_master_enable.set_byte(0, value),
            0x0400_0209 => control.interrupt_master_enable.set_byte(1, value),
            0x0400_0300 => control.post_boot_flag = value,
            0x0400_0301 => {
                // HALTCNT: bit 7 clear = halt, set = stop. Both park the
                // CPU until an enabled interrupt arrives.
                control.power_down_control = value;
                control.request_halt();
            }
            _ => match address & 0xFFFF {
                0x0800 => control.internal_memory_control.set_byte(0, value),
                0x0801 => control.internal_memory_control.set_byte(1, value),
                0x0802 => control.internal_memory_control.set_byte(2, value),
                0x0803 => control.internal_memory_control.set_byte(3, value),
                _ => {
                    log(format!("write on unused memory {address:#010X}"));
                    self.unused_region.insert(address, value);
                }
            },
        }
    }

    fn read_io_raw(&self, address: usize) -> u8 {
        match address {
            0x0400_0000..=0x0400_005F => self.read_lcd_raw(address),
            // Sound block: out of scope, only the written bytes survive so
            // the DMA FIFO ports stay readable/writable.
            0x0400_0060..=0x0400_00AF => {
                self.unused_region.get(&address).map_or(0, |v| *v)
            }
            0x0400_00B0..=0x0400_00FF => self.read_dma_raw(address),
            0x0400_0100..=0x0400_011F => self.read_timers_raw(address),
            // Serial block: out of scope.
            0x0400_0120..=0x0400_012F | 0x0400_0134..=0x0400_01FF => {
                self.unused_region.get(&address).map_or(0, |v| *v)
            }
            0x0400_0130..=0x0400_0133 => self.read_keypad_raw(address),
            0x0400_0200..=0x04FF_FFFF => self.read_interrupt_control_raw(address),
            _ => unreachable!(),
        }
    }

    fn write_io_raw(&mut self, address: usize, value: u8) {
        match address {
            0x0400_0000..=0x0400_005F => self.write_lcd_raw(address, value),
            0x0400_0060..=0x0400_00AF => {
                self.unused_region.insert(address, value);
            }
            0x0400_00B0..=0x0400_00FF => self.write_dma_raw(address, value),
            0x0400_0100..=0x0400_011F => self.write_timers_raw(address, value),
            0x0400_0120..=0x0400_012F | 0x0400_0134..=0x0400_01FF => {
                self.unused_region.insert(address, value);
            }
            0x0400_0130..=0x0400_0133 => self.write_keypad_raw(address, value),
            0x0400_0200..=0x04FF_FFFF => self.write_interrupt_control_raw(address, value),
            _ => unreachable!(),
        }
    }

    // ------------------------------------------------------------------
    // Region dispatch
    // ------------------------------------------------------------------

    fn read_raw(&self, address: usize) -> u8 {
        match address {
            0x0400_0000..=0x04FF_FFFF => self.read_io_raw(address),
            0x0500_0000..=0x05FF_FFFF => self.lcd.palette_ram[Lcd::palette_index(address)],
            0x0600_0000..=0x06FF_FFFF => self.lcd.video_ram[Lcd::vram_index(address)],
            0x0700_0000..=0x07FF_FFFF => self.lcd.obj_attributes[Lcd::oam_index(address)],
            _ => self.internal_memory.read_at(address),
        }
    }

    fn write_raw(&mut self, address: usize, value: u8) {
        match address {
            0x0400_0000..=0x04FF_FFFF => self.write_io_raw(address, value),
            0x0500_0000..=0x05FF_FFFF => {
                self.lcd.palette_ram[Lcd::palette_index(address)] = value;
            }
            0x0600_0000..=0x06FF_FFFF => {
                self.lcd.video_ram[Lcd::vram_index(address)] = value;
            }
            0x0700_0000..=0x07FF_FFFF => {
                self.lcd.obj_attributes[Lcd::oam_index(address)] = value;
            }
            _ => self.internal_memory.write_at(address, value),
        }
    }

    // ------------------------------------------------------------------
    // Public access API
    // ------------------------------------------------------------------

    pub fn read_byte(&self, address: usize) -> u8 {
        self.read_raw(address)
    }

    /// The 16-bit video memories cannot latch a single byte: palette and
    /// VRAM byte writes are doubled into both bytes of the halfword, OAM
    /// byte writes are dropped.
    pub fn write_byte(&mut self, address: usize, value: u8) {
        match address {
            0x0500_0000..=0x06FF_FFFF => {
                let aligned = address & !1;
                self.write_raw(aligned, value);
                self.write_raw(aligned + 1, value);
            }
            0x0700_0000..=0x07FF_FFFF => {
                log(format!("dropped byte write to OAM {address:#010X}"));
            }
            _ => self.write_raw(address, value),
        }
    }

    pub fn read_half_word(&self, address: usize) -> u16 {
        if address & 1 != 0 {
            log("warning, read_half_word has address not half-word aligned");
        }
        let address = address & !1;

        let part_0 = u16::from(self.read_raw(address));
        let part_1 = u16::from(self.read_raw(address + 1));

        part_1 << 8 | part_0
    }

    pub fn write_half_word(&mut self, address: usize, value: u16) {
        if address & 1 != 0 {
            log("warning, write_half_word has address not half-word aligned");
        }
        let address = address & !1;

        self.write_raw(address, value.get_byte(0));
        self.write_raw(address + 1, value.get_byte(1));
    }

    pub fn read_word(&self, address: usize) -> u32 {
        if address & 3 != 0 {
            log("warning, read_word has address not word aligned");
        }
        let address = address & !3;

        let part_0 = u32::from(self.read_raw(address));
        let part_1 = u32::from(self.read_raw(address + 1));
        let part_2 = u32::from(self.read_raw(address + 2));
        let part_3 = u32::from(self.read_raw(address + 3));

        part_3 << 24 | part_2 << 16 | part_1 << 8 | part_0
    }

    pub fn write_word(&mut self, address: usize, value: u32) {
        if address & 3 != 0 {
            log("warning, write_word has address not word aligned");
        }
        let address = address & !3;

        self.write_raw(address, value.get_byte(0));
        self.write_raw(address + 1, value.get_byte(1));
        self.write_raw(address + 2, value.get_byte(2));
        self.write_raw(address + 3, value.get_byte(3));
    }

    /// LDR from a misaligned address: the aligned word rotated right by
    /// 8 bits per byte of misalignment.
    pub fn read_word_rotate(&self, address: usize) -> u32 {
        let rotation = (address & 3) as u32 * 8;

        self.read_word(address).rotate_right(rotation)
    }

    /// LDRH from an odd address: the aligned halfword rotated right by 8.
    pub fn read_half_rotate(&self, address: usize) -> u32 {
        let value = u32::from(self.read_half_word(address));
        if address & 1 != 0 {
            value.rotate_right(8)
        } else {
            value
        }
    }

    /// LDRSH from an odd address sign-extends the high byte only.
    pub fn read_half_signed(&self, address: usize) -> u32 {
        if address & 1 != 0 {
            self.read_byte(address) as i8 as i32 as u32
        } else {
            self.read_half_word(address) as i16 as i32 as u32
        }
    }

    // ------------------------------------------------------------------
    // Scheduler and events
    // ------------------------------------------------------------------

    /// Advance the clock and run everything that came due. Handlers may
    /// schedule new events; those are honored within the same drain when
    /// already due.
    pub fn tick(&mut self, cycles: u64) {
        self.scheduler.tick(cycles);
        while let Some((kind, due)) = self.scheduler.pop_due() {
            self.handle_event(kind, due);
        }
    }

    /// Bus cycles spent on DMA since the last call; the CPU folds them
    /// into its own clock advancement so events never fire mid-transfer.
    pub fn take_pending_dma_cycles(&mut self) -> u64 {
        std::mem::take(&mut self.pending_dma_cycles)
    }

    /// Re-arm a periodic event without accumulating drift: the next due
    /// cycle is measured from the previous one, not from now.
    fn schedule_from(&mut self, previous_due: u64, period: u64, kind: EventKind) {
        let from_now = (previous_due + period).saturating_sub(self.scheduler.current_cycle());
        self.scheduler.schedule(from_now, kind);
    }

    fn handle_event(&mut self, kind: EventKind, due: u64) {
        match kind {
            EventKind::HBlankStart => {
                self.lcd.set_hblank_flag(true);
                if self.lcd.hblank_irq_enabled() {
                    self.interrupt_control.request(Interrupt::HBlank);
                }
                // HBlank DMA only runs on visible lines.
                if self.lcd.vcount < lcd::VBLANK_LINE {
                    self.dma_trigger(DmaEvent::HBlank);
                }
                self.schedule_from(due, lcd::LINE_CYCLES, EventKind::HBlankStart);
            }
            EventKind::LineEnd => {
                self.lcd.set_hblank_flag(false);
                self.lcd.vcount += 1;
                if self.lcd.vcount == lcd::LINES_PER_FRAME {
                    self.lcd.vcount = 0;
                    self.lcd.set_vblank_flag(false);
                }

                let vcount_match = self.lcd.vcount == self.lcd.vcount_setting();
                self.lcd.set_vcount_flag(vcount_match);
                if vcount_match && self.lcd.vcount_irq_enabled() {
                    self.interrupt_control.request(Interrupt::VCount);
                }

                if self.lcd.vcount == lcd::VBLANK_LINE {
                    self.lcd.set_vblank_flag(true);
                    if self.lcd.vblank_irq_enabled() {
                        self.interrupt_control.request(Interrupt::VBlank);
                    }
                    self.dma_trigger(DmaEvent::VBlank);
                }

                self.schedule_from(due, lcd::LINE_CYCLES, EventKind::LineEnd);
            }
            EventKind::TimerOverflow(id) => self.handle_timer_overflow(id, due),
        }
    }

    fn handle_timer_overflow(&mut self, id: usize, due: u64) {
        {
            let timer = &self.timers.timers[id];
            // Stale event: the timer was reprogrammed after scheduling.
            if !timer.enabled() || timer.overflow_at != Some(due) {
                return;
            }
        }

        self.timer_overflowed(id);

        let timer = &mut self.timers.timers[id];
        let next_due = due + timer.cycles_until_overflow();
        timer.overflow_at = Some(next_due);
        let from_now = next_due.saturating_sub(self.scheduler.current_cycle());
        self.scheduler.schedule(from_now, EventKind::TimerOverflow(id));
    }

    /// Reload, raise the IRQ if asked, and feed the next timer when it
    /// counts cascades.
    fn timer_overflowed(&mut self, id: usize) {
        let timer = &mut self.timers.timers[id];
        timer.counter = timer.reload;
        let irq = timer.irq_enabled();
        if irq {
            self.interrupt_control.request(Interrupt::timer(id));
        }

        if id < 3 {
            let next = &mut self.timers.timers[id + 1];
            if next.enabled() && next.cascade() && next.increment() {
                self.timer_overflowed(id + 1);
            }
        }
    }

    // ------------------------------------------------------------------
    // DMA engine
    // ------------------------------------------------------------------

    /// Run every enabled channel waiting on this start condition. FIFO
    /// requests map onto channels 1/2 with Special timing.
    pub fn dma_trigger(&mut self, event: DmaEvent) {
        for idx in 0..self.dma.channels.len() {
            let channel = &self.dma.channels[idx];
            if !channel.enabled() {
                continue;
            }

            let matches = match event {
                DmaEvent::HBlank => channel.start_timing() == StartTiming::HBlank,
                DmaEvent::VBlank => channel.start_timing() == StartTiming::VBlank,
                DmaEvent::Fifo(fifo) => {
                    channel.start_timing() == StartTiming::Special && idx == fifo + 1
                }
            };

            if matches {
                self.dma_transfer(idx);
            }
        }
    }

    fn dma_transfer(&mut self, channel_idx: usize) {
        let (mut source, mut destination, length, word_transfer, delta_source, delta_destination) = {
            let channel = &self.dma.channels[channel_idx];

            // Sound FIFO refills ignore the programmed geometry: four
            // words into a fixed destination.
            let fifo = channel.start_timing() == StartTiming::Special
                && (channel_idx == 1 || channel_idx == 2);

            let word_transfer = fifo || channel.transfer_word();
            let length = if fifo { 4 } else { channel.length(channel_idx) };
            let destination_control = if fifo {
                AddressControl::Fixed
            } else {
                channel.destination_control()
            };

            let unit: i64 = if word_transfer { 4 } else { 2 };
            (
                channel.internal_source,
                channel.internal_destination,
                length,
                word_transfer,
                (unit * channel.source_control().delta()) as i32,
                (unit * destination_control.delta()) as i32,
            )
        };

        for _ in 0..length {
            if word_transfer {
                let value = self.read_word(source as usize);
                self.write_word(destination as usize, value);
            } else {
                let value = self.read_half_word(source as usize);
                self.write_half_word(destination as usize, value);
            }
            source = source.wrapping_add_signed(delta_source);
            destination = destination.wrapping_add_signed(delta_destination);
        }

        // One read plus one write per unit, plus setup; the CPU folds this
        // into the clock after the transfer completes.
        self.pending_dma_cycles += u64::from(length) * 2 + 2;

        let channel = &mut self.dma.channels[channel_idx];
        channel.internal_source = source;
        channel.internal_destination = destination;
        if channel.destination_control() == AddressControl::IncrementReload {
            channel.reload_destination(channel_idx);
        }

        let repeating =
            channel.repeat() && channel.start_timing() != StartTiming::Immediate;
        if !repeating {
            channel.set_enabled(false);
        }
        let irq = channel.irq_on_end();

        if irq {
            self.interrupt_control.request(Interrupt::dma(channel_idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn half_word_rotation_on_odd_address() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0300_0010, 0xABCD);

        assert_eq!(bus.read_half_rotate(0x0300_0010), 0xABCD);
        assert_eq!(
            bus.read_half_rotate(0x0300_0011),
            u32::from(bus.read_half_word(0x0300_0010)).rotate_right(8)
        );
        assert_eq!(bus.read_half_rotate(0x0300_0011), 0xCD00_00AB);
    }

    #[test]
    fn word_rotation_on_misaligned_address() {
        let mut bus = Bus::default();
        bus.write_word(0x0300_0020, 0x1122_3344);

        assert_eq!(bus.read_word_rotate(0x0300_0020), 0x1122_3344);
        assert_eq!(bus.read_word_rotate(0x0300_0021), 0x4411_2233);
        assert_eq!(bus.read_word_rotate(0x0300_0022), 0x3344_1122);
        assert_eq!(bus.read_word_rotate(0x0300_0023), 0x2233_4411);
    }

    #[test]
    fn signed_half_reads() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0300_0030, 0x80FE);

        // Even address: the halfword is sign-extended.
        assert_eq!(bus.read_half_signed(0x0300_0030), 0xFFFF_80FE);
        // Odd address: only the high byte is sign-extended.
        assert_eq!(bus.read_half_signed(0x0300_0031), 0xFFFF_FF80);
    }

    #[test]
    fn palette_byte_writes_fill_the_halfword() {
        let mut bus = Bus::default();

        bus.write_byte(0x0500_0003, 0x12);
        assert_eq!(bus.read_half_word(0x0500_0002), 0x1212);

        bus.write_byte(0x0600_0001, 0x34);
        assert_eq!(bus.read_half_word(0x0600_0000), 0x3434);
    }

    #[test]
    fn oam_byte_writes_are_dropped() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0700_0000, 0x5678);

        bus.write_byte(0x0700_0000, 0xFF);
        assert_eq!(bus.read_half_word(0x0700_0000), 0x5678);
    }

    #[test]
    fn interrupt_flags_acknowledge_by_writing_ones() {
        let mut bus = Bus::default();
        bus.interrupt_control.request(Interrupt::VBlank);
        bus.interrupt_control.request(Interrupt::Timer0);

        assert_eq!(bus.read_half_word(0x0400_0202), 0b1001);

        bus.write_half_word(0x0400_0202, Interrupt::VBlank.mask());
        assert_eq!(bus.read_half_word(0x0400_0202), Interrupt::Timer0.mask());
    }

    #[test]
    fn dma_immediate_transfer_copies_and_disables() {
        let mut bus = Bus::default();
        for i in 0..1024_usize {
            bus.write_byte(0x0200_0000 + i, (i & 0xFF) as u8);
        }

        bus.write_word(0x0400_00B0, 0x0200_0000); // SAD
        bus.write_word(0x0400_00B4, 0x0200_1000); // DAD
        bus.write_half_word(0x0400_00B8, 256); // CNT_L
        // word transfer, immediate timing, enable.
        bus.write_half_word(0x0400_00BA, (1 << 10) | (1 << 15));

        for i in 0..1024_usize {
            assert_eq!(bus.read_byte(0x0200_1000 + i), (i & 0xFF) as u8);
        }

        let channel = &bus.dma.channels[0];
        assert!(!channel.enabled());
        assert_eq!(channel.internal_source, 0x0200_0000 + 1024);
        assert_eq!(channel.internal_destination, 0x0200_1000 + 1024);
        assert!(bus.take_pending_dma_cycles() > 0);
    }

    #[test]
    fn dma_hblank_repeat_keeps_enable_and_latch() {
        let mut bus = Bus::default();
        bus.write_word(0x0400_00BC, 0x0200_0000);
        bus.write_word(0x0400_00C0, 0x0200_2000);
        bus.write_half_word(0x0400_00C4, 4);
        // halfword transfer, repeat, HBlank timing, enable.
        bus.write_half_word(0x0400_00C6, (1 << 9) | (0b10 << 12) | (1 << 15));

        // Enable edge alone must not transfer.
        assert_eq!(bus.dma.channels[1].internal_source, 0x0200_0000);

        bus.dma_trigger(DmaEvent::HBlank);
        let channel = &bus.dma.channels[1];
        assert!(channel.enabled());
        assert_eq!(channel.internal_source, 0x0200_0000 + 8);

        // The internal source carries over to the next trigger.
        bus.dma_trigger(DmaEvent::HBlank);
        assert_eq!(bus.dma.channels[1].internal_source, 0x0200_0000 + 16);
    }

    #[test]
    fn dma_increment_reload_resets_destination() {
        let mut bus = Bus::default();
        bus.write_word(0x0400_00C8, 0x0200_0000);
        bus.write_word(0x0400_00CC, 0x0200_3000);
        bus.write_half_word(0x0400_00D0, 4);
        // dst IncrementReload, repeat, VBlank timing, enable.
        bus.write_half_word(
            0x0400_00D2,
            (0b11 << 5) | (1 << 9) | (0b01 << 12) | (1 << 15),
        );

        bus.dma_trigger(DmaEvent::VBlank);
        let channel = &bus.dma.channels[2];
        assert!(channel.enabled());
        assert_eq!(channel.internal_destination, 0x0200_3000);
        assert_eq!(channel.internal_source, 0x0200_0000 + 8);
    }

    #[test]
    fn dma_fifo_forces_four_fixed_words() {
        let mut bus = Bus::default();
        for i in 0..16_usize {
            bus.write_byte(0x0200_0100 + i, i as u8);
        }

        bus.write_word(0x0400_00BC, 0x0200_0100); // SAD, channel 1
        bus.write_word(0x0400_00C0, 0x0400_00A0); // DAD: FIFO A port
        bus.write_half_word(0x0400_00C4, 0xFFFF); // length is ignored
        // halfword type programmed, repeat, Special timing, enable.
        bus.write_half_word(0x0400_00C6, (1 << 9) | (0b11 << 12) | (1 << 15));

        bus.dma_trigger(DmaEvent::Fifo(0));
        let channel = &bus.dma.channels[1];
        // Four words were read regardless of the programmed geometry.
        assert_eq!(channel.internal_source, 0x0200_0100 + 16);
        assert_eq!(channel.internal_destination, 0x0400_00A0);
        assert!(channel.enabled());
        // The last word written to the (fixed) FIFO port sticks.
        assert_eq!(bus.read_word(0x0400_00A0), 0x0F0E_0D0C);
    }

    #[test]
    fn dma_end_interrupt() {
        let mut bus = Bus::default();
        bus.write_word(0x0400_00D4, 0x0200_0000);
        bus.write_word(0x0400_00D8, 0x0200_4000);
        bus.write_half_word(0x0400_00DC, 1);
        bus.write_half_word(0x0400_00DE, (1 << 14) | (1 << 15));

        assert_eq!(
            bus.interrupt_control.interrupt_request & Interrupt::Dma3.mask(),
            Interrupt::Dma3.mask()
        );
    }

    #[test]
    fn scanline_events_drive_dispstat_and_vcount() {
        let mut bus = Bus::default();

        bus.tick(lcd::HDRAW_CYCLES);
        assert!(bus.lcd.dispstat.get_bit(1));
        assert_eq!(bus.lcd.vcount, 0);

        bus.tick(lcd::LINE_CYCLES - lcd::HDRAW_CYCLES);
        assert!(bus.lcd.dispstat.is_bit_off(1));
        assert_eq!(bus.lcd.vcount, 1);
    }

    #[test]
    fn vblank_raises_interrupt_when_enabled() {
        let mut bus = Bus::default();
        bus.lcd.dispstat = 1 << 3;

        bus.tick(lcd::LINE_CYCLES * u64::from(lcd::VBLANK_LINE));
        assert!(bus.lcd.dispstat.get_bit(0));
        assert_ne!(
            bus.interrupt_control.interrupt_request & Interrupt::VBlank.mask(),
            0
        );
        assert_eq!(bus.lcd.vcount, lcd::VBLANK_LINE);
    }

    #[test]
    fn timer_overflow_requests_interrupt() {
        let mut bus = Bus::default();
        bus.write_half_word(0x0400_0100, 0xFF00); // reload
        // irq enable + enable, prescaler 1.
        bus.write_half_word(0x0400_0102, (1 << 6) | (1 << 7));

        bus.tick(0x100 - 1);
        assert_eq!(
            bus.interrupt_control.interrupt_request & Interrupt::Timer0.mask(),
            0
        );

        bus.tick(1);
        assert_ne!(
            bus.interrupt_control.interrupt_request & Interrupt::Timer0.mask(),
            0
        );
    }

    #[test]
    fn cascaded_timer_counts_predecessor_overflows() {
        let mut bus = Bus::default();
        // Timer 0 overflows every 0x100 cycles.
        bus.write_half_word(0x0400_0100, 0xFF00);
        bus.write_half_word(0x0400_0102, 1 << 7);
        // Timer 1 cascades, needs 2 overflows, raises IRQ.
        bus.write_half_word(0x0400_0104, 0xFFFE);
        bus.write_half_word(0x0400_0106, (1 << 2) | (1 << 6) | (1 << 7));

        bus.tick(0x100);
        assert_eq!(
            bus.interrupt_control.interrupt_request & Interrupt::Timer1.mask(),
            0
        );

        bus.tick(0x100);
        assert_ne!(
            bus.interrupt_control.interrupt_request & Interrupt::Timer1.mask(),
            0
        );
    }

    #[test]
    fn unused_io_reads_return_written_values() {
        let mut bus = Bus::default();

        assert_eq!(bus.read_byte(0x0400_0060), 0);
        bus.write_byte(0x0400_0060, 0x7F);
        assert_eq!(bus.read_byte(0x0400_0060), 0x7F);
    }
}
