//! In-memory bridge for protocol tests
//!
//! Decodes the MPSSE byte stream one byte at a time, models chip
//! select from the pin-set frames and replays a small NOR flash behind
//! it: memory erases to 0xFF, programming ANDs bytes in, erase and
//! program both require the write-enable latch and leave the part
//! busy for a configurable number of status polls.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Decoder position within a multi-byte MPSSE command
enum DecodeState {
    Opcode,
    /// Collecting fixed arguments for the opcode
    Args { opcode: u8, need: usize, got: Vec<u8> },
    /// Streaming a data payload of known length
    Payload { opcode: u8, remaining: usize },
}

/// Scripted FT2232H-plus-flash stand-in
pub struct MockBridge {
    sent: Vec<u8>,
    replies: VecDeque<u8>,
    state: DecodeState,
    /// Last value written with the pin-set command
    pin_value: u8,
    /// MOSI bytes of the chip-select window in progress
    txn: Option<Vec<u8>>,
    mem: Vec<u8>,
    wel: bool,
    busy_polls: u32,
    busy_left: u32,
    /// Committed erases as (opcode, aligned base address)
    pub erases: Vec<(u8, u32)>,
    /// Committed page programs as (address, length)
    pub programs: Vec<(u32, usize)>,
}

impl MockBridge {
    /// JEDEC ID payload the mock answers to opcode 9F
    pub const JEDEC_ID: [u8; 20] = [
        0x20, 0xBA, 0x16, 0x10, 0x00, 0x00, 0x23, 0x51, 0x73, 0x10, 0x23, 0x00, 0x35, 0x00, 0x35,
        0x00, 0x35, 0x00, 0x35, 0x00,
    ];

    pub fn new(size: usize) -> Self {
        MockBridge {
            sent: Vec::new(),
            replies: VecDeque::new(),
            state: DecodeState::Opcode,
            // Lines parked: SCK, SS and CRESET high.
            pin_value: 0x91,
            txn: None,
            mem: vec![0xFF; size],
            wel: false,
            busy_polls: 0,
            busy_left: 0,
            erases: Vec::new(),
            programs: Vec::new(),
        }
    }

    /// Make each erase/program leave the part busy for `polls` status
    /// reads before the WIP bit clears.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Every byte the framer has sent, in order.
    pub fn raw_sent(&self) -> &[u8] {
        &self.sent
    }

    fn feed(&mut self, byte: u8) {
        match std::mem::replace(&mut self.state, DecodeState::Opcode) {
            DecodeState::Opcode => self.start_command(byte),
            DecodeState::Args { opcode, need, mut got } => {
                got.push(byte);
                if got.len() < need {
                    self.state = DecodeState::Args { opcode, need, got };
                } else {
                    self.finish_args(opcode, &got);
                }
            }
            DecodeState::Payload { opcode, remaining } => {
                self.payload_byte(opcode, byte);
                if remaining > 1 {
                    self.state = DecodeState::Payload {
                        opcode,
                        remaining: remaining - 1,
                    };
                }
            }
        }
    }

    fn start_command(&mut self, opcode: u8) {
        match opcode {
            // Pin set: value + direction follow.
            0x80 => self.expect_args(opcode, 2),
            // Pin get: reply with the driven value, CDONE pulled high.
            0x81 => self.replies.push_back(self.pin_value | 0x40),
            // Data out / data exchange: two length bytes follow.
            0x11 | 0x31 => self.expect_args(opcode, 2),
            // Clock divisor and dummy-clock bytes: two args, no reply.
            0x86 | 0x8F => self.expect_args(opcode, 2),
            // Dummy-clock bits: one arg.
            0x8E => self.expect_args(opcode, 1),
            // Divide-by-5 enable: no args.
            0x8B => {}
            other => panic!("mock bridge: unknown MPSSE opcode 0x{other:02X}"),
        }
    }

    fn expect_args(&mut self, opcode: u8, need: usize) {
        self.state = DecodeState::Args {
            opcode,
            need,
            got: Vec::with_capacity(need),
        };
    }

    fn finish_args(&mut self, opcode: u8, args: &[u8]) {
        match opcode {
            0x80 => self.set_pins(args[0]),
            0x11 | 0x31 => {
                let len = usize::from(args[0]) | (usize::from(args[1]) << 8);
                self.state = DecodeState::Payload {
                    opcode,
                    remaining: len + 1,
                };
            }
            // Clock config and dummy clocks carry no payload.
            0x86 | 0x8F | 0x8E => {}
            _ => unreachable!(),
        }
    }

    fn set_pins(&mut self, value: u8) {
        let was_selected = self.pin_value & 0x10 == 0;
        let now_selected = value & 0x10 == 0;
        self.pin_value = value;
        if !was_selected && now_selected {
            self.txn = Some(Vec::new());
        } else if was_selected && !now_selected {
            if let Some(txn) = self.txn.take() {
                self.commit(&txn);
            }
        }
    }

    fn payload_byte(&mut self, opcode: u8, byte: u8) {
        if opcode == 0x31 {
            let reply = match &self.txn {
                Some(txn) => self.miso(txn, txn.len()),
                None => 0x00,
            };
            self.replies.push_back(reply);
        }
        if let Some(txn) = &mut self.txn {
            txn.push(byte);
        }
    }

    /// Byte the flash shifts out at position `pos` of the transaction.
    fn miso(&self, txn: &[u8], pos: usize) -> u8 {
        if pos == 0 {
            return 0x00;
        }
        match txn[0] {
            0x9F => {
                if pos <= Self::JEDEC_ID.len() {
                    Self::JEDEC_ID[pos - 1]
                } else {
                    0x00
                }
            }
            0x05 => {
                if self.busy_left > 0 {
                    0x01
                } else {
                    0x00
                }
            }
            0x03 if pos >= 4 => {
                let addr = Self::addr(txn) as usize + pos - 4;
                self.mem.get(addr).copied().unwrap_or(0xFF)
            }
            _ => 0x00,
        }
    }

    /// Apply a completed chip-select window.
    fn commit(&mut self, txn: &[u8]) {
        let Some(&opcode) = txn.first() else {
            return;
        };
        match opcode {
            0x06 => self.wel = true,
            0x05 => {
                if self.busy_left > 0 {
                    self.busy_left -= 1;
                }
            }
            0xC7 => {
                assert!(self.wel, "chip erase without write enable");
                self.mem.fill(0xFF);
                self.erases.push((0xC7, 0));
                self.finish_write();
            }
            0xD8 => self.erase_block(txn, 0x10000),
            0x20 => self.erase_block(txn, 0x1000),
            0x02 => {
                assert!(self.wel, "page program without write enable");
                let addr = Self::addr(txn) as usize;
                let data = &txn[4..];
                for (i, &b) in data.iter().enumerate() {
                    self.mem[addr + i] &= b;
                }
                self.programs.push((addr as u32, data.len()));
                self.finish_write();
            }
            // Power, ID and read commands have no committed effect.
            _ => {}
        }
    }

    fn erase_block(&mut self, txn: &[u8], block: u32) {
        assert!(self.wel, "erase without write enable");
        let base = (Self::addr(txn) & !(block - 1)) as usize;
        let end = (base + block as usize).min(self.mem.len());
        self.mem[base..end].fill(0xFF);
        self.erases.push((txn[0], base as u32));
        self.finish_write();
    }

    fn finish_write(&mut self) {
        self.wel = false;
        self.busy_left = self.busy_polls;
    }

    fn addr(txn: &[u8]) -> u32 {
        (u32::from(txn[1]) << 16) | (u32::from(txn[2]) << 8) | u32::from(txn[3])
    }
}

impl Transport for MockBridge {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sent.extend_from_slice(data);
        for &b in data {
            self.feed(b);
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self
                .replies
                .pop_front()
                .ok_or_else(|| Error::Transport("mock bridge reply underrun".into()))?;
        }
        Ok(())
    }

    fn drain(&mut self) -> usize {
        let n = self.replies.len();
        self.replies.clear();
        n
    }

    fn delay_us(&mut self, _us: u32) {}
}
