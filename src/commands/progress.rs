//! Progress bars for the long-running phases

use std::time::Duration;

use iceburn_core::program::ProgramProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    /// Bytes the program phase will push, when known up front
    program_total: Option<u64>,
    programmed: u64,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            program_total: None,
            programmed: 0,
        }
    }

    /// Reporter with a bounded bar for the program phase.
    pub fn with_program_total(total: u64) -> Self {
        let mut progress = Self::new();
        progress.program_total = Some(total);
        progress
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &'static str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message);
        }
    }

    /// Close out whatever phase is still on screen.
    pub fn done(&mut self) {
        self.finish("Done");
    }
}

impl ProgramProgress for IndicatifProgress {
    fn erase_started(&mut self, blocks: usize) {
        if blocks == 0 {
            self.create_spinner("Erasing entire chip...".to_string());
        } else {
            self.create_spinner(format!("Erasing {} blocks...", blocks));
        }
    }

    fn block_erased(&mut self, addr: u32) {
        if let Some(pb) = &self.current_bar {
            pb.set_message(format!("Erased block at 0x{:06X}", addr));
        }
    }

    fn program_started(&mut self) {
        self.finish("Erase complete");
        self.programmed = 0;
        if let Some(total) = self.program_total {
            self.create_bar(total, "Writing");
        } else {
            self.create_spinner("Writing...".to_string());
        }
    }

    fn chunk_programmed(&mut self, _addr: u32, len: usize) {
        self.programmed += len as u64;
        if let Some(pb) = &self.current_bar {
            if self.program_total.is_some() {
                pb.set_position(self.programmed);
            } else {
                pb.set_message(format!("Wrote {} bytes", self.programmed));
            }
        }
    }

    fn read_started(&mut self, total: Option<u64>) {
        self.finish("Write complete");
        match total {
            Some(total) => self.create_bar(total, "Reading"),
            None => self.create_bar(self.program_total.unwrap_or(0), "Verifying"),
        }
    }

    fn read_advanced(&mut self, done: u64) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(done);
        }
    }
}
