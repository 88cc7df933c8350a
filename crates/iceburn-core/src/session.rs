//! Device session and reset sequencing
//!
//! A session owns the MPSSE link for the life of one tool invocation
//! and walks the hardware through the fixed phase order: park the
//! lines, hold the FPGA in reset while the flash is accessed, then
//! release everything so the FPGA reconfigures from flash. Teardown
//! runs exactly once on every exit path via the link's Drop impl.

use crate::error::Result;
use crate::flash::Flash;
use crate::mpsse::MpsseLink;
use crate::transport::Transport;

/// Settle time after parking the lines at open
const OPEN_SETTLE_US: u32 = 100_000;

/// Settle time after each reset-line transition
const RESET_SETTLE_US: u32 = 250_000;

/// An open programming session
pub struct Session<T: Transport> {
    link: MpsseLink<T>,
}

impl<T: Transport> Session<T> {
    /// Open a session: configure the SPI clock, report the initial
    /// cdone state and park both lines inactive.
    pub fn open(link: T) -> Result<Self> {
        let mut link = MpsseLink::new(link);
        link.configure_clock()?;

        let cdone = link.cdone()?;
        log::info!("cdone: {}", if cdone { "high" } else { "low" });

        link.set_pins(false, false)?;
        link.delay_us(OPEN_SETTLE_US);

        Ok(Session { link })
    }

    /// Enter flash access: assert reset so the FPGA releases the SPI
    /// bus, wake the flash and log its ID.
    pub fn enter_flash_mode(&mut self) -> Result<()> {
        log::info!("reset..");
        self.link.set_pins(false, true)?;
        self.link.delay_us(RESET_SETTLE_US);
        self.log_cdone()?;

        let mut flash = Flash::new(&mut self.link);
        flash.power_up()?;
        let id = flash.read_id()?;
        let hex: Vec<String> = id.iter().map(|b| format!("0x{:02X}", b)).collect();
        log::info!("flash ID: {}", hex.join(" "));
        Ok(())
    }

    /// Leave flash access: power the flash down and release reset so
    /// the FPGA boots from whatever is now in flash.
    pub fn exit_flash_mode(&mut self) -> Result<()> {
        Flash::new(&mut self.link).power_down()?;
        self.link.set_pins(false, false)?;
        self.link.delay_us(RESET_SETTLE_US);
        self.log_cdone()
    }

    /// Pulse reset with chip select held asserted, putting the FPGA
    /// into slave SPI configuration mode for SRAM programming.
    pub fn enter_sram_mode(&mut self) -> Result<()> {
        log::info!("reset..");
        self.link.set_pins(true, true)?;
        self.link.delay_us(100);
        self.link.set_pins(true, false)?;
        self.link.delay_us(2000);
        self.log_cdone()
    }

    /// Log the configuration-done state. Diagnostics only.
    pub fn log_cdone(&mut self) -> Result<()> {
        let cdone = self.link.cdone()?;
        log::info!("cdone: {}", if cdone { "high" } else { "low" });
        Ok(())
    }

    /// Flash protocol handle for the current session.
    pub fn flash(&mut self) -> Flash<'_, T> {
        Flash::new(&mut self.link)
    }

    /// Direct access to the framer, for SRAM streaming.
    pub fn link(&mut self) -> &mut MpsseLink<T> {
        &mut self.link
    }
}
