//! Vectors command implementation

use iceburn_core::vectors::BootTable;
use iceburn_ftdi::FtdiInterface;

use super::open_session;

/// Run the vectors list command
pub fn run_list(interface: FtdiInterface) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    let table = {
        let mut flash = session.flash();
        BootTable::load(&mut flash)?
    };
    print_table(&table);

    session.exit_flash_mode()?;
    Ok(())
}

/// Run the vectors swap command
pub fn run_swap(
    interface: FtdiInterface,
    a: usize,
    b: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    {
        let mut flash = session.flash();
        let mut table = BootTable::load(&mut flash)?;
        table.swap(a, b)?;
        table.commit(&mut flash)?;

        let table = BootTable::load(&mut flash)?;
        print_table(&table);
    }

    session.exit_flash_mode()?;
    println!("Swapped boot vectors {} and {}", a, b);
    Ok(())
}

fn print_table(table: &BootTable) {
    if table.records().is_empty() {
        println!("No boot vector table found");
        return;
    }
    println!("Boot vectors:");
    for rec in table.records() {
        let comment = rec.comment.as_deref().unwrap_or("");
        println!(
            "  [{}] {:7} -> 0x{:06X}  {}",
            rec.index,
            rec.role(),
            rec.target,
            comment
        );
    }
}
