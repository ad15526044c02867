//! Engines command - report whether the external engines can run.

use console::style;

use docket_core::process::is_available;

use super::config;

pub async fn run(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;

    let engines = [
        ("OCR", config.ocr.tesseract_path.as_path()),
        ("PDF renderer", config.pdf.renderer_path.as_path()),
    ];

    let mut missing = 0;
    for (role, binary) in engines {
        if is_available(binary) {
            println!("{} {:<13} {}", style("✓").green(), role, binary.display());
        } else {
            missing += 1;
            println!(
                "{} {:<13} {} {}",
                style("✗").red(),
                role,
                binary.display(),
                style("(not found)").yellow()
            );
        }
    }

    if missing > 0 {
        println!();
        println!(
            "Install Tesseract and Poppler, or point ocr.tesseract_path / pdf.renderer_path at them:"
        );
        println!("  docket config set ocr.tesseract_path /usr/bin/tesseract");
    }

    Ok(())
}
