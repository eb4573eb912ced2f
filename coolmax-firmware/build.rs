//! Build script for coolmax-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates storage.toml and turns it into Rust constants

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Flash size of the controller board
const FLASH_SIZE: i64 = 2 * 1024 * 1024;

/// RP2040 erase sector
const SECTOR_SIZE: i64 = 4096;

/// Blocks in the order they appear in `FlashLayout`
const BLOCKS: [&str; 6] = [
    "factory",
    "user",
    "events",
    "misc_state",
    "persistent",
    "calibration_backup",
];

fn main() {
    setup_linker();
    let storage = validate_storage();
    write_constants(&storage);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validated contents of storage.toml
struct Storage {
    tick_interval_ms: i64,
    read_attempts: i64,
    write_attempts: i64,
    persistent_write_attempts: i64,
    blocks: Vec<(&'static str, i64)>,
    calibration_segment: i64,
    hardware_version: i64,
    model: String,
}

fn validate_storage() -> Storage {
    println!("cargo:rerun-if-changed=storage.toml");

    let config_path = Path::new("storage.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: storage.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a storage.toml flash layout file in the   ║\n\
            ║  coolmax-firmware directory.                                     ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read storage.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in storage.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();

    let engine = section(&config, "engine", &mut errors);
    let tick_interval_ms = integer(engine, "engine", "tick_interval_ms", 1..=1000, &mut errors);
    let read_attempts = integer(engine, "engine", "read_attempts", 1..=255, &mut errors);
    let write_attempts = integer(engine, "engine", "write_attempts", 1..=255, &mut errors);
    let persistent_write_attempts =
        integer(engine, "engine", "persistent_write_attempts", 1..=255, &mut errors);

    let layout = section(&config, "layout", &mut errors);
    let reserved_start = integer(layout, "layout", "reserved_start", 0..=FLASH_SIZE, &mut errors);
    let blocks: Vec<(&'static str, i64)> = BLOCKS
        .iter()
        .map(|name| (*name, integer(layout, "layout", name, 0..=FLASH_SIZE, &mut errors)))
        .collect();
    let calibration_segment =
        integer(layout, "layout", "calibration_segment", 0..=FLASH_SIZE, &mut errors);

    let hardware = section(&config, "hardware", &mut errors);
    let hardware_version = integer(hardware, "hardware", "version", 0..=9, &mut errors);
    let model = match hardware.and_then(|h| h.get("model")) {
        Some(toml::Value::String(model)) if model == "MV" || model == "HV" => model.clone(),
        Some(_) => {
            errors.push("[hardware] model must be \"MV\" or \"HV\"".to_string());
            String::new()
        }
        None => {
            errors.push("[hardware] missing 'model'".to_string());
            String::new()
        }
    };

    // Every block and the calibration segment need a sector to themselves
    let mut sectors: Vec<(&str, i64)> = blocks.clone();
    sectors.push(("calibration_segment", calibration_segment));
    for (name, offset) in &sectors {
        if offset % SECTOR_SIZE != 0 {
            errors.push(format!(
                "[layout] {} = {:#x} is not aligned to {:#x}",
                name, offset, SECTOR_SIZE
            ));
        }
        if *offset < reserved_start || offset + SECTOR_SIZE > FLASH_SIZE {
            errors.push(format!(
                "[layout] {} = {:#x} is outside the reserved region",
                name, offset
            ));
        }
    }
    for (i, (a, a_offset)) in sectors.iter().enumerate() {
        for (b, b_offset) in &sectors[i + 1..] {
            if a_offset / SECTOR_SIZE == b_offset / SECTOR_SIZE {
                errors.push(format!("[layout] {} and {} share a sector", a, b));
            }
        }
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid storage configuration                            ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=storage.toml validated successfully");

    Storage {
        tick_interval_ms,
        read_attempts,
        write_attempts,
        persistent_write_attempts,
        blocks,
        calibration_segment,
        hardware_version,
        model,
    }
}

fn section<'a>(
    config: &'a toml::Value,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<&'a toml::Table> {
    match config.get(name) {
        Some(toml::Value::Table(table)) => Some(table),
        Some(_) => {
            errors.push(format!("[{}] must be a table", name));
            None
        }
        None => {
            errors.push(format!("Missing [{}] section", name));
            None
        }
    }
}

fn integer(
    table: Option<&toml::Table>,
    section: &str,
    key: &str,
    range: std::ops::RangeInclusive<i64>,
    errors: &mut Vec<String>,
) -> i64 {
    // A missing section was already reported
    let Some(table) = table else {
        return 0;
    };
    match table.get(key) {
        Some(toml::Value::Integer(value)) if range.contains(value) => *value,
        Some(toml::Value::Integer(_)) => {
            errors.push(format!(
                "[{}] {} must be {}-{}",
                section,
                key,
                range.start(),
                range.end()
            ));
            0
        }
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            0
        }
        None => {
            errors.push(format!("[{}] missing '{}'", section, key));
            0
        }
    }
}

/// Emit the validated layout as constants for `src/config.rs`
fn write_constants(storage: &Storage) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut f = File::create(out_dir.join("storage.rs")).unwrap();

    let model = match storage.model.as_str() {
        "HV" => "ModelVariant::Hv",
        _ => "ModelVariant::Mv",
    };

    writeln!(f, "pub const TICK_INTERVAL_MS: u64 = {};", storage.tick_interval_ms).unwrap();
    writeln!(f, "pub const READ_ATTEMPTS: u8 = {};", storage.read_attempts).unwrap();
    writeln!(f, "pub const WRITE_ATTEMPTS: u8 = {};", storage.write_attempts).unwrap();
    writeln!(
        f,
        "pub const PERSISTENT_WRITE_ATTEMPTS: u8 = {};",
        storage.persistent_write_attempts
    )
    .unwrap();
    writeln!(
        f,
        "pub const CALIBRATION_SEGMENT: u32 = {:#x};",
        storage.calibration_segment
    )
    .unwrap();
    writeln!(f, "pub const HARDWARE_VERSION: u8 = {};", storage.hardware_version).unwrap();
    writeln!(f, "pub const MODEL: ModelVariant = {};", model).unwrap();

    writeln!(f, "pub const LAYOUT: FlashLayout = FlashLayout {{").unwrap();
    for (name, offset) in &storage.blocks {
        writeln!(f, "    {}: {:#x},", name, offset).unwrap();
    }
    writeln!(f, "}};").unwrap();
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
