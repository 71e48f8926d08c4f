//! A2E - Apple IIe emulation core
//!
//! ヘッドレスで機械を動かすコマンドラインランナー。
//!
//! # 使用方法
//! ```text
//! a2e --rom rom/appleIIe.rom --disk-prom rom/diskII.rom -1 dos33.nib --frames 600 --dump-regs
//! ```

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use a2e::apple2::Apple2;
use a2e::config::{self, Config};
use a2e::cpu::disasm::disassemble;
use a2e::savestate::SaveState;
use clap::Parser;

/// A2E - Apple IIe emulation core
#[derive(Parser, Debug)]
#[command(name = "a2e")]
#[command(version = "0.1.0")]
#[command(about = "A2E - headless Apple IIe emulator", long_about = None)]
struct Args {
    /// ディスクイメージファイル（ドライブ1、省略時は前回のディスク）
    #[arg(short = '1', long)]
    disk1: Option<String>,

    /// ディスクイメージファイル（ドライブ2、省略時は前回のディスク）
    #[arg(short = '2', long)]
    disk2: Option<String>,

    /// システムROM（16KBまたは32KB）
    #[arg(short, long)]
    rom: Option<String>,

    /// Disk II Boot ROM (256 bytes)
    #[arg(long)]
    disk_prom: Option<String>,

    /// 設定ファイル（省略時は実行ファイルと同じディレクトリ）
    #[arg(long)]
    config: Option<String>,

    /// 実行するフレーム数
    #[arg(long, default_value = "60")]
    frames: u64,

    /// 速度倍率（1.0 = 1.023MHz）
    #[arg(long)]
    speed: Option<f64>,

    /// ディスク高速化を無効にする
    #[arg(long)]
    no_disk_speedup: bool,

    /// 起動後にキー入力として流し込むテキスト
    #[arg(long)]
    paste: Option<String>,

    /// 終了時にレジスタを表示
    #[arg(long)]
    dump_regs: bool,

    /// 終了時に逆アセンブルする先頭アドレス（16進）
    #[arg(long, value_parser = parse_hex_address)]
    disasm: Option<u16>,

    /// 逆アセンブルする行数
    #[arg(long, default_value = "16")]
    disasm_lines: usize,

    /// 実行前に読み込むセーブステート
    #[arg(long)]
    load_state: Option<String>,

    /// 終了時に書き出すセーブステート
    #[arg(long)]
    save_state: Option<String>,
}

fn parse_hex_address(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches('$').trim_start_matches("0x");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address {}: {}", s, e))
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = args
        .config
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(config::get_config_path);
    let mut config = Config::load_from(&config_path);

    let mut emu = Apple2::new();
    emu.speed = args.speed.unwrap_or(config.speed);
    emu.fps = config.fps;
    emu.disk_speedup = config.disk_speedup && !args.no_disk_speedup;

    let rom_path = args.rom.clone().unwrap_or_else(|| config.rom.clone());
    let rom = fs::read(&rom_path).map_err(|e| format!("Failed to load ROM {}: {}", rom_path, e))?;
    emu.load_rom(&rom)?;
    log::info!("ROM loaded: {} ({} bytes)", rom_path, rom.len());

    let prom_path = args.disk_prom.clone().unwrap_or_else(|| config.disk_prom.clone());
    match fs::read(&prom_path) {
        Ok(data) => emu.load_disk_prom(&data)?,
        // ブートPROMなしでもROMだけで動かせる
        Err(e) => log::warn!("Disk II boot ROM {} not loaded: {}", prom_path, e),
    }

    for (drive, path) in [(0, &args.disk1), (1, &args.disk2)] {
        match path {
            Some(path) => {
                emu.insert_disk(drive, path)?;
                config.remember_disk(drive, path);
            }
            // 指定がなければ前回のディスクを挿入する（失敗しても続行）
            None => {
                if let Some(last) = config.last_disk(drive) {
                    if let Err(e) = emu.insert_disk(drive, last) {
                        log::warn!("Last disk {} for drive {} not loaded: {}", last, drive + 1, e);
                    }
                }
            }
        }
    }

    emu.cold_reset();

    if let Some(path) = &args.load_state {
        let state = SaveState::load_from(path)?;
        emu.load_state(&state)?;
    }

    if let Some(text) = &args.paste {
        emu.paste_text(text);
    }

    let start = Instant::now();
    let start_ticks = emu.cpu.ticks;
    for _ in 0..args.frames {
        emu.run_frame();
    }
    let elapsed = start.elapsed();
    let cycles = emu.cpu.ticks - start_ticks;
    let mhz = cycles as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1_000_000.0;
    println!(
        "Executed {} frames, {} cycles in {:?} ({:.2} MHz effective)",
        args.frames, cycles, elapsed, mhz
    );

    if args.dump_regs {
        println!("{}", emu.cpu.registers_string(&mut emu.memory));
    }

    if let Some(address) = args.disasm {
        for line in disassemble(&mut emu.memory, address, args.disasm_lines) {
            println!("{}", line);
        }
    }

    if let Some(path) = &args.save_state {
        emu.save_state().save_to(path)?;
    }

    for drive in 0..2 {
        let unit = &emu.memory.disk.units[drive];
        if unit.path.is_some() && !unit.read_only {
            emu.memory.disk.save(drive)?;
        }
    }

    if let Err(e) = config.save_to(&config_path) {
        log::warn!("{}", e);
    }
    Ok(())
}
