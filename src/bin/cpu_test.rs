//! Klaus2m5 6502/65C02機能テストランナー
//!
//! 使用方法: cargo run --release --bin cpu_test [bin_filesディレクトリ]

use std::fs;
use std::path::Path;
use std::process;
use std::time::Instant;

use a2e::cpu::{Cpu, MemoryBus};

const DEFAULT_DIR: &str = "tests/6502_65C02_functional_tests-master/bin_files";
/// テストプログラムの開始アドレス
const START_ADDRESS: u16 = 0x0400;
/// 1億サイクルで打ち切る
const MAX_CYCLES: u64 = 100_000_000;

/// テスト用メモリ（64KB フラットメモリ）
struct TestMemory {
    ram: Vec<u8>,
}

impl TestMemory {
    fn new() -> Self {
        TestMemory {
            ram: vec![0; 0x10000],
        }
    }

    fn load(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
    }
}

impl MemoryBus for TestMemory {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }
}

/// テストの結果
enum Outcome {
    Passed,
    Trapped(u16),
    Timeout(u16),
}

fn main() {
    env_logger::init();

    let dir = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_DIR.to_string());

    println!("===========================================");
    println!("  Klaus2m5 65C02 Functional Test Runner");
    println!("===========================================\n");

    // (名前, ファイル, 成功時に停止するアドレス)
    let tests = [
        ("6502 Functional Test", "6502_functional_test.bin", 0x3469u16),
        ("65C02 Extended Opcodes Test", "65C02_extended_opcodes_test.bin", 0x24F1u16),
    ];

    let mut failed = false;
    for (name, file, success_pc) in tests {
        let path = Path::new(&dir).join(file);
        println!("----------------------------------------");
        println!("Test: {}", name);
        println!("File: {}", path.display());
        println!("----------------------------------------");

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                println!("Error loading test file: {}", e);
                println!("Skipping...\n");
                continue;
            }
        };

        match run_test(&data, success_pc) {
            Outcome::Passed => println!("\n*** TEST PASSED! ***\n"),
            Outcome::Trapped(pc) => {
                println!("\n*** TEST FAILED ***");
                println!("Trap at ${:04X}", pc);
                println!("Check the listing file to identify the failed test.\n");
                failed = true;
            }
            Outcome::Timeout(pc) => {
                println!("\nTimeout after {} cycles, last PC ${:04X}", MAX_CYCLES, pc);
                println!("*** TEST INCOMPLETE ***\n");
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

fn run_test(data: &[u8], success_pc: u16) -> Outcome {
    let mut memory = TestMemory::new();
    memory.load(data);
    memory.ram[0xFFFC] = START_ADDRESS as u8;
    memory.ram[0xFFFD] = (START_ADDRESS >> 8) as u8;

    let mut cpu = Cpu::new();
    cpu.reset(&mut memory);
    let start_ticks = cpu.ticks;
    println!("Starting at ${:04X}", cpu.pc());

    let start_time = Instant::now();
    let mut next_progress = 10_000_000;
    loop {
        let current_pc = cpu.pc();
        let cycles = cpu.step(&mut memory);
        let elapsed_cycles = cpu.ticks - start_ticks;

        // JMP * や分岐の自己ループでトラップを検出
        if cpu.pc() == current_pc || cycles == 0 {
            let elapsed = start_time.elapsed();
            let mhz = elapsed_cycles as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1_000_000.0;
            println!("Loop detected at ${:04X}", current_pc);
            println!("Total cycles: {}", elapsed_cycles);
            println!("Elapsed: {:?} ({:.2} MHz)", elapsed, mhz);
            if current_pc == success_pc {
                return Outcome::Passed;
            }
            println!("{}", cpu.registers_string(&mut memory));
            dump_memory(&memory, current_pc);
            return Outcome::Trapped(current_pc);
        }

        if elapsed_cycles >= MAX_CYCLES {
            return Outcome::Timeout(cpu.pc());
        }

        if elapsed_cycles >= next_progress {
            println!("  Progress: {} million cycles, PC=${:04X}", elapsed_cycles / 1_000_000, cpu.pc());
            next_progress += 10_000_000;
        }
    }
}

fn dump_memory(memory: &TestMemory, addr: u16) {
    println!("\nMemory dump around ${:04X}:", addr);
    let start = (addr as usize).saturating_sub(16) & 0xFFF0;
    for row in 0..4 {
        let row_addr = start + row * 16;
        print!("  ${:04X}: ", row_addr);
        for col in 0..16 {
            print!("{:02X} ", memory.ram[(row_addr + col) & 0xFFFF]);
        }
        println!();
    }
}
