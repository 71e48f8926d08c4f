//! A2E - Apple IIe emulation core in Rust
//!
//! The machine without its front end:
//! - 65C02 CPU with cycle counts and a disassembler
//! - Apple IIe memory map with auxiliary RAM, language card and soft switches
//! - Disk II controller for 35-track nibble images
//! - JSON save states and configuration
//!
//! ビデオ、サウンド、ゲーム入力は`io`のトレイト越しに接続する。

pub mod cpu;
pub mod memory;
pub mod disk;
pub mod io;
pub mod apple2;
pub mod savestate;
pub mod config;
