//! セーブステート機能
//!
//! エミュレータの状態を保存・復元する

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::{CpuMode, Registers};
use crate::disk::StepperPhaseHistory;
use crate::memory::SoftSwitches;

/// セーブステートの読み書きエラー
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed save state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("incompatible save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("save state field `{0}` has the wrong length")]
    BadLength(&'static str),
    #[error("save state field `{0}` is out of range")]
    BadValue(&'static str),
}

/// CPUの状態（セーブ用）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CpuState {
    pub regs: Registers,
    pub ticks: u64,
    pub mode: CpuMode,
}

/// メモリの状態（セーブ用）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryState {
    pub main_ram: Vec<u8>,      // メインRAM (48KB)
    pub aux_ram: Vec<u8>,       // 補助RAM (48KB)
    pub main_lc: Vec<u8>,       // ランゲージカード (12KB)
    pub main_bank2: Vec<u8>,    // ランゲージカード Bank2 (4KB)
    pub aux_lc: Vec<u8>,
    pub aux_bank2: Vec<u8>,
    pub switches: SoftSwitches,
}

/// ディスクドライブの状態（セーブ用）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiskDriveState {
    pub data: Vec<u8>,
    pub read_only: bool,
    pub motor_on: bool,
    pub write_mode: bool,
    pub track: usize,
    pub nibble: usize,
    pub path: Option<PathBuf>,
    pub stepper: StepperPhaseHistory,
}

/// Disk IIコントローラの状態（セーブ用）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiskState {
    pub current: usize,
    pub latch: u8,
    pub drives: [DiskDriveState; 2],
}

/// 完全なエミュレータ状態
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SaveState {
    pub version: u32,           // セーブフォーマットのバージョン
    pub cpu: CpuState,
    pub memory: MemoryState,
    pub disk: DiskState,
    pub frame_count: u64,
}

impl SaveState {
    pub const CURRENT_VERSION: u32 = 1;

    /// JSONファイルに書き出す
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("State saved to {}", path.display());
        Ok(())
    }

    /// JSONファイルから読み込む（バージョンも検査する）
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: SaveState = serde_json::from_str(&json)?;
        state.check_version()?;
        Ok(state)
    }

    pub fn check_version(&self) -> Result<(), StateError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(StateError::Version {
                found: self.version,
                expected: Self::CURRENT_VERSION,
            });
        }
        Ok(())
    }
}

/// 長さを検査してからコピー
pub(crate) fn restore_slice(dst: &mut [u8], src: &[u8], field: &'static str) -> Result<(), StateError> {
    if dst.len() != src.len() {
        return Err(StateError::BadLength(field));
    }
    dst.copy_from_slice(src);
    Ok(())
}
