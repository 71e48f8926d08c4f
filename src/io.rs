//! 周辺機器とのインターフェース
//!
//! メモリデコーダは画面・スピーカー・ゲームコントローラを直接扱わず、
//! ここで定義するトレイトを通して通知・問い合わせを行う。
//! 描画や音声再生そのものはこのクレートの範囲外。

use serde::{Deserialize, Serialize};

/// アクセスされたメモリバンク（ヒートマップ表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankTag {
    Main,
    Aux,
}

/// アクセスの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// 画面側への通知
pub trait Display {
    /// 表示モードが変わったのでキャッシュを破棄する
    fn invalidate(&mut self) {}
    /// メモリアクセスごとの通知
    fn touch(&mut self, _tag: BankTag, _address: u16, _access: Access) {}
}

/// スピーカー
pub trait Audio {
    /// スピーカーのコーンを反転する（$C030）
    fn toggle(&mut self, _ticks: u64) {}
}

/// ボタンとパドル
pub trait GameInput {
    /// ボタンn（0〜2）が押されているか
    fn button(&mut self, _n: usize) -> bool {
        false
    }
    /// パドルnのタイマーがまだ動作中なら0x80、タイムアウトなら0
    fn paddle(&mut self, _n: usize, _ticks: u64) -> u8 {
        0
    }
    /// $C070: パドルのタイマーを再始動
    fn reset_paddles(&mut self, _ticks: u64) {}
}

/// 何もしない画面
#[derive(Debug, Default)]
pub struct NullDisplay;
impl Display for NullDisplay {}

/// 何もしないスピーカー
#[derive(Debug, Default)]
pub struct NullAudio;
impl Audio for NullAudio {}

/// 何も接続されていないゲームポート
#[derive(Debug, Default)]
pub struct NullInput;
impl GameInput for NullInput {}

/// パドルのカウントダウンが1減るのに要するサイクル数
const PADDLE_TICKS_PER_COUNT: f64 = 6.6;
/// パドルの中央位置
const PADDLE_CENTER: f64 = 127.0;

/// ジョイスティック/パドルのモデル
///
/// $C070でカウントダウンを位置の2乗にセットし、経過サイクル/6.6ずつ減っていく。
/// 0に達するまでは読み出しが0x80を返す。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paddles {
    /// ボタン0〜2（オープンアップル、ソリッドアップル、シフト）
    pub buttons: [bool; 3],
    /// 位置 0.0（左/上）〜 255.0（右/下）
    pub positions: [f64; 4],
    /// 動かしている方向（-1, 0, 1）
    pub directions: [i8; 4],
    /// スティックを倒しているか（falseなら中央へ戻る）
    pub active: [bool; 4],
    /// 端に向かう速度
    pub action_speed: f64,
    /// 中央に戻る速度
    pub release_speed: f64,
    countdown: [f64; 4],
    trigger: u64,
}

impl Default for Paddles {
    fn default() -> Self {
        Self::new()
    }
}

impl Paddles {
    pub fn new() -> Self {
        Paddles {
            buttons: [false; 3],
            positions: [PADDLE_CENTER; 4],
            directions: [0; 4],
            active: [false; 4],
            action_speed: 8.0,
            release_speed: 8.0,
            countdown: [0.0; 4],
            trigger: 0,
        }
    }

    /// 位置を直接設定（0〜255）
    pub fn set_position(&mut self, n: usize, position: u8) {
        if let Some(p) = self.positions.get_mut(n) {
            *p = position as f64;
        }
    }

    /// 方向入力。`active`がfalseのときは中央へ戻る
    pub fn push(&mut self, n: usize, direction: i8, active: bool) {
        if n < 4 {
            self.directions[n] = direction.signum();
            self.active[n] = active;
        }
    }

    /// フレームごとの位置更新
    pub fn update(&mut self) {
        for n in 0..4 {
            let dir = self.directions[n] as f64;
            if self.active[n] {
                self.positions[n] = (self.positions[n] + dir * self.action_speed).clamp(0.0, 255.0);
            } else {
                self.positions[n] += dir * self.release_speed;
                if self.directions[n] == 1 && self.positions[n] > PADDLE_CENTER {
                    self.positions[n] = PADDLE_CENTER;
                }
                if self.directions[n] == -1 && self.positions[n] < PADDLE_CENTER {
                    self.positions[n] = PADDLE_CENTER;
                }
            }
        }
    }
}

impl GameInput for Paddles {
    fn button(&mut self, n: usize) -> bool {
        self.buttons.get(n).copied().unwrap_or(false)
    }

    fn paddle(&mut self, n: usize, ticks: u64) -> u8 {
        let Some(start) = self.countdown.get(n).copied() else {
            return 0;
        };
        let elapsed = ticks.saturating_sub(self.trigger) as f64 / PADDLE_TICKS_PER_COUNT;
        if start - elapsed <= 0.0 {
            self.countdown[n] = 0.0;
            0
        } else {
            0x80
        }
    }

    fn reset_paddles(&mut self, ticks: u64) {
        for n in 0..4 {
            self.countdown[n] = self.positions[n] * self.positions[n];
        }
        self.trigger = ticks;
    }
}

/// スピーカーのトグル時刻を記録する（波形生成は呼び出し側の仕事）
#[derive(Debug, Default, Clone)]
pub struct ClickRecorder {
    pub clicks: Vec<u64>,
}

impl ClickRecorder {
    /// 記録済みのトグル時刻を取り出す
    pub fn drain(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.clicks)
    }
}

impl Audio for ClickRecorder {
    fn toggle(&mut self, ticks: u64) {
        self.clicks.push(ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paddle_times_out_proportional_to_position() {
        let mut paddles = Paddles::new();
        paddles.set_position(0, 10); // カウントダウン 100 → 660サイクル
        paddles.reset_paddles(1000);
        assert_eq!(paddles.paddle(0, 1000 + 600), 0x80);
        assert_eq!(paddles.paddle(0, 1000 + 700), 0);
    }

    #[test]
    fn test_paddle_at_zero_reads_timed_out() {
        let mut paddles = Paddles::new();
        paddles.set_position(1, 0);
        paddles.reset_paddles(0);
        assert_eq!(paddles.paddle(1, 0), 0);
        assert_eq!(paddles.paddle(7, 0), 0);
    }

    #[test]
    fn test_stick_returns_to_center() {
        let mut paddles = Paddles::new();
        paddles.push(0, 1, true);
        for _ in 0..40 {
            paddles.update();
        }
        assert_eq!(paddles.positions[0], 255.0);
        paddles.push(0, -1, false);
        for _ in 0..40 {
            paddles.update();
        }
        assert_eq!(paddles.positions[0], PADDLE_CENTER);
    }

    #[test]
    fn test_click_recorder() {
        let mut rec = ClickRecorder::default();
        rec.toggle(10);
        rec.toggle(20);
        assert_eq!(rec.drain(), vec![10, 20]);
        assert!(rec.clicks.is_empty());
    }
}
