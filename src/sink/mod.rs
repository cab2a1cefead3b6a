use chrono::{DateTime, Local};

use crate::{aggregator::ProductState, trend::ProductReading};

/// 覆寫同一行的畫面輸出
pub mod display;
/// 會輪轉的紀錄檔
pub mod record;

/// 畫面與紀錄檔使用的時間格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 單一產品的欄位，例如 `"天利鑫B(3.25) 1000000↑     "`
///
/// 數值 (含或不含趨勢符號) 補齊到 `width` 個字元。
pub fn format_field(reading: &ProductReading, width: usize, with_glyph: bool) -> String {
    let value = if with_glyph {
        reading.marked_value()
    } else {
        reading.plain_value()
    };

    match reading.aux {
        Some(aux) => format!(
            "{}({}) {:<width$}",
            reading.label,
            aux.normalize(),
            value,
            width = width
        ),
        None => format!("{} {:<width$}", reading.label, value, width = width),
    }
}

/// 把所有產品的欄位接在一起，暫無資料的產品直接略過
pub fn format_fields(states: &[ProductState], width: usize, with_glyph: bool) -> String {
    states
        .iter()
        .filter_map(|s| s.current.as_ref())
        .map(|r| format_field(r, width, with_glyph))
        .collect()
}

pub fn format_timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}
