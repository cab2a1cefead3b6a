use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::{
    aggregator::ProductState,
    sink::{format_fields, format_timestamp},
};

/// 組出畫面上的一行，例如 `"2026-10-19 09:30:00  天利鑫B 1000000↑    "`
pub fn render(states: &[ProductState], width: usize, now: DateTime<Local>) -> String {
    format!(
        "{:<21}{}",
        format_timestamp(now),
        format_fields(states, width, true)
    )
}

/// 回到行首覆寫上一次的輸出，不換行
pub fn show<W: Write>(out: &mut W, line: &str) -> Result<()> {
    write!(out, "{}\r", line)?;
    out.flush()?;
    Ok(())
}

pub fn show_stdout(states: &[ProductState], width: usize) -> Result<()> {
    let line = render(states, width, Local::now());
    show(&mut io::stdout().lock(), &line)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        declare::Direction,
        sink::tests::{reading, state},
    };

    #[test]
    fn test_render() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let states = vec![
            state("1004", Some(reading("天利鑫B", dec!(100), Direction::Up))),
            state("1005", None),
        ];

        assert_eq!(
            render(&states, 6, now),
            "2026-10-19 09:30:00  天利鑫B 100↑  "
        );
        assert_eq!(render(&[], 6, now), "2026-10-19 09:30:00  ");
    }

    #[test]
    fn test_show_overwrites_line() {
        let mut out: Vec<u8> = Vec::new();
        show(&mut out, "first").unwrap();
        show(&mut out, "second").unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written, "first\rsecond\r");
        assert!(!written.contains('\n'));
    }
}
