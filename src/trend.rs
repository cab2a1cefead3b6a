//! 額度的趨勢標記。
//!
//! 每一筆讀數只跟同一個產品的上一筆讀數比較，第一筆 (或中斷後的第一筆) 一律視為持平。

use rust_decimal::Decimal;

use crate::{declare::Direction, error::TrendError};

/// 某個產品在某個時間點的讀數，建立後不可變
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReading {
    /// 產品名稱，同時是比對時的身分
    pub label: String,
    /// 可用額度
    pub value: Decimal,
    /// 附加數值，例如預期收益率
    pub aux: Option<Decimal>,
    pub direction: Direction,
}

impl ProductReading {
    /// 附上收益率等附加數值
    pub fn with_aux(self, aux: Option<Decimal>) -> Self {
        ProductReading { aux, ..self }
    }

    /// 數值加上趨勢符號，例如 "1000000↑"
    pub fn marked_value(&self) -> String {
        format!("{}{}", self.value.normalize(), self.direction)
    }

    /// 不含趨勢符號的數值
    pub fn plain_value(&self) -> String {
        self.value.normalize().to_string()
    }
}

/// 依上一筆讀數計算新讀數的趨勢
///
/// # Errors
///
/// 上一筆讀數的 `label` 與 `label` 不同時回傳 [`TrendError::InvariantViolation`]。
pub fn mark(
    previous: Option<&ProductReading>,
    value: Decimal,
    label: &str,
) -> Result<ProductReading, TrendError> {
    let direction = match previous {
        None => Direction::Flat,
        Some(p) if p.label != label => {
            return Err(TrendError::InvariantViolation {
                previous: p.label.clone(),
                current: label.to_string(),
            })
        }
        Some(p) if value < p.value => Direction::Down,
        Some(p) if value > p.value => Direction::Up,
        Some(_) => Direction::Flat,
    };

    Ok(ProductReading {
        label: label.to_string(),
        value,
        aux: None,
        direction,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn directions(values: &[Decimal]) -> Vec<Direction> {
        let mut previous: Option<ProductReading> = None;
        let mut result = Vec::with_capacity(values.len());
        for v in values {
            let reading = mark(previous.as_ref(), *v, "如意鑫A").unwrap();
            result.push(reading.direction);
            previous = Some(reading);
        }
        result
    }

    #[test]
    fn test_first_observation_is_flat() {
        let reading = mark(None, dec!(1000000), "如意鑫A").unwrap();
        assert_eq!(reading.direction, Direction::Flat);
        assert_eq!(reading.label, "如意鑫A");
        assert_eq!(reading.value, dec!(1000000));
        assert!(reading.aux.is_none());
    }

    #[test]
    fn test_sequence() {
        assert_eq!(
            directions(&[dec!(100), dec!(90), dec!(90), dec!(120)]),
            vec![
                Direction::Flat,
                Direction::Down,
                Direction::Flat,
                Direction::Up
            ]
        );
    }

    #[test]
    fn test_direction_follows_immediate_predecessor() {
        let values = [
            dec!(5),
            dec!(7.5),
            dec!(7.50),
            dec!(3),
            dec!(3.01),
            dec!(0),
            dec!(1000000),
            dec!(999999.99),
        ];
        let result = directions(&values);
        assert_eq!(result[0], Direction::Flat);
        for i in 1..values.len() {
            let expected = if values[i] > values[i - 1] {
                Direction::Up
            } else if values[i] < values[i - 1] {
                Direction::Down
            } else {
                Direction::Flat
            };
            assert_eq!(result[i], expected, "index {}", i);
        }
    }

    #[test]
    fn test_mark_is_pure() {
        let previous = mark(None, dec!(100), "天利鑫B").unwrap();
        let first = mark(Some(&previous), dec!(90), "天利鑫B").unwrap();
        let second = mark(Some(&previous), dec!(90), "天利鑫B").unwrap();
        assert_eq!(first, second);
        assert_eq!(previous.value, dec!(100));
        assert_eq!(previous.direction, Direction::Flat);
    }

    #[test]
    fn test_label_mismatch() {
        let previous = mark(None, dec!(100), "天利鑫B").unwrap();
        let result = mark(Some(&previous), dec!(200), "如意鑫A");
        assert_eq!(
            result,
            Err(TrendError::InvariantViolation {
                previous: "天利鑫B".to_string(),
                current: "如意鑫A".to_string(),
            })
        );
    }

    #[test]
    fn test_marked_value() {
        let previous = mark(None, dec!(1000000.00), "如意鑫A").unwrap();
        assert_eq!(previous.marked_value(), "1000000→");
        assert_eq!(previous.plain_value(), "1000000");

        let reading = mark(Some(&previous), dec!(999.5), "如意鑫A")
            .unwrap()
            .with_aux(Some(dec!(3.25)));
        assert_eq!(reading.marked_value(), "999.5↓");
        assert_eq!(reading.aux, Some(dec!(3.25)));
    }
}
