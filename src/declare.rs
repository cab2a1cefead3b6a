use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// 趨勢方向
#[derive(PartialEq, Eq, Debug, Copy, Clone, Display)]
pub enum Direction {
    /// 上漲 ↑
    #[strum(serialize = "↑")]
    Up,
    /// 下跌 ↓
    #[strum(serialize = "↓")]
    Down,
    /// 持平 →
    #[strum(serialize = "→")]
    Flat,
    /// 未知 ?
    #[strum(serialize = "?")]
    Unknown,
}

/// 資料來源的銀行介面
#[derive(
    PartialEq, Eq, Hash, Debug, Copy, Clone, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Vendor {
    /// 寧波銀行 個人網銀 (e.nbcb.com.cn)
    NbcbEbank,
    /// 寧波銀行 中台 (i.nbcb.com.cn)，含預期收益率
    NbcbZhongtai,
    /// 浦發銀行 (ebank.spdb.com.cn)，需要登入後的 cookie
    Spdb,
}

impl Vendor {
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::NbcbEbank => "寧波銀行-個人網銀",
            Vendor::NbcbZhongtai => "寧波銀行-中台",
            Vendor::Spdb => "浦發銀行",
        }
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::NbcbEbank, Self::NbcbZhongtai, Self::Spdb]
            .iter()
            .copied()
    }
}
