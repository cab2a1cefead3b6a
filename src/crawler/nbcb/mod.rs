/// 個人網銀的理財產品額度
pub mod ebank;
/// 中台的在售產品清單 (含預期收益率)
pub mod zhongtai;

const EBANK_HOST: &str = "e.nbcb.com.cn";
const ZHONGTAI_HOST: &str = "i.nbcb.com.cn";
