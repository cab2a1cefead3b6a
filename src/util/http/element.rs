use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use scraper::{Html, Selector};

use crate::util::text;

/// Extracts the text value of an element selected by a given CSS selector.
///
/// Returns `None` when the selector is invalid or nothing matches.
///
/// # Examples
///
/// ```
/// let html = r#"<div class="rate"><span>3.25%</span></div>"#;
/// let document = Html::parse_fragment(html);
/// let text = parse_value(&document.root_element(), "div.rate > span");
/// assert_eq!(text, Some("3.25%".to_string()));
/// ```
pub fn parse_value(element: &scraper::ElementRef, css_selector: &str) -> Option<String> {
    match Selector::parse(css_selector) {
        Ok(s) => element
            .select(&s)
            .next()
            .map(|v| v.text().collect::<String>()),
        Err(_) => None,
    }
}

/// 在一段 HTML 內用 CSS selector 找出第一個節點並轉成 `Decimal`，例如收益率 "3.25%"
pub fn select_decimal(html: &str, css_selector: &str) -> Result<Decimal> {
    let document = Html::parse_document(html);
    Selector::parse(css_selector)
        .map_err(|why| anyhow!("Failed to Selector::parse because: {:?}", why))?;
    let value = parse_value(&document.root_element(), css_selector)
        .ok_or_else(|| anyhow!("The element({}) not found", css_selector))?;

    text::parse_decimal(value.trim(), None)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const FRAGMENT: &str = r#"
        <html><body>
            <div class="prd">
                <span class="name">天利鑫B</span>
                <span class="rate"> 3.25% </span>
            </div>
        </body></html>"#;

    #[test]
    fn test_select_decimal() {
        assert_eq!(
            select_decimal(FRAGMENT, "div.prd > span.rate").unwrap(),
            dec!(3.25)
        );
    }

    #[test]
    fn test_select_decimal_missing_or_invalid() {
        assert!(select_decimal(FRAGMENT, "span.limit").is_err());
        assert!(select_decimal(FRAGMENT, "span.name").is_err());
        assert!(select_decimal(FRAGMENT, "div[").is_err());
    }
}
