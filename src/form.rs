//! ASP.NET search form handshake and results table extraction
//!
//! The schedule page is a WebForms postback form. A search is a POST that
//! echoes the hidden `__VIEWSTATE`, `__VIEWSTATEGENERATOR` and
//! `__EVENTVALIDATION` values served with the page, together with the chosen
//! date and the search button's value.

use scraper::{ElementRef, Html, Selector};

use crate::error::ScheduleError;
use crate::types::FIELD_SID;

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

const DATE_OPTIONS: &str = "#Matter_wT02 option";
const RESULTS_TABLE: &str = "#printlist";
/// 1-based column holding the deceased's name and detail link
const DETAIL_LINK_COLUMN: usize = 6;

const FIELD_START_DATE: &str = "ctl00$Matter$wT01";
const FIELD_DATE: &str = "ctl00$Matter$wT02";
const FIELD_CITY: &str = "ctl00$Matter$wT03";
const FIELD_DISTRICT: &str = "ctl00$Matter$wT04";
const FIELD_SEARCH: &str = "ctl00$Matter$Btn_Search";

pub const SEARCH_CITY: &str = "臺南市";
const SEARCH_BUTTON: &str = "查詢";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Whitespace-normalised text content of an element
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hidden anti-forgery values the server expects back on every postback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

impl FormState {
    pub fn from_document(document: &Html) -> Result<Self, ScheduleError> {
        Ok(Self {
            view_state: hidden_value(document, VIEWSTATE)?,
            view_state_generator: hidden_value(document, VIEWSTATE_GENERATOR)?,
            event_validation: hidden_value(document, EVENT_VALIDATION)?,
        })
    }

    /// State served with a results page, if the page carries all three fields
    pub fn from_html(html: &str) -> Option<Self> {
        Self::from_document(&Html::parse_document(html)).ok()
    }

    /// Form body for a search on `date` (an option value such as "1140505")
    pub fn search_params(&self, date: &str) -> Vec<(&'static str, String)> {
        vec![
            ("__EVENTTARGET", String::new()),
            ("__EVENTARGUMENT", String::new()),
            ("__LASTFOCUS", String::new()),
            (VIEWSTATE, self.view_state.clone()),
            (VIEWSTATE_GENERATOR, self.view_state_generator.clone()),
            (EVENT_VALIDATION, self.event_validation.clone()),
            (FIELD_CITY, SEARCH_CITY.to_string()),
            (FIELD_DISTRICT, String::new()),
            (FIELD_SEARCH, SEARCH_BUTTON.to_string()),
            (FIELD_START_DATE, date.to_string()),
            (FIELD_DATE, date.to_string()),
        ]
    }
}

fn hidden_value(document: &Html, id: &'static str) -> Result<String, ScheduleError> {
    let input = document
        .select(&selector(&format!("#{}", id)))
        .next()
        .ok_or(ScheduleError::MissingHiddenField(id))?;
    Ok(input.value().attr("value").unwrap_or_default().to_string())
}

/// The initial search page: form state plus the selectable dates in page order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub state: FormState,
    pub dates: Vec<String>,
}

impl SearchPage {
    pub fn parse(html: &str) -> Result<Self, ScheduleError> {
        let document = Html::parse_document(html);
        let dates = document
            .select(&selector(DATE_OPTIONS))
            .map(|option| match option.value().attr("value") {
                Some(value) => value.to_string(),
                None => element_text(&option),
            })
            .collect();
        let state = FormState::from_document(&document)?;
        Ok(Self { state, dates })
    }
}

/// Header and data rows of the `#printlist` results table, with a trailing
/// `SID` column appended to both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ScheduleTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extract the results table; a page without one yields an empty table
pub fn extract_table(html: &str) -> ScheduleTable {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&selector(RESULTS_TABLE)).next() else {
        return ScheduleTable::default();
    };

    let mut headers: Vec<String> = table
        .select(&selector("tr:first-child th"))
        .map(|th| element_text(&th))
        .collect();
    headers.push(FIELD_SID.to_string());

    let cell = selector("td");
    let link = selector(&format!("td:nth-child({}) a", DETAIL_LINK_COLUMN));

    let mut rows = Vec::new();
    for tr in table.select(&selector("tr:not(:first-child)")) {
        let mut row: Vec<String> = tr.select(&cell).map(|td| element_text(&td)).collect();
        if row.is_empty() {
            continue;
        }
        let sid = tr
            .select(&link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(extract_sid)
            .unwrap_or_default();
        row.push(sid.to_string());
        rows.push(row);
    }

    ScheduleTable { headers, rows }
}

/// Value of the first non-empty `sid=` parameter in a link
pub fn extract_sid(url: &str) -> Option<&str> {
    url.match_indices("sid=").find_map(|(i, m)| {
        let rest = &url[i + m.len()..];
        let value = rest.split('&').next().unwrap_or_default();
        (!value.is_empty()).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"<html><body>
<form method="post" action="./I101.aspx?mid=1" id="form1">
<input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="dDwtMTA4NzI=" />
<input type="hidden" name="__VIEWSTATEGENERATOR" id="__VIEWSTATEGENERATOR" value="C2EE9ABB" />
<input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="/wEdAAk=" />
<select name="ctl00$Matter$wT02" id="Matter_wT02">
  <option value="1140612">114/06/12</option>
  <option selected="selected" value="1140605">114/06/05</option>
  <option value="1140610">114/06/10</option>
</select>
</form></body></html>"#;

    const RESULTS_PAGE: &str = r#"<html><body>
<table id="printlist">
  <tr><th>日期</th><th>公祭時間</th><th>公祭地點</th><th>輓額</th><th>家屬</th><th>往生者</th><th>性別</th><th>年次</th><th>戶籍地</th></tr>
  <tr><td>114/06/05</td><td> 09:00 </td><td>景行廳</td><td>3</td><td>王家</td>
      <td><a href="I102.aspx?sid=A1B2C3&amp;mid=1">王 小明</a></td><td>男</td><td>50</td><td>台南市</td></tr>
  <tr><td>114/06/05</td><td>10:30</td><td>和平堂-53-1</td><td></td><td>李家</td>
      <td>李大華</td><td>女</td><td>38</td><td>高雄市</td></tr>
</table></body></html>"#;

    #[test]
    fn test_parse_search_page() {
        let page = SearchPage::parse(SEARCH_PAGE).unwrap();
        assert_eq!(page.dates, vec!["1140612", "1140605", "1140610"]);
        assert_eq!(page.state.view_state, "dDwtMTA4NzI=");
        assert_eq!(page.state.view_state_generator, "C2EE9ABB");
        assert_eq!(page.state.event_validation, "/wEdAAk=");
    }

    #[test]
    fn test_missing_hidden_field() {
        let html = SEARCH_PAGE.replace("id=\"__EVENTVALIDATION\"", "");
        assert_eq!(
            SearchPage::parse(&html),
            Err(ScheduleError::MissingHiddenField(EVENT_VALIDATION))
        );
    }

    #[test]
    fn test_search_params() {
        let state = FormState {
            view_state: "vs".into(),
            view_state_generator: "gen".into(),
            event_validation: "ev".into(),
        };
        let params = state.search_params("1140605");
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("__VIEWSTATE"), Some("vs"));
        assert_eq!(get("__VIEWSTATEGENERATOR"), Some("gen"));
        assert_eq!(get("__EVENTVALIDATION"), Some("ev"));
        assert_eq!(get("__EVENTTARGET"), Some(""));
        assert_eq!(get("ctl00$Matter$wT01"), Some("1140605"));
        assert_eq!(get("ctl00$Matter$wT02"), Some("1140605"));
        assert_eq!(get("ctl00$Matter$wT03"), Some("臺南市"));
        assert_eq!(get("ctl00$Matter$wT04"), Some(""));
        assert_eq!(get("ctl00$Matter$Btn_Search"), Some("查詢"));
    }

    #[test]
    fn test_extract_table() {
        let table = extract_table(RESULTS_PAGE);
        assert_eq!(table.headers.len(), 10);
        assert_eq!(table.headers[0], "日期");
        assert_eq!(table.headers[9], "SID");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "09:00");
        assert_eq!(table.rows[0][5], "王 小明");
        assert_eq!(table.rows[0][9], "A1B2C3");
        assert_eq!(table.rows[1][2], "和平堂-53-1");
        assert_eq!(table.rows[1][9], "");
    }

    #[test]
    fn test_table_without_data_rows() {
        let html = r#"<table id="printlist"><tr><th>日期</th><th>公祭時間</th></tr></table>"#;
        let table = extract_table(html);
        assert!(table.is_empty());
        assert_eq!(table.headers, vec!["日期", "公祭時間", "SID"]);
    }

    #[test]
    fn test_page_without_table() {
        assert_eq!(extract_table("<html><body>查無資料</body></html>"), ScheduleTable::default());
    }

    #[test]
    fn test_extract_sid() {
        assert_eq!(extract_sid("I102.aspx?sid=XYZ&mid=1"), Some("XYZ"));
        assert_eq!(extract_sid("I102.aspx?mid=1&sid=XYZ"), Some("XYZ"));
        assert_eq!(extract_sid("I102.aspx?sid=&x=1&sid=Q"), Some("Q"));
        assert_eq!(extract_sid("I102.aspx?mid=1"), None);
    }

    #[test]
    fn test_refreshed_state() {
        assert!(FormState::from_html(SEARCH_PAGE).is_some());
        assert_eq!(FormState::from_html(RESULTS_PAGE), None);
    }
}
