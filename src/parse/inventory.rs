use crate::device::model::Serial;
use crate::errors::CrawlError;
use crate::parse::xml;
use once_cell::sync::OnceCell;
use regex::Regex;

#[allow(clippy::expect_used)]
fn ios_inventory_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // one "show inventory" entry:
        //   NAME: "1", DESCR: "WS-C3750X-48P"
        //   PID: WS-C3750X-48P-L    , VID: V04  , SN: FDO1709K1AB
        Regex::new(
            r#"(?ims)^name:\s*"(?P<name>[^"]*)"\s*,?\s*descr:\s*"(?P<descr>[^"]*)".*?(?:pid:\s*(?P<pid>\S+)?\s*,\s*)?(?:vid:\s*(?P<vid>\S+)?\s*,\s*)?sn:\s*(?P<sn>\S+)"#,
        )
        .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Parse `show inventory` output in the IOS textual form: repeating NAME/DESCR/SN blocks.
///
/// # Errors
///
/// `ParseEmpty` when zero entries match.
pub fn serials_ios(text: &str) -> Result<Vec<Serial>, CrawlError> {
    let mut result = vec![];

    for captures in ios_inventory_pattern().captures_iter(text) {
        let serial_number = match captures.name("sn") {
            Some(m) => m.as_str().to_owned(),
            None => continue,
        };

        result.push(Serial {
            name: captures
                .name("name")
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default(),
            description: captures
                .name("descr")
                .map(|m| m.as_str().to_owned())
                .unwrap_or_default(),
            product_id: captures.name("pid").map(|m| m.as_str().to_owned()),
            vendor_id: captures.name("vid").map(|m| m.as_str().to_owned()),
            serial_number,
        });
    }

    if result.is_empty() {
        return Err(CrawlError::ParseEmpty(String::from(
            "no inventory entries found in output",
        )));
    }

    Ok(result)
}

/// Parse `show inventory` output on NX-OS, which arrives either in the same textual form as IOS
/// or -- when the pipe to xml survived -- as `<ROW_inv>` rows.
///
/// # Errors
///
/// `ParseEmpty` when neither form yields any entry.
pub fn serials_nxos(text: &str) -> Result<Vec<Serial>, CrawlError> {
    if text.contains("<ROW_inv>") {
        let mut result = vec![];

        for row in xml::rows(text, "ROW_inv") {
            let Some(serial_number) = row.get("serialnum").filter(|s| !s.is_empty()) else {
                continue;
            };

            result.push(Serial {
                name: row.get("name").cloned().unwrap_or_default(),
                description: row.get("desc").cloned().unwrap_or_default(),
                product_id: row.get("productid").cloned(),
                vendor_id: row.get("vendorid").cloned(),
                serial_number: serial_number.clone(),
            });
        }

        if result.is_empty() {
            return Err(CrawlError::ParseEmpty(String::from(
                "xml inventory output contained no usable rows",
            )));
        }

        return Ok(result);
    }

    serials_ios(text)
}
