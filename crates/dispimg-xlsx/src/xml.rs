//! Small helpers over quick-xml events

use dispimg_core::CellAddress;
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;

/// Unescaped value of an attribute, matched on its qualified name
pub(crate) fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|s| s.to_string()))
}

/// Namespace prefix of an element, if any (`xdr:wsDr` -> `xdr`)
pub(crate) fn prefix_of(e: &BytesStart<'_>) -> Option<String> {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

/// Qualified element name using `prefix`
pub(crate) fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// Tracks cell positions in `<sheetData>`, where `<row r>` and `<c r>` may be
/// omitted and are then implied by document order.
#[derive(Debug, Default)]
pub(crate) struct CellCursor {
    row: u32,
    next_col: u16,
}

impl CellCursor {
    /// Enter a `<row>`; returns the 1-based row number
    pub(crate) fn enter_row(&mut self, r: Option<u32>) -> u32 {
        self.row = r.unwrap_or(self.row + 1);
        self.next_col = 0;
        self.row
    }

    /// Enter a `<c>`; returns its address
    pub(crate) fn enter_cell(&mut self, r: Option<&str>) -> XlsxResult<CellAddress> {
        let address = match r {
            Some(r) => CellAddress::parse(r)?,
            None => CellAddress::new(self.row.saturating_sub(1), self.next_col),
        };
        self.next_col = address.col.saturating_add(1);
        Ok(address)
    }
}
