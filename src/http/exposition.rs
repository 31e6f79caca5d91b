//! OpenMetrics exposition document, wrapped in a complete HTTP response.
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8\r\n
//! \r\n
//! # TYPE <name> <kind>\n
//! <name> <value>\n
//! ...
//! # EOF\n
//! ```
//!
//! No `Content-Length` is sent; the peer reads until the connection closes.

use core::fmt::Write as _;

use crate::sensors::MeasurementSet;

/// Status line, content type and the blank line ending the header block.
pub const RESPONSE_HEAD: &str = "HTTP/1.1 200 OK\r\n\
Content-Type: application/openmetrics-text; version=1.0.0; charset=utf-8\r\n\
\r\n";

/// Terminator required by OpenMetrics.
pub const EOF_MARKER: &str = "# EOF\n";

/// Render one acquisition as the full response bytes.
///
/// Every metric in `set` appears exactly once, in set order.
pub fn render(set: &MeasurementSet) -> String {
    let mut out = String::with_capacity(RESPONSE_HEAD.len() + EOF_MARKER.len() + set.len() * 48);
    out.push_str(RESPONSE_HEAD);
    for m in set {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "# TYPE {name} {kind}\n{name} {value}\n",
            name = m.name,
            kind = m.kind.as_str(),
            value = m.value
        );
    }
    out.push_str(EOF_MARKER);
    out
}
