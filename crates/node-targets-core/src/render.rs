//! Target list rendering
//!
//! Produces a single file-based service discovery group:
//!
//! ```text
//! - targets:
//!   - 10.0.0.1:10255
//!   - 10.0.0.2:10255
//! ```

use crate::types::NodeRecord;
use std::fmt::Write;
use std::net::Ipv6Addr;

/// Group header line
const GROUP_HEADER: &str = "- targets:\n";

/// Render `records` as one target group scraped on `port`.
///
/// One line per record, in iteration order. An empty iterator still yields
/// the group header.
pub fn render_targets<'a, I>(records: I, port: u16) -> String
where
    I: IntoIterator<Item = &'a NodeRecord>,
{
    let mut out = String::from(GROUP_HEADER);
    for record in records {
        // writing into a String cannot fail
        let _ = writeln!(out, "  - {}", scrape_target(record.scrape_address(), port));
    }
    out
}

/// `host:port`, bracketing IPv6 literals
pub fn scrape_target(address: &str, port: u16) -> String {
    if address.parse::<Ipv6Addr>().is_ok() {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}
