//! HTML rendering of the swap board for browsers.

use std::fmt::Write as _;

use chrono::DateTime;

use crate::domain::exposition::escape_html;
use crate::domain::htlc::HtlcRecord;
use crate::domain::reconcile::{LinkKind, SwapView};
use crate::usecases::swap_board::SwapBoard;

/// `0000abcdef...` addresses: skip the 4-char curve/hash prefix.
pub fn short_archethic(address: &str) -> String {
    shorten(address, 4)
}

/// `0x1234...` addresses.
pub fn short_evm(address: &str) -> String {
    shorten(address, 0)
}

fn shorten(address: &str, skip: usize) -> String {
    if address.len() <= skip + 12 {
        return address.to_string();
    }
    match (address.get(skip..skip + 6), address.get(address.len() - 6..)) {
        (Some(head), Some(tail)) => format!("{head}...{tail}"),
        _ => address.to_string(),
    }
}

/// Unix seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn iso_utc(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map_or_else(|| secs.to_string(), |d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

const HEADER: &str = "<tr><th>Type</th><th>Archethic HTLC</th><th>End time</th>\
<th>Amount</th><th>Status</th><th>EVM chain</th><th>EVM HTLC</th><th>Lock time</th>\
<th>Amount</th><th>Status</th><th>Link</th></tr>";

/// Full HTML page with one row per swap view, chargeable first.
pub fn swap_table(board: &SwapBoard, explorer: &str) -> String {
    let mut html = String::from(
        "<html><head><title>HTLCs</title></head><body><table border=\"1\">",
    );
    html.push_str(HEADER);

    for view in board.swaps() {
        push_row(&mut html, view, explorer);
    }

    let summary = board.summary();
    let _ = write!(
        html,
        "</table><p>Generated {}: {} swaps, {} explicit, {} by lock time, {} unlinked</p></body></html>",
        board.generated_at.format("%Y-%m-%dT%H:%M:%SZ"),
        summary.total(),
        summary.explicit,
        summary.lock_time,
        summary.unlinked,
    );
    html
}

fn push_row(html: &mut String, view: &SwapView, explorer: &str) {
    let record = &view.record;
    let _ = write!(
        html,
        "<tr><td>{}</td><td><a href=\"{}/explorer/transaction/{}\">{}</a></td><td>{}</td><td>{} {}</td><td>{}</td>",
        view.phase,
        escape_html(explorer),
        escape_html(&record.address),
        escape_html(&short_archethic(&record.address)),
        iso_utc(record.lock_time),
        record.amount,
        escape_html(&record.token),
        record.status,
    );

    match view.link.as_ref() {
        Some(link) => push_linked(html, &link.record, link.kind),
        None => {
            let chain = record
                .counterparty_chain_id
                .map_or_else(String::new, |id| id.to_string());
            let _ = write!(html, "<td>{chain}</td><td colspan=\"5\">-</td></tr>");
        }
    }
}

fn push_linked(html: &mut String, linked: &HtlcRecord, kind: LinkKind) {
    let kind = match kind {
        LinkKind::Explicit => "explicit",
        LinkKind::LockTime => "lock time",
    };
    let _ = write!(
        html,
        "<td>{}</td><td title=\"{}\">{}</td><td>{}</td><td>{} {}</td><td>{}</td><td>{kind}</td></tr>",
        linked.chain_id().map_or_else(String::new, |id| id.to_string()),
        escape_html(&linked.address),
        escape_html(&short_evm(&linked.address)),
        iso_utc(linked.lock_time),
        linked.amount,
        escape_html(&linked.token),
        linked.status,
    );
}
