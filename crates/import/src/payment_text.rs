use crate::normalize::{repair_spaced_phrases, standardize_currency};

/// Lines a block start may absorb.
const BLOCK_SPAN: usize = 5;

const BLOCK_STARTS: &[&str] = &["paid to", "received from", "sent to"];

/// App chrome that OCR picks up from payment-app screenshots.
const NOISE: &[&str] = &[
    "scratch card",
    "cashback reward",
    "try adding bank account",
    "google pay settings",
    "scan qr",
    "summary",
    "reward unlocked",
    "cashback pending",
    "add money",
    "invite friends",
    "refer and earn",
];

/// Reshape OCR text from a payment-app export into one line per transaction.
///
/// Noise lines and consecutive repeats are dropped, then each
/// `Paid to` / `Received from` / `Sent to` line absorbs up to five following
/// lines, joined with `" | "`, stopping early at the next block start.
pub fn clean_payment_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = standardize_currency(&repair_spaced_phrases(raw.trim()));
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() || is_noise(&line) {
            continue;
        }
        if lines.last().is_some_and(|prev| *prev == line) {
            continue;
        }
        lines.push(line);
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if !is_block_start(&lines[i]) {
            out.push(lines[i].clone());
            i += 1;
            continue;
        }
        let mut block = vec![lines[i].as_str()];
        let mut j = i + 1;
        while j < lines.len() && j <= i + BLOCK_SPAN && !is_block_start(&lines[j]) {
            block.push(&lines[j]);
            j += 1;
        }
        out.push(block.join(" | "));
        i = j;
    }
    out.join("\n")
}

fn is_noise(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE.iter().any(|n| lower.contains(n))
}

fn is_block_start(line: &str) -> bool {
    let lower = line.to_lowercase();
    BLOCK_STARTS.iter().any(|s| lower.starts_with(s))
}
