use passbook_import::TextChunk;

const CHUNK_INSTRUCTIONS: &str = r#"You extract transactions from bank statement text.

Rules:
1. Every transaction line has a date, a narration, an amount, and usually a running balance.
2. Dates appear as DD-MM-YYYY or YYYY-MM-DD. Always output YYYY-MM-DD.
3. Money going out (withdrawal, payment, "Dr") is "Dr". Money coming in (deposit, "Cr") is "Cr".
4. The amount is the transaction value, never the running balance.
5. Extract every transaction. Skip headers, totals, and page furniture.
6. Set confidence to 0.9 when sure, 0.7 when somewhat sure, 0.5 when uncertain.

Example line:
01-08-2025 UPI/NEFT/Ram Card/54321 UPI54321234567 75.00(Dr) 601.54(Cr)

Example output:
[{"date":"2025-08-01","narration":"UPI/NEFT/Ram Card/54321","amount":75.00,"debit_credit":"Dr","balance":601.54,"raw":"01-08-2025 UPI/NEFT/Ram Card/54321 UPI54321234567 75.00(Dr) 601.54(Cr)","confidence":0.9}]

Output a JSON array only, using exactly these fields:
date, narration, amount, debit_credit, balance, raw, confidence.
Use null for a field you cannot find. Return [] when there are no transactions.
Do not wrap the output in markdown fences or add any commentary."#;

const VISION_INSTRUCTIONS: &str = r#"You extract transactions from images of a payment-app statement.
The images are consecutive pages of one document.

Output a single JSON array. Each element:
{
  "date": "YYYY-MM-DD",
  "time": "HH:MM AM/PM or null",
  "description": "payee or payer name",
  "transaction_id": "UPI transaction id or null",
  "account": "bank account shown, or null",
  "amount": number,
  "type": "debit" for "Paid to" or "Sent to", "credit" for "Received from",
  "raw": "the full text of this transaction block"
}

Constraints:
- The response must begin with [ and end with ]. No markdown fences, no commentary.
- Do not invent values. Use null for anything not visible.
- Skip failed transactions, balance checks, and promotional content."#;

/// Prompt for one text chunk. The chunk text is appended last.
pub fn chunk_prompt(chunk: &TextChunk) -> String {
    format!(
        "{CHUNK_INSTRUCTIONS}\n\nText ({}, characters {}..{}):\n{}\n\nJSON array:",
        chunk.chunk_id, chunk.start, chunk.end, chunk.text
    )
}

pub fn vision_prompt(page_count: usize) -> String {
    format!("{VISION_INSTRUCTIONS}\n\nThis batch has {page_count} page image(s). JSON array:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_import::chunk_text;

    #[test]
    fn chunk_prompt_ends_with_the_chunk_text() {
        let chunk = &chunk_text("2025-08-01 UPI/Zomato 250.00(Dr) 1,000.00(Cr)", 2000, 200)[0];
        let prompt = chunk_prompt(chunk);
        assert!(prompt.contains("chunk-0"));
        assert!(prompt.contains("2025-08-01 UPI/Zomato 250.00(Dr) 1,000.00(Cr)\n\nJSON array:"));
        assert!(prompt.contains("debit_credit"));
    }

    #[test]
    fn vision_prompt_names_page_count() {
        assert!(vision_prompt(3).contains("3 page image(s)"));
    }
}
