use crate::repository::{AllowListUpdate, L1Registration, L2Registration};
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

fn csv_output(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut wtr = Writer::from_writer(vec![]);
    let _ = wtr.write_record(header);
    for row in rows {
        let _ = wtr.write_record(&row);
    }
    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_l1_registrations(registrations: &[L1Registration], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if registrations.is_empty() {
                return "No registrations found.".to_string();
            }
            let mut table = new_table(vec![
                "Block", "Token", "Symbol", "Name", "Decimals", "L2 Block", "Tx Hash",
            ]);
            for r in registrations {
                table.add_row(vec![
                    Cell::new(r.block_number),
                    Cell::new(&r.l1_address),
                    Cell::new(&r.symbol),
                    Cell::new(&r.name),
                    Cell::new(r.decimals),
                    Cell::new(r.l2_block_number),
                    Cell::new(format_tx_hash(&r.transaction_hash)),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(registrations)
            .unwrap_or_else(|_| "[]".to_string()),
        OutputFormat::Csv => csv_output(
            &[
                "block_number",
                "l1_address",
                "symbol",
                "name",
                "decimals",
                "l2_block_number",
                "transaction_hash",
            ],
            registrations
                .iter()
                .map(|r| {
                    vec![
                        r.block_number.to_string(),
                        r.l1_address.clone(),
                        r.symbol.clone(),
                        r.name.clone(),
                        r.decimals.to_string(),
                        r.l2_block_number.to_string(),
                        r.transaction_hash.clone(),
                    ]
                })
                .collect(),
        ),
    }
}

pub fn format_allow_list(updates: &[AllowListUpdate], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if updates.is_empty() {
                return "No allow-list updates found.".to_string();
            }
            let mut table = new_table(vec!["Block", "Token", "Status", "Tx Hash"]);
            for u in updates {
                table.add_row(vec![
                    Cell::new(u.block_number),
                    Cell::new(&u.l1_address),
                    Cell::new(u.status.as_str()),
                    Cell::new(format_tx_hash(&u.transaction_hash)),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(updates).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => csv_output(
            &["block_number", "l1_address", "status", "transaction_hash"],
            updates
                .iter()
                .map(|u| {
                    vec![
                        u.block_number.to_string(),
                        u.l1_address.clone(),
                        u.status.as_str().to_string(),
                        u.transaction_hash.clone(),
                    ]
                })
                .collect(),
        ),
    }
}

pub fn format_l2_registrations(registrations: &[L2Registration], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if registrations.is_empty() {
                return "No registrations found.".to_string();
            }
            let mut table = new_table(vec!["Block", "Tx", "Log", "L1 Token", "L2 Token"]);
            for r in registrations {
                table.add_row(vec![
                    Cell::new(r.block_number),
                    Cell::new(r.tx_index),
                    Cell::new(r.log_index),
                    Cell::new(&r.l1_address),
                    Cell::new(&r.l2_address),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(registrations)
            .unwrap_or_else(|_| "[]".to_string()),
        OutputFormat::Csv => csv_output(
            &[
                "block_number",
                "tx_index",
                "log_index",
                "l1_address",
                "l2_address",
            ],
            registrations
                .iter()
                .map(|r| {
                    vec![
                        r.block_number.to_string(),
                        r.tx_index.to_string(),
                        r.log_index.to_string(),
                        r.l1_address.clone(),
                        r.l2_address.clone(),
                    ]
                })
                .collect(),
        ),
    }
}

pub fn format_heads(l1_head: u64, l2_head: u64, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = new_table(vec!["Chain", "Head Block"]);
            table.add_row(vec![Cell::new("L1"), Cell::new(l1_head)]);
            table.add_row(vec![Cell::new("L2"), Cell::new(l2_head)]);
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "l1": l1_head,
            "l2": l2_head,
        }))
        .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Csv => csv_output(
            &["chain", "head_block"],
            vec![
                vec!["L1".to_string(), l1_head.to_string()],
                vec!["L2".to_string(), l2_head.to_string()],
            ],
        ),
    }
}

fn format_tx_hash(hash: &str) -> String {
    if hash.len() <= 12 {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::AllowListStatus;

    fn registration() -> L1Registration {
        L1Registration {
            l1_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            symbol: "USDC".into(),
            name: "USD Coin".into(),
            decimals: 6,
            block_number: 1200,
            transaction_hash: format!("0x{}", "ab".repeat(32)),
            l2_block_number: 77,
        }
    }

    #[test]
    fn format_parsing_defaults_to_table() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Table);
    }

    #[test]
    fn registrations_render_as_json() {
        let output = format_l1_registrations(&[registration()], &OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["symbol"], "USDC");
        assert_eq!(parsed[0]["l2_block_number"], 77);
    }

    #[test]
    fn allow_list_csv_has_header_and_rows() {
        let update = AllowListUpdate {
            l1_address: "0x02".into(),
            status: AllowListStatus::Rejected,
            block_number: 9,
            transaction_hash: "0xdef".into(),
        };
        let output = format_allow_list(&[update], &OutputFormat::Csv);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "block_number,l1_address,status,transaction_hash");
        assert_eq!(lines[1], "9,0x02,REJECTED,0xdef");
    }

    #[test]
    fn empty_table_prints_placeholder() {
        assert_eq!(
            format_l2_registrations(&[], &OutputFormat::Table),
            "No registrations found."
        );
    }

    #[test]
    fn long_hashes_are_shortened() {
        let table = format_l1_registrations(&[registration()], &OutputFormat::Table);
        assert!(table.contains("0xabab...abab"));
        assert_eq!(format_tx_hash("0xdef"), "0xdef");
    }
}
